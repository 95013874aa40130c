//! relhier CLI: relational hierarchy builder and benchmark task generator.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use relhier::config::RunConfig;
use relhier::generator::EvaluationSetGenerator;
use relhier::hierarchy::dump::write_leaf_dump;
use relhier::mapping::{load_mapping, save_json};
use relhier::selector::RelationSelector;

#[derive(Parser)]
#[command(name = "relhier", version, about = "Relational hierarchy builder and task generator")]
struct Cli {
    /// TOML run configuration (defaults apply when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the builder worker count.
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Override the task RNG seed.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the hierarchy and print build statistics.
    Build {
        /// Triple CSV (`subject,predicate,object`) or JSON mapping snapshot.
        #[arg(long)]
        mapping: PathBuf,

        /// Write a `label,values` row per leaf to this file.
        #[arg(long)]
        dump: Option<PathBuf>,

        /// Also save the loaded mapping as a JSON snapshot.
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Score the candidate predicates of the root mapping.
    Select {
        #[arg(long)]
        mapping: PathBuf,

        /// Number of predicates to show.
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Score without unique/rare/overlap pruning.
        #[arg(long)]
        no_prune: bool,
    },

    /// Build the hierarchy and write all enabled task files.
    Generate {
        #[arg(long)]
        mapping: PathBuf,

        /// Output directory for task files.
        #[arg(long, default_value = "tasks")]
        output: PathBuf,

        #[arg(long)]
        dump: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.builder.workers = workers;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Build {
            mapping,
            dump,
            snapshot,
        } => {
            let loaded = load_mapping(&mapping)?;
            if let Some(path) = snapshot {
                save_json(&loaded, &path)?;
                println!("Saved mapping snapshot to {}", path.display());
            }
            let generator = EvaluationSetGenerator::new(config)?;
            let (hierarchy, stats) = generator.build(loaded)?;
            if let Some(path) = dump {
                write_leaf_dump(&hierarchy, &path)?;
                println!("Wrote hierarchy dump to {}", path.display());
            }
            println!("{stats}");
        }

        Commands::Select {
            mapping,
            limit,
            no_prune,
        } => {
            let loaded = load_mapping(&mapping)?;
            let mut options = config.selector_options()?;
            options.prune = !no_prune;
            let mut selector = RelationSelector::new(loaded, &options);
            if options.prune {
                selector.prune();
            }
            let mut scores = selector.scores(&BTreeSet::new());
            scores.sort_by(|a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then_with(|| a.predicate.cmp(&b.predicate))
            });

            println!(
                "{} candidate predicates over {} entities",
                scores.len(),
                selector.universe_size()
            );
            for entry in scores.iter().take(limit) {
                let metrics: Vec<String> = entry
                    .values
                    .iter()
                    .map(|(metric, value)| format!("{metric}={value:.4}"))
                    .collect();
                println!(
                    "  {:<12} score={:.4}  {}",
                    entry.predicate.as_str(),
                    entry.score,
                    metrics.join("  ")
                );
            }
        }

        Commands::Generate {
            mapping,
            output,
            dump,
        } => {
            std::fs::create_dir_all(&output).into_diagnostic()?;
            let generator = EvaluationSetGenerator::new(config)?;
            let report = generator.run(&mapping, &output, dump.as_deref())?;
            println!("{}", report.stats);
            for (kind, files) in &report.files {
                println!("  {kind:<13} {files} files");
            }
            println!(
                "Wrote {} files to {}",
                report.total_files(),
                output.display()
            );
        }
    }

    Ok(())
}
