//! Run configuration, persisted as TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. [`RunConfig::load`] validates after parsing.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, RelhierResult};
use crate::hierarchy::HierarchyBuilder;
use crate::mapping::load_seed_entities;
use crate::selector::{MetricConfig, SelectorOptions};
use crate::tasks::{AnalogyTask, NeighborhoodTask, OutlierTask, TaskKind, TaskSettings};

/// Top-level configuration of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Seed for every task creator's random source.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
}

fn default_seed() -> u64 {
    42
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            selector: SelectorConfig::default(),
            builder: BuilderConfig::default(),
            tasks: TasksConfig::default(),
        }
    }
}

/// Relation scoring and pruning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    /// One weight per entry of `metrics`, same order.
    #[serde(default = "default_weights")]
    pub weights: Vec<f64>,
    #[serde(default = "default_big_groups_k")]
    pub big_groups_k: usize,
    #[serde(default = "default_rare_fraction")]
    pub rare_fraction: f64,
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,
    #[serde(default = "default_prune")]
    pub prune: bool,
}

fn default_metrics() -> Vec<String> {
    vec!["popularity".into(), "big_groups".into()]
}
fn default_weights() -> Vec<f64> {
    vec![0.5, 0.5]
}
fn default_big_groups_k() -> usize {
    MetricConfig::DEFAULT_BIG_GROUPS_K
}
fn default_rare_fraction() -> f64 {
    SelectorOptions::DEFAULT_RARE_FRACTION
}
fn default_overlap_threshold() -> f64 {
    SelectorOptions::DEFAULT_OVERLAP_THRESHOLD
}
fn default_prune() -> bool {
    true
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            metrics: default_metrics(),
            weights: default_weights(),
            big_groups_k: default_big_groups_k(),
            rare_fraction: default_rare_fraction(),
            overlap_threshold: default_overlap_threshold(),
            prune: default_prune(),
        }
    }
}

impl SelectorConfig {
    /// Pair the parallel name/weight lists into an ordered metric list.
    pub fn metric_config(&self) -> ConfigResult<MetricConfig> {
        MetricConfig::from_lists(&self.metrics, &self.weights, self.big_groups_k)
    }

    pub fn options(&self) -> ConfigResult<SelectorOptions> {
        unit_interval("selector.rare_fraction", self.rare_fraction)?;
        unit_interval("selector.overlap_threshold", self.overlap_threshold)?;
        Ok(SelectorOptions {
            metrics: self.metric_config()?,
            rare_fraction: self.rare_fraction,
            overlap_threshold: self.overlap_threshold,
            prune: self.prune,
        })
    }
}

/// Hierarchy construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Worker threads for scoring frontier nodes.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    HierarchyBuilder::DEFAULT_WORKERS
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Task generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Task types to run, by file prefix.
    #[serde(default = "default_enabled")]
    pub enabled: Vec<String>,
    #[serde(default = "default_neighborhood_max_size")]
    pub neighborhood_max_size: usize,
    #[serde(default = "default_outlier_max_group_size")]
    pub outlier_max_group_size: usize,
    #[serde(default = "default_similarity_pairs_per_leaf")]
    pub similarity_pairs_per_leaf: usize,
    #[serde(default = "default_analogy_per_object")]
    pub analogy_per_object: usize,
    #[serde(default = "default_analogy_max_pairs")]
    pub analogy_max_pairs: usize,
    #[serde(default = "default_entity_pattern")]
    pub entity_pattern: String,
    /// Allow-list file for analogy objects, one id per line. When unset,
    /// every object matching `entity_pattern` is admitted.
    #[serde(default)]
    pub seed_entities: Option<PathBuf>,
}

fn default_enabled() -> Vec<String> {
    TaskKind::ALL.iter().map(|k| k.prefix().to_string()).collect()
}
fn default_neighborhood_max_size() -> usize {
    NeighborhoodTask::DEFAULT_MAX_SIZE
}
fn default_outlier_max_group_size() -> usize {
    OutlierTask::DEFAULT_MAX_GROUP_SIZE
}
fn default_similarity_pairs_per_leaf() -> usize {
    1
}
fn default_analogy_per_object() -> usize {
    AnalogyTask::DEFAULT_PER_OBJECT
}
fn default_analogy_max_pairs() -> usize {
    AnalogyTask::DEFAULT_MAX_PAIRS
}
fn default_entity_pattern() -> String {
    AnalogyTask::DEFAULT_PATTERN.into()
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            neighborhood_max_size: default_neighborhood_max_size(),
            outlier_max_group_size: default_outlier_max_group_size(),
            similarity_pairs_per_leaf: default_similarity_pairs_per_leaf(),
            analogy_per_object: default_analogy_per_object(),
            analogy_max_pairs: default_analogy_max_pairs(),
            entity_pattern: default_entity_pattern(),
            seed_entities: None,
        }
    }
}

impl TasksConfig {
    /// Enabled task kinds, deduplicated, in the order listed.
    pub fn enabled_tasks(&self) -> ConfigResult<Vec<TaskKind>> {
        let mut kinds: Vec<TaskKind> = Vec::new();
        for name in &self.enabled {
            let kind = name.parse::<TaskKind>()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    pub fn entity_regex(&self) -> ConfigResult<Regex> {
        Regex::new(&self.entity_pattern).map_err(|e| ConfigError::EntityPattern {
            pattern: self.entity_pattern.clone(),
            message: e.to_string(),
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        self.enabled_tasks()?;
        self.entity_regex()?;
        at_least("tasks.neighborhood_max_size", self.neighborhood_max_size, 1)?;
        at_least("tasks.outlier_max_group_size", self.outlier_max_group_size, 2)?;
        at_least("tasks.similarity_pairs_per_leaf", self.similarity_pairs_per_leaf, 1)?;
        at_least("tasks.analogy_per_object", self.analogy_per_object, 1)?;
        at_least("tasks.analogy_max_pairs", self.analogy_max_pairs, 2)
    }
}

fn unit_interval(field: &str, value: f64) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.into(),
            message: format!("{value} is outside [0, 1]"),
        })
    }
}

fn at_least(field: &str, value: usize, min: usize) -> ConfigResult<()> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.into(),
            message: format!("must be at least {min}, got {value}"),
        })
    }
}

impl RunConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting without touching the filesystem.
    pub fn validate(&self) -> ConfigResult<()> {
        self.selector.options()?;
        at_least("builder.workers", self.builder.workers, 1)?;
        self.tasks.validate()
    }

    pub fn selector_options(&self) -> ConfigResult<SelectorOptions> {
        self.selector.options()
    }

    /// Resolve task settings, reading the seed allow-list if one is set.
    pub fn task_settings(&self) -> RelhierResult<TaskSettings> {
        let seed_entities = match &self.tasks.seed_entities {
            Some(path) => Some(load_seed_entities(path)?),
            None => None,
        };
        Ok(TaskSettings {
            seed: self.seed,
            neighborhood_max_size: self.tasks.neighborhood_max_size,
            outlier_max_group_size: self.tasks.outlier_max_group_size,
            similarity_pairs_per_leaf: self.tasks.similarity_pairs_per_leaf,
            analogy_per_object: self.tasks.analogy_per_object,
            analogy_max_pairs: self.tasks.analogy_max_pairs,
            entity_pattern: self.tasks.entity_regex()?,
            seed_entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Metric;

    #[test]
    fn empty_file_gives_defaults() {
        let config: RunConfig = toml::from_str("").unwrap();
        assert_eq!(config, RunConfig::default());
        config.validate().unwrap();
        assert_eq!(config.builder.workers, 25);
        assert_eq!(config.tasks.enabled_tasks().unwrap(), TaskKind::ALL.to_vec());
    }

    #[test]
    fn metric_order_is_preserved() {
        let config: RunConfig = toml::from_str(
            r#"
            [selector]
            metrics = ["big_groups", "popularity"]
            weights = [0.8, 0.2]
            "#,
        )
        .unwrap();
        let metrics = config.selector.metric_config().unwrap();
        assert_eq!(
            metrics.entries(),
            &[(Metric::BigGroups, 0.8), (Metric::Popularity, 0.2)]
        );
    }

    #[test]
    fn weight_count_mismatch_is_rejected() {
        let config: RunConfig = toml::from_str(
            r#"
            [selector]
            metrics = ["popularity", "big_groups"]
            weights = [1.0]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WeightMismatch { metrics: 2, weights: 1 })
        ));
    }

    #[test]
    fn unknown_task_and_bad_pattern_are_rejected() {
        let mut config = RunConfig::default();
        config.tasks.enabled = vec!["clustering".into()];
        assert!(matches!(config.validate(), Err(ConfigError::UnknownTask { .. })));

        let mut config = RunConfig::default();
        config.tasks.entity_pattern = "^Q(".into();
        assert!(matches!(config.validate(), Err(ConfigError::EntityPattern { .. })));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = RunConfig::default();
        config.selector.rare_fraction = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = RunConfig::default();
        config.builder.workers = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn load_reads_seed_allow_list() {
        let dir = tempfile::tempdir().unwrap();
        let seeds = dir.path().join("seeds.txt");
        std::fs::write(&seeds, "# countries\nQ142\n\nQ183\n").unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(
            &path,
            format!(
                "seed = 7\n[tasks]\nenabled = [\"analogy\"]\nseed_entities = {:?}\n",
                seeds.display().to_string()
            ),
        )
        .unwrap();

        let config = RunConfig::load(&path).unwrap();
        let settings = config.task_settings().unwrap();
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.seed_entities.unwrap().len(), 2);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
