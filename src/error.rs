//! Rich diagnostic error types for relhier.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so a failed run reports
//! exactly which input, node, or path was at fault.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for a relhier run.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum RelhierError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Task(#[from] TaskError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("metric/weight mismatch: {metrics} metrics but {weights} weights")]
    #[diagnostic(
        code(relhier::config::weight_mismatch),
        help(
            "`selector.metrics` and `selector.weights` are parallel lists. \
             Provide exactly one weight per metric, in the same order."
        )
    )]
    WeightMismatch { metrics: usize, weights: usize },

    #[error("unknown metric \"{name}\"")]
    #[diagnostic(
        code(relhier::config::unknown_metric),
        help("Valid metric names are: popularity, big_groups.")
    )]
    UnknownMetric { name: String },

    #[error("invalid weight {weight} for metric \"{metric}\"")]
    #[diagnostic(
        code(relhier::config::invalid_weight),
        help("Weights must be finite and non-negative.")
    )]
    InvalidWeight { metric: String, weight: f64 },

    #[error("no metrics configured")]
    #[diagnostic(
        code(relhier::config::no_metrics),
        help("List at least one metric under `selector.metrics`.")
    )]
    NoMetrics,

    #[error("invalid value for `{field}`: {message}")]
    #[diagnostic(
        code(relhier::config::invalid_value),
        help("Check the value against the documented range for this setting.")
    )]
    InvalidValue { field: String, message: String },

    #[error("unknown task type \"{name}\"")]
    #[diagnostic(
        code(relhier::config::unknown_task),
        help("Valid task types are: neighborhood, outlier, similarity, analogy, entities.")
    )]
    UnknownTask { name: String },

    #[error("invalid entity pattern \"{pattern}\": {message}")]
    #[diagnostic(
        code(relhier::config::entity_pattern),
        help("`tasks.entity_pattern` must be a valid regular expression.")
    )]
    EntityPattern { pattern: String, message: String },

    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(relhier::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(relhier::config::parse),
        help("Check the TOML syntax of the config file.")
    )]
    Parse { path: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Mapping errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MappingError {
    #[error("failed to read mapping input: {path}")]
    #[diagnostic(
        code(relhier::mapping::read),
        help("Ensure the triple cache or mapping snapshot exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write mapping snapshot: {path}")]
    #[diagnostic(
        code(relhier::mapping::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed triple at line {line}: {message}")]
    #[diagnostic(
        code(relhier::mapping::malformed_row),
        help(
            "Each row must have exactly three columns: subject, predicate, object. \
             Fields containing commas must be double-quoted."
        )
    )]
    MalformedRow { line: usize, message: String },

    #[error("malformed mapping snapshot: {message}")]
    #[diagnostic(
        code(relhier::mapping::snapshot),
        help("The JSON snapshot must be a list of {{predicate, object, subjects}} records.")
    )]
    Snapshot { message: String },

    #[error("property mapping is empty")]
    #[diagnostic(
        code(relhier::mapping::empty),
        help("The input contains no relations. A hierarchy needs at least one relation group.")
    )]
    Empty,
}

pub type MappingResult<T> = std::result::Result<T, MappingError>;

// ---------------------------------------------------------------------------
// Build errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("failed to start worker pool: {message}")]
    #[diagnostic(
        code(relhier::build::pool),
        help("Lower `builder.workers` or check the process thread limits.")
    )]
    Pool { message: String },

    #[error("worker failed splitting node {node}: {message}")]
    #[diagnostic(
        code(relhier::build::worker),
        help(
            "The build was aborted and no partial hierarchy was kept. \
             Re-run from the cached property mapping after fixing the input."
        )
    )]
    Worker { node: String, message: String },

    #[error("non-finite score for predicate {predicate} at node {node}")]
    #[diagnostic(
        code(relhier::build::non_finite_score),
        help("A metric produced NaN or infinity. Check the configured weights.")
    )]
    NonFiniteScore { node: String, predicate: String },
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

// ---------------------------------------------------------------------------
// Task generation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TaskError {
    #[error("failed to write task file: {path}")]
    #[diagnostic(
        code(relhier::task::write),
        help(
            "Check that the output directory is writable and the disk is not full. \
             Re-runs overwrite existing files, so the run can simply be repeated."
        )
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{task} task failed at {path}")]
    #[diagnostic(
        code(relhier::task::aborted),
        help("Traversal stopped at this hierarchy path. Files written before it remain valid.")
    )]
    Aborted {
        task: String,
        path: String,
        #[source]
        source: Box<TaskError>,
    },
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// Convenience alias for functions spanning several subsystems.
pub type RelhierResult<T> = std::result::Result<T, RelhierError>;
