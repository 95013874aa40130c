//! Task creators: traversal visitors that emit benchmark datasets.
//!
//! Each [`TaskCreator`] variant decides whether a traversal call applies to
//! it and, if so, produces one [`TaskFile`] named after the hierarchy path.
//! Producing nothing (too few records, not applicable) is a normal outcome.
//! Creators are pure; writing is done by a [`sink::TaskRunner`].
//!
//! | Task          | Applies to                       | Header                        |
//! |---------------|----------------------------------|-------------------------------|
//! | neighborhood  | every call                       | `entity,group_id,is_similar`  |
//! | outlier       | leaves                           | `entity,group_id,is_outlier`  |
//! | similarity    | leaves with ≥ 2 values           | `a,b,group_id,rank`           |
//! | analogy       | predicate-aggregate calls        | `a,b`                         |
//! | entities      | internal nodes                   | none                          |
//!
//! Creators that sample own a [`StdRng`] seeded at construction, so a fixed
//! hierarchy, seed, and traversal order reproduce byte-identical files.

pub mod analogy;
pub mod collector;
pub mod neighborhood;
pub mod outlier;
pub mod record;
pub mod similarity;
pub mod sink;
pub mod walk;

use std::str::FromStr;

use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hierarchy::Hierarchy;
use crate::mapping::EntitySet;
use crate::traversal::Visit;

pub use analogy::AnalogyTask;
pub use collector::EntityCollector;
pub use neighborhood::NeighborhoodTask;
pub use outlier::OutlierTask;
pub use record::TaskFile;
pub use similarity::SimilarityTask;
pub use sink::{FsSink, MemorySink, TaskRunner, TaskSink};

/// The kinds of dataset a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Neighborhood,
    Outlier,
    Similarity,
    Analogy,
    Entities,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Neighborhood,
        TaskKind::Outlier,
        TaskKind::Similarity,
        TaskKind::Analogy,
        TaskKind::Entities,
    ];

    /// File-name prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            TaskKind::Neighborhood => "neighborhood",
            TaskKind::Outlier => "outlier",
            TaskKind::Similarity => "similarity",
            TaskKind::Analogy => "analogy",
            TaskKind::Entities => "entities",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.prefix())
    }
}

impl FromStr for TaskKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.prefix() == s.trim())
            .ok_or_else(|| ConfigError::UnknownTask { name: s.to_string() })
    }
}

/// Parameters shared by all creators of a run.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub seed: u64,
    pub neighborhood_max_size: usize,
    pub outlier_max_group_size: usize,
    pub similarity_pairs_per_leaf: usize,
    pub analogy_per_object: usize,
    pub analogy_max_pairs: usize,
    /// Objects must match this to be used in analogy pairs.
    pub entity_pattern: Regex,
    /// Analogy object allow-list; `None` admits every matching object.
    pub seed_entities: Option<EntitySet>,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            neighborhood_max_size: NeighborhoodTask::DEFAULT_MAX_SIZE,
            outlier_max_group_size: OutlierTask::DEFAULT_MAX_GROUP_SIZE,
            similarity_pairs_per_leaf: 1,
            analogy_per_object: AnalogyTask::DEFAULT_PER_OBJECT,
            analogy_max_pairs: AnalogyTask::DEFAULT_MAX_PAIRS,
            entity_pattern: AnalogyTask::default_pattern(),
            seed_entities: None,
        }
    }
}

/// One task-generation visitor. Variants carry their own configuration.
#[derive(Debug, Clone)]
pub enum TaskCreator {
    Neighborhood(NeighborhoodTask),
    Outlier(OutlierTask),
    Similarity(SimilarityTask),
    Analogy(AnalogyTask),
    Entities(EntityCollector),
}

impl TaskCreator {
    pub fn new(kind: TaskKind, settings: &TaskSettings) -> Self {
        let rng = || StdRng::seed_from_u64(settings.seed);
        match kind {
            TaskKind::Neighborhood => {
                TaskCreator::Neighborhood(NeighborhoodTask::new(settings.neighborhood_max_size))
            }
            TaskKind::Outlier => {
                TaskCreator::Outlier(OutlierTask::new(settings.outlier_max_group_size, rng()))
            }
            TaskKind::Similarity => TaskCreator::Similarity(SimilarityTask::new(
                settings.similarity_pairs_per_leaf,
                rng(),
            )),
            TaskKind::Analogy => TaskCreator::Analogy(AnalogyTask::new(
                settings.analogy_per_object,
                settings.analogy_max_pairs,
                settings.entity_pattern.clone(),
                settings.seed_entities.clone(),
                rng(),
            )),
            TaskKind::Entities => TaskCreator::Entities(EntityCollector),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskCreator::Neighborhood(_) => TaskKind::Neighborhood,
            TaskCreator::Outlier(_) => TaskKind::Outlier,
            TaskCreator::Similarity(_) => TaskKind::Similarity,
            TaskCreator::Analogy(_) => TaskKind::Analogy,
            TaskCreator::Entities(_) => TaskKind::Entities,
        }
    }

    /// Handle one traversal call; `None` when the call is not applicable
    /// or yields too few records.
    pub fn process_node(&mut self, hierarchy: &Hierarchy, visit: &Visit<'_>) -> Option<TaskFile> {
        match self {
            TaskCreator::Neighborhood(task) => task.process_node(visit),
            TaskCreator::Outlier(task) => task.process_node(hierarchy, visit),
            TaskCreator::Similarity(task) => task.process_node(hierarchy, visit),
            TaskCreator::Analogy(task) => task.process_node(hierarchy, visit),
            TaskCreator::Entities(task) => task.process_node(hierarchy, visit),
        }
    }
}
