//! Analogy task: `(subject, object)` pairs sharing one predicate.

use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use regex::Regex;

use crate::hierarchy::Hierarchy;
use crate::mapping::EntitySet;
use crate::traversal::Visit;

use super::record::{TaskFile, filename_from_path};

const HEADER: &[&str] = &["a", "b"];

static RE_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(AnalogyTask::DEFAULT_PATTERN).unwrap());

/// Emits subject/object pairs on predicate-aggregate calls.
#[derive(Debug, Clone)]
pub struct AnalogyTask {
    per_object: usize,
    max_pairs: usize,
    entity_pattern: Regex,
    seed_entities: Option<EntitySet>,
    rng: StdRng,
}

impl AnalogyTask {
    pub const DEFAULT_PER_OBJECT: usize = 5;
    pub const DEFAULT_MAX_PAIRS: usize = 100;
    pub const DEFAULT_PATTERN: &str = r"^Q\d+$";
    pub const PREFIX: &str = "analogy";

    pub fn new(
        per_object: usize,
        max_pairs: usize,
        entity_pattern: Regex,
        seed_entities: Option<EntitySet>,
        rng: StdRng,
    ) -> Self {
        if seed_entities.is_none() {
            tracing::info!(
                pattern = entity_pattern.as_str(),
                "analogy runs without an allow-list, admitting every matching object"
            );
        }
        Self {
            per_object,
            max_pairs,
            entity_pattern,
            seed_entities,
            rng,
        }
    }

    pub(crate) fn default_pattern() -> Regex {
        RE_ENTITY.clone()
    }

    pub fn process_node(&mut self, hierarchy: &Hierarchy, visit: &Visit<'_>) -> Option<TaskFile> {
        if !visit.is_predicate {
            return None;
        }
        let predicate = visit.path.rsplit('/').next()?;

        let mut pairs: Vec<Vec<String>> = Vec::new();
        for (_, child) in hierarchy.children(visit.node) {
            let Some(relation) = child.relation() else { continue };
            let object = relation.object.short_id();
            if relation.predicate.short_id() != predicate || !self.admits(object) {
                continue;
            }
            let subjects: Vec<_> = child.values.iter().collect();
            pairs.extend(
                subjects
                    .choose_multiple(&mut self.rng, self.per_object)
                    .map(|subject| vec![subject.short_id().to_string(), object.to_string()]),
            );
        }

        pairs.shuffle(&mut self.rng);
        pairs.truncate(self.max_pairs);
        tracing::debug!(path = visit.path, pairs = pairs.len(), "analogy pairs sampled");

        (pairs.len() > 1).then(|| {
            TaskFile::new(filename_from_path(visit.path, Self::PREFIX), Some(HEADER), pairs)
        })
    }

    fn admits(&self, object: &str) -> bool {
        self.entity_pattern.is_match(object)
            && self
                .seed_entities
                .as_ref()
                .is_none_or(|seeds| seeds.contains(object))
    }
}
