//! Outlier task: leaf clusters each padded with one entity from a
//! diverging branch.

use std::collections::BTreeSet;

use rand::rngs::StdRng;

use crate::hierarchy::Hierarchy;
use crate::mapping::Term;
use crate::traversal::{Visit, path_objects};

use super::record::{TaskFile, filename_from_path, flag};
use super::walk::{diverging_leaf, pick_member};

const HEADER: &[&str] = &["entity", "group_id", "is_outlier"];

/// Sampling attempts per cluster before the cluster is dropped.
const MAX_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct OutlierTask {
    max_group_size: usize,
    rng: StdRng,
}

impl OutlierTask {
    pub const DEFAULT_MAX_GROUP_SIZE: usize = 5;
    pub const PREFIX: &str = "outlier";

    /// `max_group_size` counts the outlier, so clusters hold
    /// `max_group_size - 1` members.
    pub fn new(max_group_size: usize, rng: StdRng) -> Self {
        Self {
            max_group_size: max_group_size.max(2),
            rng,
        }
    }

    pub fn process_node(&mut self, hierarchy: &Hierarchy, visit: &Visit<'_>) -> Option<TaskFile> {
        let node = hierarchy.node(visit.node);
        if visit.is_predicate || !node.is_leaf() {
            return None;
        }

        let blocked: BTreeSet<&str> = path_objects(visit.path).into_iter().collect();
        let mut rows = Vec::new();
        let mut group_id = 0usize;

        for members in visit.entities.chunks_exact(self.max_group_size - 1) {
            let Some(outlier) = self.sample(hierarchy, visit, &blocked) else {
                tracing::warn!(
                    path = visit.path,
                    group = group_id,
                    "no outlier reachable off the path, dropping group"
                );
                continue;
            };
            rows.extend(
                members
                    .iter()
                    .map(|m| vec![m.short_id().to_string(), group_id.to_string(), flag(false)]),
            );
            rows.push(vec![outlier.short_id().to_string(), group_id.to_string(), flag(true)]);
            group_id += 1;
        }

        (group_id > 0).then(|| {
            TaskFile::new(filename_from_path(visit.path, Self::PREFIX), Some(HEADER), rows)
        })
    }

    fn sample(
        &mut self,
        hierarchy: &Hierarchy,
        visit: &Visit<'_>,
        blocked: &BTreeSet<&str>,
    ) -> Option<Term> {
        let values = &hierarchy.node(visit.node).values;
        let excluded = |t: &Term| values.contains(t) || blocked.contains(t.short_id());
        (0..MAX_ATTEMPTS).find_map(|_| {
            let leaf = diverging_leaf(hierarchy, visit.ancestors, blocked, &mut self.rng)?;
            pick_member(hierarchy, leaf, excluded, &mut self.rng)
        })
    }
}
