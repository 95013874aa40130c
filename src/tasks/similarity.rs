//! Similarity task: ranked comparison pairs around a leaf.
//!
//! Two canonical members of a leaf form the base pair at rank 0. The task then
//! ascends toward the root; at every ancestor level it swaps the on-path
//! branch for a permitted sibling branch and samples one comparison entity
//! there. The number of levels ascended is the row's rank, so a higher rank
//! means the comparison entity shares a shorter prefix of the path with `a`.
//!
//! A sibling is permitted when its object does not already appear on the
//! path. A level without a permitted sibling contributes no row; the ascent
//! still continues to the root.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::hierarchy::Hierarchy;
use crate::mapping::Term;
use crate::traversal::{Visit, path_objects};

use super::record::{TaskFile, filename_from_path};
use super::walk::{descend_to_leaf, permitted_siblings, pick_member};

const HEADER: &[&str] = &["a", "b", "group_id", "rank"];

#[derive(Debug, Clone)]
pub struct SimilarityTask {
    pairs_per_leaf: usize,
    rng: StdRng,
}

impl SimilarityTask {
    pub const PREFIX: &str = "similarity";

    pub fn new(pairs_per_leaf: usize, rng: StdRng) -> Self {
        Self {
            pairs_per_leaf: pairs_per_leaf.max(1),
            rng,
        }
    }

    pub fn process_node(&mut self, hierarchy: &Hierarchy, visit: &Visit<'_>) -> Option<TaskFile> {
        let node = hierarchy.node(visit.node);
        if visit.is_predicate || !node.is_leaf() || node.values.len() < 2 {
            return None;
        }

        let blocked: BTreeSet<&str> = path_objects(visit.path).into_iter().collect();
        let members: Vec<&Term> = node.values.iter().collect();
        let mut rows = Vec::new();
        let mut group_id = 0usize;

        for pair in members.chunks_exact(2).take(self.pairs_per_leaf) {
            let (a, b) = (pair[0], pair[1]);
            let comparisons = self.comparisons(hierarchy, visit, &blocked, a, b);
            if comparisons.is_empty() {
                tracing::warn!(
                    path = visit.path,
                    a = %a,
                    b = %b,
                    "no permitted sibling branch, dropping pair"
                );
                continue;
            }
            let group = group_id.to_string();
            rows.push(vec![
                a.short_id().to_string(),
                b.short_id().to_string(),
                group.clone(),
                "0".into(),
            ]);
            for (rank, other) in comparisons {
                rows.push(vec![
                    a.short_id().to_string(),
                    other.short_id().to_string(),
                    group.clone(),
                    rank.to_string(),
                ]);
            }
            group_id += 1;
        }

        (group_id > 0).then(|| {
            TaskFile::new(filename_from_path(visit.path, Self::PREFIX), Some(HEADER), rows)
        })
    }

    /// One `(rank, entity)` per ancestor level that offers a permitted sibling.
    fn comparisons(
        &mut self,
        hierarchy: &Hierarchy,
        visit: &Visit<'_>,
        blocked: &BTreeSet<&str>,
        a: &Term,
        b: &Term,
    ) -> Vec<(usize, Term)> {
        let values = &hierarchy.node(visit.node).values;
        let excluded = |t: &Term| {
            t == a || t == b || values.contains(t) || blocked.contains(t.short_id())
        };

        let mut found = Vec::new();
        for (rank, window) in visit.ancestors.windows(2).rev().enumerate() {
            let (parent, on_path) = (window[0], window[1]);
            let mut siblings = permitted_siblings(hierarchy, parent, on_path, blocked);
            siblings.shuffle(&mut self.rng);
            let sampled = siblings.into_iter().find_map(|sibling| {
                let leaf = descend_to_leaf(hierarchy, sibling, &mut self.rng);
                pick_member(hierarchy, leaf, excluded, &mut self.rng)
            });
            if let Some(other) = sampled {
                found.push((rank + 1, other));
            }
        }
        found
    }
}
