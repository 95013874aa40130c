//! Level-synchronous, parallel hierarchy construction.
//!
//! Each level's frontier is split on a rayon pool, one node per task. Workers
//! only read the immutable global [`PropertyMapping`] and their own node, so
//! the level barrier is the only synchronization point: children are
//! appended to the arena in frontier order after the whole level completes,
//! which keeps the tree identical regardless of worker count.
//!
//! Split decisions are memoized in a per-build [`SelectionCache`] keyed by a
//! fingerprint of the node's restricted relation set together with the
//! consumed predicates themselves.
//! Nodes reached through different split orders (P21 then P27 vs P27 then P21)
//! share one scoring pass.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::error::{BuildError, BuildResult};
use crate::mapping::{EntitySet, PropertyMapping, Relation, Term};
use crate::selector::{RelationSelector, SelectorOptions};

use super::{Hierarchy, Label, Node, NodeId};

/// Chosen predicate and its distinct objects, or `None` for a leaf.
type Decision = Option<(Term, Vec<Term>)>;

/// Restricted-mapping fingerprint plus the predicates consumed on the path.
type SelectionKey = (u64, BTreeSet<Term>);

/// Split decisions shared by the workers of one build.
#[derive(Debug, Default)]
pub struct SelectionCache {
    decisions: DashMap<SelectionKey, Decision>,
    hits: AtomicUsize,
}

impl SelectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    fn get(&self, key: &SelectionKey) -> Option<Decision> {
        let hit = self.decisions.get(key).map(|d| d.value().clone());
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn insert(&self, key: SelectionKey, decision: Decision) {
        self.decisions.insert(key, decision);
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Frontier levels processed (including the final, childless one).
    pub levels: usize,
    /// Total nodes in the arena.
    pub nodes: usize,
    /// Leaves reachable under the leaf rule.
    pub leaves: usize,
    /// Depth of the deepest reachable leaf.
    pub depth: usize,
    /// Split decisions served from the selection cache.
    pub cache_hits: usize,
}

impl std::fmt::Display for BuildStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "levels:     {}", self.levels)?;
        writeln!(f, "nodes:      {}", self.nodes)?;
        writeln!(f, "leaves:     {}", self.leaves)?;
        writeln!(f, "depth:      {}", self.depth)?;
        write!(f, "cache hits: {}", self.cache_hits)
    }
}

/// Recursively partitions the universe of a mapping into a [`Hierarchy`].
#[derive(Debug, Clone)]
pub struct HierarchyBuilder {
    mapping: Arc<PropertyMapping>,
    options: SelectorOptions,
    workers: usize,
    /// Label of a node whose split fails with a worker error.
    #[cfg(test)]
    fail_on: Option<String>,
}

impl HierarchyBuilder {
    pub const DEFAULT_WORKERS: usize = 25;

    pub fn new(mapping: PropertyMapping, options: SelectorOptions) -> Self {
        Self {
            mapping: Arc::new(mapping),
            options,
            workers: Self::DEFAULT_WORKERS,
            #[cfg(test)]
            fail_on: None,
        }
    }

    /// Size of the worker pool (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn mapping(&self) -> &PropertyMapping {
        &self.mapping
    }

    /// Grow the tree breadth-first until no frontier node yields children.
    ///
    /// Any worker failure aborts the build; no partial tree is returned.
    pub fn build(&self) -> BuildResult<(Hierarchy, BuildStats)> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| BuildError::Pool {
                message: e.to_string(),
            })?;
        let cache = SelectionCache::new();

        let mut hierarchy = Hierarchy::new(self.mapping.universe());
        let mut frontier = vec![hierarchy.root()];
        let mut levels = 0;

        tracing::info!(
            relations = self.mapping.len(),
            universe = hierarchy.node(hierarchy.root()).values.len(),
            workers = self.workers,
            "building hierarchy"
        );

        while !frontier.is_empty() {
            let splits: Vec<Option<Vec<Node>>> = pool.install(|| {
                frontier
                    .par_iter()
                    .map(|&id| self.split(hierarchy.node(id), &cache))
                    .collect::<BuildResult<Vec<_>>>()
            })?;

            let mut next: Vec<NodeId> = Vec::new();
            for (&parent, children) in frontier.iter().zip(splits) {
                for child in children.into_iter().flatten() {
                    next.push(hierarchy.add_child(parent, child));
                }
            }

            tracing::info!(
                level = levels,
                frontier = frontier.len(),
                children = next.len(),
                "hierarchy level complete"
            );
            frontier = next;
            levels += 1;
        }

        let stats = BuildStats {
            levels,
            nodes: hierarchy.len(),
            leaves: hierarchy.leaves().len(),
            depth: hierarchy.depth(),
            cache_hits: cache.hits(),
        };
        tracing::info!(
            nodes = stats.nodes,
            leaves = stats.leaves,
            depth = stats.depth,
            cache_hits = stats.cache_hits,
            "hierarchy built"
        );
        Ok((hierarchy, stats))
    }

    /// Compute the children of one frontier node, or `None` if it is a leaf.
    fn split(&self, node: &Node, cache: &SelectionCache) -> BuildResult<Option<Vec<Node>>> {
        #[cfg(test)]
        if self.fail_on.as_deref() == Some(node.label.to_string().as_str()) {
            return Err(BuildError::Worker {
                node: node.label.to_string(),
                message: "injected failure".to_string(),
            });
        }

        let local = self.mapping.restrict(&node.values);
        if local.is_empty() {
            return Ok(None);
        }

        let key = (local.fingerprint(), node.splits.clone());
        let decision = match cache.get(&key) {
            Some(decision) => decision,
            None => {
                let decision = self.select(node, local)?;
                cache.insert(key, decision.clone());
                decision
            }
        };
        let Some((predicate, objects)) = decision else {
            return Ok(None);
        };

        let mut splits = node.splits.clone();
        splits.insert(predicate.clone());

        let mut children = Vec::new();
        for object in objects {
            let relation = Relation {
                predicate: predicate.clone(),
                object,
            };
            let group = self.mapping.get(&relation).ok_or_else(|| BuildError::Worker {
                node: node.label.to_string(),
                message: format!("selected relation {relation} is missing from the mapping"),
            })?;
            let values: EntitySet = group.intersection(&node.values).cloned().collect();
            if values.is_empty() || values == node.values {
                continue;
            }
            children.push(Node {
                label: Label::Relation(relation),
                values,
                children: Vec::new(),
                splits: splits.clone(),
                is_root: false,
            });
        }
        Ok(Some(children))
    }

    /// Score the restricted mapping and pick the split predicate.
    fn select(&self, node: &Node, local: PropertyMapping) -> BuildResult<Decision> {
        let mut selector = RelationSelector::new(local, &self.options);
        if self.options.prune {
            selector.prune();
        }
        let Some(best) = selector.best(&node.splits) else {
            return Ok(None);
        };
        if !best.score.is_finite() {
            return Err(BuildError::NonFiniteScore {
                node: node.label.to_string(),
                predicate: best.predicate.to_string(),
            });
        }
        let objects = selector
            .relation_groups()
            .remove(&best.predicate)
            .unwrap_or_default();
        if objects.len() < 2 {
            return Ok(None);
        }
        Ok(Some((best.predicate, objects.into_iter().collect())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::MetricConfig;

    /// 40 people: P21 alternates by parity, P27 cycles over four countries,
    /// P106 covers the first 24 in three occupations.
    fn people() -> PropertyMapping {
        let mut mapping = PropertyMapping::new();
        for i in 0..40 {
            let subject = Term::new(format!("Q{i}"));
            let sex = if i % 2 == 0 { "male" } else { "female" };
            mapping.insert(Relation::new("P21", sex), subject.clone());
            mapping.insert(
                Relation::new("P27", format!("country{}", i % 4)),
                subject.clone(),
            );
            if i < 24 {
                mapping.insert(
                    Relation::new("P106", format!("job{}", i % 3)),
                    subject.clone(),
                );
            }
        }
        mapping
    }

    fn popularity_options() -> SelectorOptions {
        SelectorOptions {
            metrics: MetricConfig::popularity_only(),
            ..Default::default()
        }
    }

    fn failing_on(label: &str) -> HierarchyBuilder {
        HierarchyBuilder {
            fail_on: Some(label.to_string()),
            ..HierarchyBuilder::new(people(), popularity_options()).with_workers(4)
        }
    }

    fn build(mapping: PropertyMapping, workers: usize) -> (Hierarchy, BuildStats) {
        HierarchyBuilder::new(mapping, popularity_options())
            .with_workers(workers)
            .build()
            .unwrap()
    }

    #[test]
    fn root_holds_universe() {
        let mapping = people();
        let universe = mapping.universe();
        let (hierarchy, _) = build(mapping, 2);
        let root = hierarchy.node(hierarchy.root());
        assert!(root.is_root);
        assert_eq!(root.values, universe);
        assert!(root.splits.is_empty());
    }

    #[test]
    fn children_are_subsets_of_parents() {
        let (hierarchy, _) = build(people(), 4);
        for id in hierarchy.ids() {
            let node = hierarchy.node(id);
            for (_, child) in hierarchy.children(id) {
                assert!(child.values.is_subset(&node.values));
                assert!(!child.values.is_empty());
                assert_ne!(child.values, node.values);
            }
        }
    }

    #[test]
    fn predicates_are_never_reused_on_a_path() {
        let (hierarchy, _) = build(people(), 4);
        for id in hierarchy.ids() {
            let node = hierarchy.node(id);
            for (_, child) in hierarchy.children(id) {
                let relation = child.relation().unwrap();
                assert!(!node.splits.contains(&relation.predicate));
                assert!(child.splits.is_superset(&node.splits));
                assert!(child.splits.contains(&relation.predicate));
            }
        }
    }

    #[test]
    fn siblings_share_one_predicate() {
        let (hierarchy, _) = build(people(), 4);
        for id in hierarchy.ids() {
            let predicates: BTreeSet<&Term> = hierarchy
                .children(id)
                .map(|(_, c)| &c.relation().unwrap().predicate)
                .collect();
            assert!(predicates.len() <= 1);
        }
    }

    #[test]
    fn first_split_uses_most_popular_predicate() {
        let (hierarchy, stats) = build(people(), 4);
        let labels: Vec<String> = hierarchy
            .children(hierarchy.root())
            .map(|(_, c)| c.label.to_string())
            .collect();
        // P21 and P27 both cover everyone; P21 wins the tie.
        assert_eq!(labels, vec!["P21=female", "P21=male"]);
        assert!(stats.levels >= 2);
        assert_eq!(stats.nodes, hierarchy.len());
    }

    #[test]
    fn build_is_independent_of_worker_count() {
        let (single, _) = build(people(), 1);
        let (parallel, _) = build(people(), 8);
        assert_eq!(single, parallel);
    }

    #[test]
    fn leaves_satisfy_leaf_rule() {
        let (hierarchy, stats) = build(people(), 4);
        let leaves = hierarchy.leaves();
        assert_eq!(leaves.len(), stats.leaves);
        for id in leaves {
            let node = hierarchy.node(id);
            assert!(node.children.is_empty() || node.values.len() <= crate::hierarchy::LEAF_SIZE);
        }
    }

    #[test]
    fn single_full_coverage_relation_leaves_root_unsplit() {
        let mapping = PropertyMapping::from_triples([
            ("Q1", "P31", "Q5"),
            ("Q2", "P31", "Q5"),
            ("Q3", "P31", "Q5"),
        ]);
        let (hierarchy, stats) = build(mapping, 2);
        let root = hierarchy.node(hierarchy.root());
        assert!(root.children.is_empty());
        assert!(root.is_leaf());
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.leaves, 1);
    }

    #[test]
    fn repeated_subproblems_hit_the_cache() {
        let mut mapping = PropertyMapping::new();
        for i in 0..64 {
            let subject = Term::new(format!("Q{i}"));
            mapping.insert(Relation::new("A", format!("a{}", i % 2)), subject.clone());
            mapping.insert(Relation::new("B", format!("b{}", (i / 2) % 2)), subject.clone());
            mapping.insert(Relation::new("C", format!("c{}", (i / 4) % 2)), subject.clone());
        }
        let cache = SelectionCache::new();
        let builder = HierarchyBuilder::new(mapping, popularity_options());
        let mut hierarchy = Hierarchy::new(builder.mapping().universe());
        let root = hierarchy.root();
        let first = builder.split(hierarchy.node(root), &cache).unwrap().unwrap();
        for child in first {
            hierarchy.add_child(root, child);
        }
        let children: Vec<NodeId> = hierarchy.node(root).children.clone();
        for id in &children {
            builder.split(hierarchy.node(*id), &cache).unwrap();
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.hits(), 0);
        // Re-splitting a scored node is served from the cache.
        builder.split(hierarchy.node(children[0]), &cache).unwrap();
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn worker_failure_aborts_the_build() {
        let Err(BuildError::Worker { node, .. }) = failing_on("P21=male").build() else {
            panic!("build should fail when a second-level worker fails");
        };
        assert_eq!(node, "P21=male");

        let Err(BuildError::Worker { node, .. }) = failing_on("root").build() else {
            panic!("build should fail when the root worker fails");
        };
        assert_eq!(node, "root");
    }

    #[test]
    fn cache_distinguishes_consumed_predicates() {
        let builder = HierarchyBuilder::new(people(), popularity_options());
        let cache = SelectionCache::new();
        let root = Hierarchy::new(builder.mapping().universe());
        let mut consumed = root.node(root.root()).clone();
        builder.split(root.node(root.root()), &cache).unwrap();
        consumed.splits.insert(Term::from("P21"));
        let children = builder.split(&consumed, &cache).unwrap().unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 0);
        assert!(
            children
                .iter()
                .all(|c| c.relation().unwrap().predicate.as_str() != "P21")
        );
    }
}
