//! Relation selection: choosing the predicate a node is split on.
//!
//! A [`RelationSelector`] owns a [`PropertyMapping`] restricted to one node's
//! values. It prunes noise (singleton groups, predicates covering too little of
//! the universe, near-duplicate object groups) and then scores every surviving
//! predicate with the configured weighted metrics.
//!
//! Having no candidate left is a normal outcome: [`RelationSelector::top_property`]
//! returns `None` and the caller treats the node as a leaf.

pub mod metrics;

use std::collections::{BTreeMap, BTreeSet};

use crate::mapping::{EntitySet, PropertyMapping, Relation, Term};

pub use metrics::{Metric, MetricConfig};

/// Pruning and scoring parameters for a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorOptions {
    /// Weighted metric list.
    pub metrics: MetricConfig,
    /// Predicates whose summed group sizes fall below this share of the universe are dropped.
    pub rare_fraction: f64,
    /// Object groups overlapping above this coefficient are merged into the larger one.
    pub overlap_threshold: f64,
    /// Apply unique/rare/overlap removal before scoring.
    pub prune: bool,
}

impl SelectorOptions {
    pub const DEFAULT_RARE_FRACTION: f64 = 0.1;
    pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.3;
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            metrics: MetricConfig::default(),
            rare_fraction: Self::DEFAULT_RARE_FRACTION,
            overlap_threshold: Self::DEFAULT_OVERLAP_THRESHOLD,
            prune: true,
        }
    }
}

/// Score of one candidate predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateScore {
    pub predicate: Term,
    /// Raw metric values, in configured order.
    pub values: Vec<(Metric, f64)>,
    /// Weighted sum of `values`.
    pub score: f64,
}

/// `|A ∩ B| / min(|A|, |B|)`; zero if either set is empty.
pub fn overlap_coefficient(a: &EntitySet, b: &EntitySet) -> f64 {
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / smaller as f64
}

/// Scores and prunes the relation groups of one node.
#[derive(Debug, Clone)]
pub struct RelationSelector<'a> {
    mapping: PropertyMapping,
    universe: usize,
    options: &'a SelectorOptions,
}

impl<'a> RelationSelector<'a> {
    /// The universe size is fixed here, before any pruning.
    pub fn new(mapping: PropertyMapping, options: &'a SelectorOptions) -> Self {
        let universe = mapping.universe().len();
        Self {
            mapping,
            universe,
            options,
        }
    }

    pub fn mapping(&self) -> &PropertyMapping {
        &self.mapping
    }

    pub fn universe_size(&self) -> usize {
        self.universe
    }

    /// Relation → group size, for groups larger than `threshold`.
    pub fn property_counter(&self, threshold: usize) -> BTreeMap<Relation, usize> {
        self.mapping
            .iter()
            .filter(|(_, group)| group.len() > threshold)
            .map(|(relation, group)| (relation.clone(), group.len()))
            .collect()
    }

    /// Number of non-singleton groups per predicate. Its keys are the candidate predicates.
    pub fn group_counter(&self) -> BTreeMap<Term, usize> {
        let mut counts = BTreeMap::new();
        for relation in self.property_counter(1).into_keys() {
            *counts.entry(relation.predicate).or_insert(0) += 1;
        }
        counts
    }

    /// Candidate predicate → every object observed with it.
    pub fn relation_groups(&self) -> BTreeMap<Term, BTreeSet<Term>> {
        self.group_counter()
            .into_keys()
            .map(|predicate| {
                let objects = self
                    .mapping
                    .groups_of(&predicate)
                    .map(|(object, _)| object.clone())
                    .collect();
                (predicate, objects)
            })
            .collect()
    }

    /// Drop relations whose group has a single member. Returns the number removed.
    pub fn remove_unique_relations(&mut self) -> usize {
        let before = self.mapping.len();
        self.mapping.retain(|_, group| group.len() > 1);
        before - self.mapping.len()
    }

    /// Drop every group of a predicate whose summed group sizes are below
    /// `fraction · |universe|`. Returns the number of predicates removed.
    pub fn remove_rare_relations(&mut self, fraction: f64) -> usize {
        let cutoff = fraction * self.universe as f64;
        let mut totals: BTreeMap<Term, usize> = BTreeMap::new();
        for (relation, group) in self.mapping.iter() {
            *totals.entry(relation.predicate.clone()).or_insert(0) += group.len();
        }
        let rare: BTreeSet<Term> = totals
            .into_iter()
            .filter(|(_, total)| (*total as f64) < cutoff)
            .map(|(predicate, total)| {
                tracing::debug!(%predicate, total, cutoff, "removing rare predicate");
                predicate
            })
            .collect();
        if !rare.is_empty() {
            self.mapping
                .retain(|relation, _| !rare.contains(&relation.predicate));
        }
        rare.len()
    }

    /// Remove the smaller of any two same-predicate groups whose overlap
    /// coefficient exceeds the configured threshold.
    ///
    /// Pairs are visited in ascending object order and groups already removed
    /// are not compared again, so no two surviving groups of a predicate
    /// overlap above the threshold. On equal sizes the group with the greater
    /// object id is removed. Returns the number of groups removed.
    pub fn remove_overlapping_relation_groups(&mut self) -> usize {
        let threshold = self.options.overlap_threshold;
        let mut doomed: Vec<Relation> = Vec::new();

        for predicate in self.mapping.predicates() {
            let groups: Vec<(&Term, &EntitySet)> = self.mapping.groups_of(predicate).collect();
            let mut removed = vec![false; groups.len()];

            for i in 0..groups.len() {
                for j in (i + 1)..groups.len() {
                    if removed[i] {
                        break;
                    }
                    if removed[j] {
                        continue;
                    }
                    let (object_i, group_i) = groups[i];
                    let (object_j, group_j) = groups[j];
                    if overlap_coefficient(group_i, group_j) <= threshold {
                        continue;
                    }
                    let (drop, keep) = if group_i.len() < group_j.len() {
                        (i, object_j)
                    } else {
                        (j, object_i)
                    };
                    removed[drop] = true;
                    tracing::debug!(
                        %predicate,
                        removed = %groups[drop].0,
                        kept = %keep,
                        "removing overlapping relation group"
                    );
                }
            }

            doomed.extend(
                groups
                    .iter()
                    .zip(&removed)
                    .filter(|(_, gone)| **gone)
                    .map(|((object, _), _)| Relation {
                        predicate: predicate.clone(),
                        object: (*object).clone(),
                    }),
            );
        }

        for relation in &doomed {
            self.mapping.remove(relation);
        }
        doomed.len()
    }

    /// Apply unique, rare, and overlap removal with the configured parameters.
    pub fn prune(&mut self) {
        self.remove_unique_relations();
        self.remove_rare_relations(self.options.rare_fraction);
        self.remove_overlapping_relation_groups();
    }

    /// Score every candidate predicate not in `not_include`, in predicate order.
    pub fn scores(&self, not_include: &BTreeSet<Term>) -> Vec<PredicateScore> {
        let metrics = &self.options.metrics;
        self.group_counter()
            .into_keys()
            .filter(|predicate| !not_include.contains(predicate))
            .map(|predicate| {
                let groups: Vec<&EntitySet> =
                    self.mapping.groups_of(&predicate).map(|(_, g)| g).collect();
                let values: Vec<(Metric, f64)> = metrics
                    .entries()
                    .iter()
                    .map(|(metric, _)| (*metric, metrics.evaluate(*metric, &groups, self.universe)))
                    .collect();
                let score = values
                    .iter()
                    .zip(metrics.entries())
                    .map(|((_, value), (_, weight))| value * weight)
                    .sum();
                PredicateScore {
                    predicate,
                    values,
                    score,
                }
            })
            .collect()
    }

    /// Highest-scoring candidate; ties go to the smallest predicate id.
    pub fn best(&self, not_include: &BTreeSet<Term>) -> Option<PredicateScore> {
        let mut best: Option<PredicateScore> = None;
        for candidate in self.scores(not_include) {
            let better = match &best {
                None => true,
                Some(current) => candidate.score > current.score || current.score.is_nan(),
            };
            if better {
                best = Some(candidate);
            }
        }
        best
    }

    /// The predicate to split on, or `None` if no eligible predicate remains.
    pub fn top_property(&self, not_include: &BTreeSet<Term>) -> Option<Term> {
        self.best(not_include).map(|s| s.predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> EntitySet {
        ids.iter().map(|id| Term::from(*id)).collect()
    }

    fn terms(ids: &[&str]) -> BTreeSet<Term> {
        set(ids)
    }

    fn mapping(groups: &[(&str, &str, &[&str])]) -> PropertyMapping {
        groups
            .iter()
            .map(|(p, o, members)| (Relation::new(*p, *o), set(members)))
            .collect()
    }

    fn popularity_options() -> SelectorOptions {
        SelectorOptions {
            metrics: MetricConfig::popularity_only(),
            ..Default::default()
        }
    }

    #[test]
    fn property_counter_applies_threshold() {
        let options = SelectorOptions::default();
        let selector = RelationSelector::new(
            mapping(&[
                ("P21", "male", &["a", "b", "c"]),
                ("P21", "female", &["d"]),
            ]),
            &options,
        );
        let counts = selector.property_counter(1);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&Relation::new("P21", "male")], 3);
        assert_eq!(selector.property_counter(0).len(), 2);
    }

    #[test]
    fn relation_groups_lists_all_objects_of_candidates() {
        let options = SelectorOptions::default();
        let selector = RelationSelector::new(
            mapping(&[
                ("P21", "male", &["a", "b"]),
                ("P21", "female", &["c"]),
                ("P27", "fr", &["a"]),
            ]),
            &options,
        );
        assert_eq!(selector.group_counter(), BTreeMap::from([(Term::from("P21"), 1)]));
        let groups = selector.relation_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[&Term::from("P21")], terms(&["female", "male"]));
    }

    #[test]
    fn remove_unique_relations_is_idempotent() {
        let options = SelectorOptions::default();
        let mut selector = RelationSelector::new(
            mapping(&[
                ("P21", "male", &["a", "b"]),
                ("P21", "female", &["c"]),
                ("P27", "fr", &["d"]),
            ]),
            &options,
        );
        assert_eq!(selector.remove_unique_relations(), 2);
        let once = selector.mapping().clone();
        assert_eq!(selector.remove_unique_relations(), 0);
        assert_eq!(selector.mapping(), &once);
    }

    #[test]
    fn remove_rare_relations_keeps_covering_predicates() {
        let options = SelectorOptions::default();
        // universe = 10 entities
        let mut selector = RelationSelector::new(
            mapping(&[
                ("P21", "male", &["a", "b", "c", "d", "e"]),
                ("P21", "female", &["f", "g", "h", "i", "j"]),
                ("P27", "fr", &["a", "b"]),
                ("P27", "de", &["c"]),
                ("P106", "poet", &["a"]),
            ]),
            &options,
        );
        assert_eq!(selector.universe_size(), 10);
        // P27 covers exactly 3 = 0.3 · 10 and must survive; P106 covers 1.
        assert_eq!(selector.remove_rare_relations(0.3), 1);
        let predicates: Vec<&str> = selector
            .mapping()
            .predicates()
            .into_iter()
            .map(|p| p.as_str())
            .collect();
        assert_eq!(predicates, vec!["P21", "P27"]);
    }

    #[test]
    fn overlapping_groups_drop_the_smaller() {
        let options = SelectorOptions::default();
        let mut selector = RelationSelector::new(
            mapping(&[
                ("P106", "writer", &["a", "b", "c", "d"]),
                ("P106", "poet", &["a", "b"]),
                ("P106", "painter", &["x", "y", "z"]),
            ]),
            &options,
        );
        assert_eq!(selector.remove_overlapping_relation_groups(), 1);
        assert!(!selector.mapping().contains(&Relation::new("P106", "poet")));
        assert!(selector.mapping().contains(&Relation::new("P106", "writer")));
        assert!(selector.mapping().contains(&Relation::new("P106", "painter")));
    }

    #[test]
    fn overlap_tie_keeps_smaller_object_id() {
        let options = SelectorOptions::default();
        let mut selector = RelationSelector::new(
            mapping(&[
                ("P106", "b-role", &["a", "b", "c"]),
                ("P106", "a-role", &["a", "b", "d"]),
            ]),
            &options,
        );
        assert_eq!(selector.remove_overlapping_relation_groups(), 1);
        assert!(selector.mapping().contains(&Relation::new("P106", "a-role")));
        assert!(!selector.mapping().contains(&Relation::new("P106", "b-role")));
    }

    #[test]
    fn surviving_groups_never_overlap_above_threshold() {
        let options = SelectorOptions::default();
        let mut selector = RelationSelector::new(
            mapping(&[
                ("P1", "o1", &["a", "b", "c", "d", "e"]),
                ("P1", "o2", &["a", "b", "f", "g"]),
                ("P1", "o3", &["f", "g", "h"]),
                ("P1", "o4", &["x", "y"]),
            ]),
            &options,
        );
        selector.remove_overlapping_relation_groups();
        let p1 = Term::from("P1");
        let groups: Vec<&EntitySet> = selector.mapping().groups_of(&p1).map(|(_, g)| g).collect();
        for (i, a) in groups.iter().enumerate() {
            for b in &groups[i + 1..] {
                assert!(overlap_coefficient(a, b) <= options.overlap_threshold);
            }
        }
    }

    #[test]
    fn top_property_respects_not_include() {
        let options = popularity_options();
        let selector = RelationSelector::new(
            mapping(&[
                ("P21", "male", &["a", "b", "c"]),
                ("P21", "female", &["d", "e"]),
                ("P27", "fr", &["a", "b"]),
            ]),
            &options,
        );
        assert_eq!(selector.top_property(&BTreeSet::new()), Some(Term::from("P21")));
        assert_eq!(selector.top_property(&terms(&["P21"])), Some(Term::from("P27")));
        assert_eq!(selector.top_property(&terms(&["P21", "P27"])), None);
    }

    #[test]
    fn top_property_ties_go_to_smallest_predicate() {
        let options = popularity_options();
        let selector = RelationSelector::new(
            mapping(&[
                ("P9", "x", &["a", "b"]),
                ("P10", "y", &["a", "b"]),
            ]),
            &options,
        );
        // "P10" < "P9" lexicographically.
        assert_eq!(selector.top_property(&BTreeSet::new()), Some(Term::from("P10")));
    }

    #[test]
    fn weights_change_the_winner() {
        let groups = mapping(&[
            // Covers everyone, spread thinly across many groups.
            ("P1", "o1", &["a", "b"]),
            ("P1", "o2", &["c", "d"]),
            ("P1", "o3", &["e", "f"]),
            ("P1", "o4", &["g", "h"]),
            // Covers half, concentrated in one group.
            ("P2", "o1", &["a", "b", "c", "d"]),
        ]);

        let options = popularity_options();
        let selector = RelationSelector::new(groups.clone(), &options);
        assert_eq!(selector.top_property(&BTreeSet::new()), Some(Term::from("P1")));

        let options = SelectorOptions {
            metrics: MetricConfig::new(vec![(Metric::Popularity, 0.2), (Metric::BigGroups, 0.8)], 1)
                .unwrap(),
            ..Default::default()
        };
        let selector = RelationSelector::new(groups, &options);
        let scores = selector.scores(&BTreeSet::new());
        assert_eq!(scores.len(), 2);
        assert_eq!(selector.top_property(&BTreeSet::new()), Some(Term::from("P2")));
    }

    #[test]
    fn empty_mapping_has_no_candidate() {
        let options = SelectorOptions::default();
        let mut selector = RelationSelector::new(PropertyMapping::new(), &options);
        selector.prune();
        assert_eq!(selector.top_property(&BTreeSet::new()), None);
    }
}
