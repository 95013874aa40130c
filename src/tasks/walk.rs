//! Topology-aware random descent used for negative sampling.
//!
//! Outlier and similarity sampling both need entities drawn from a branch
//! that provably diverges from the visited node's path. The helpers here
//! walk the arena downward only; ancestor context comes from the caller.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::hierarchy::{Hierarchy, NodeId};
use crate::mapping::Term;

/// Descend from `start` to a leaf, choosing a child uniformly at each step.
pub fn descend_to_leaf<R: Rng + ?Sized>(hierarchy: &Hierarchy, start: NodeId, rng: &mut R) -> NodeId {
    let mut current = start;
    loop {
        let node = hierarchy.node(current);
        if node.is_leaf() {
            return current;
        }
        match node.children.choose(rng) {
            Some(&child) => current = child,
            None => return current,
        }
    }
}

/// Descend from `start` to a leaf, preferring children whose object is not
/// in `blocked_objects`. Falls back to any child when every child is blocked.
pub fn descend_avoiding<R: Rng + ?Sized>(
    hierarchy: &Hierarchy,
    start: NodeId,
    blocked_objects: &BTreeSet<&str>,
    rng: &mut R,
) -> NodeId {
    let mut current = start;
    loop {
        let node = hierarchy.node(current);
        if node.is_leaf() {
            return current;
        }
        let allowed: Vec<NodeId> = node
            .children
            .iter()
            .copied()
            .filter(|&child| permitted(hierarchy, child, blocked_objects))
            .collect();
        let next = if allowed.is_empty() {
            node.children.choose(rng)
        } else {
            allowed.choose(rng)
        };
        match next {
            Some(&child) => current = child,
            None => return current,
        }
    }
}

/// Walk from the root to a leaf that lies off the path `ancestors`.
///
/// `ancestors` is the root-to-node chain of the visited node. At each level
/// the walk prefers a child that is neither the on-path child nor labelled
/// with an object in `blocked_objects`; if no such child exists it follows
/// the path one level further down. Once diverged, it keeps steering around
/// blocked objects on the way down.
/// Returns `None` when the path offers no divergence before the visited node.
pub fn diverging_leaf<R: Rng + ?Sized>(
    hierarchy: &Hierarchy,
    ancestors: &[NodeId],
    blocked_objects: &BTreeSet<&str>,
    rng: &mut R,
) -> Option<NodeId> {
    let mut current = hierarchy.root();
    let mut depth = 0;
    loop {
        let node = hierarchy.node(current);
        if node.is_leaf() {
            return None;
        }
        let on_path = ancestors.get(depth + 1).copied();
        let off_path: Vec<NodeId> = node
            .children
            .iter()
            .copied()
            .filter(|&child| Some(child) != on_path && permitted(hierarchy, child, blocked_objects))
            .collect();
        if let Some(&branch) = off_path.choose(rng) {
            return Some(descend_avoiding(hierarchy, branch, blocked_objects, rng));
        }
        current = on_path?;
        depth += 1;
    }
}

/// Siblings of `on_path` under `parent` whose object is not blocked.
pub fn permitted_siblings(
    hierarchy: &Hierarchy,
    parent: NodeId,
    on_path: NodeId,
    blocked_objects: &BTreeSet<&str>,
) -> Vec<NodeId> {
    hierarchy
        .node(parent)
        .children
        .iter()
        .copied()
        .filter(|&child| child != on_path && permitted(hierarchy, child, blocked_objects))
        .collect()
}

/// Pick a value of `leaf` for which `exclude` is false.
pub fn pick_member<R: Rng + ?Sized>(
    hierarchy: &Hierarchy,
    leaf: NodeId,
    exclude: impl Fn(&Term) -> bool,
    rng: &mut R,
) -> Option<Term> {
    let candidates: Vec<&Term> = hierarchy
        .node(leaf)
        .values
        .iter()
        .filter(|value| !exclude(*value))
        .collect();
    candidates.choose(rng).map(|&value| value.clone())
}

fn permitted(hierarchy: &Hierarchy, child: NodeId, blocked_objects: &BTreeSet<&str>) -> bool {
    hierarchy
        .node(child)
        .relation()
        .is_none_or(|r| !blocked_objects.contains(r.object.short_id()))
}
