//! Post-order hierarchy traversal with pluggable visitors.
//!
//! For every node the traversal computes its flattened entity list and hands
//! it to a [`NodeVisitor`]:
//!
//! - a leaf is visited once with its own values;
//! - an internal node is visited once per distinct child predicate
//!   (`is_predicate = true`, entities = union over that predicate's
//!   children, path `…/predicate`), then once for itself (union over all
//!   children).
//!
//! Paths read `root/predicate/object/predicate/object/…` using short ids.
//! The walk uses an explicit frame stack; ancestor context is passed to the
//! visitor as a slice of node ids from the root down to the visited node.

use std::collections::BTreeSet;

use crate::error::TaskResult;
use crate::hierarchy::{Hierarchy, NodeId};
use crate::mapping::Term;

/// Path of the root node.
pub const ROOT_PATH: &str = "root";

/// One visitor invocation.
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    /// Hierarchy path; ends in `/predicate` for predicate-aggregate calls.
    pub path: &'a str,
    pub node: NodeId,
    /// Root-to-node chain, `ancestors.last() == Some(&node)`.
    pub ancestors: &'a [NodeId],
    /// Flattened entities for this call, in first-seen order.
    pub entities: &'a [Term],
    pub is_predicate: bool,
}

/// Receives every traversal call. Must not mutate the hierarchy.
///
/// An error aborts the traversal and is returned unchanged.
pub trait NodeVisitor {
    fn process_node(&mut self, hierarchy: &Hierarchy, visit: &Visit<'_>) -> TaskResult<()>;
}

impl<V: NodeVisitor + ?Sized> NodeVisitor for &mut V {
    fn process_node(&mut self, hierarchy: &Hierarchy, visit: &Visit<'_>) -> TaskResult<()> {
        (**self).process_node(hierarchy, visit)
    }
}

/// Entities accumulated from the children of one predicate.
#[derive(Debug, Default)]
struct PredicateGroup {
    predicate: String,
    seen: BTreeSet<Term>,
    entities: Vec<Term>,
}

impl PredicateGroup {
    fn extend(&mut self, entities: Vec<Term>) {
        for entity in entities {
            if self.seen.insert(entity.clone()) {
                self.entities.push(entity);
            }
        }
    }
}

#[derive(Debug)]
struct Frame {
    node: NodeId,
    path: String,
    next_child: usize,
    groups: Vec<PredicateGroup>,
}

impl Frame {
    fn new(node: NodeId, path: String) -> Self {
        Self {
            node,
            path,
            next_child: 0,
            groups: Vec::new(),
        }
    }

    /// Fold a finished child's entities into its predicate group.
    fn absorb(&mut self, predicate: &str, entities: Vec<Term>) {
        let index = match self.groups.iter().position(|g| g.predicate == predicate) {
            Some(index) => index,
            None => {
                self.groups.push(PredicateGroup {
                    predicate: predicate.to_string(),
                    ..Default::default()
                });
                self.groups.len() - 1
            }
        };
        self.groups[index].extend(entities);
    }
}

/// The canonical post-order walk.
pub struct HierarchyTraversal;

impl HierarchyTraversal {
    /// Walk `hierarchy` from the root, returning the root's entity list.
    pub fn traverse<V: NodeVisitor + ?Sized>(
        hierarchy: &Hierarchy,
        visitor: &mut V,
    ) -> TaskResult<Vec<Term>> {
        let root = hierarchy.root();
        let mut stack = vec![Frame::new(root, ROOT_PATH.to_string())];
        let mut ancestors = vec![root];

        while let Some(frame) = stack.last_mut() {
            let node = hierarchy.node(frame.node);

            if !node.is_leaf() && frame.next_child < node.children.len() {
                let child = node.children[frame.next_child];
                frame.next_child += 1;
                let path = match hierarchy.node(child).relation() {
                    Some(relation) => format!(
                        "{}/{}/{}",
                        frame.path,
                        relation.predicate.short_id(),
                        relation.object.short_id()
                    ),
                    None => format!("{}/{}", frame.path, hierarchy.node(child).label),
                };
                stack.push(Frame::new(child, path));
                ancestors.push(child);
                continue;
            }

            let Some(frame) = stack.pop() else { break };
            let entities = if node.is_leaf() {
                node.values.iter().cloned().collect()
            } else {
                let mut all = PredicateGroup::default();
                for group in frame.groups {
                    let path = format!("{}/{}", frame.path, group.predicate);
                    visitor.process_node(
                        hierarchy,
                        &Visit {
                            path: &path,
                            node: frame.node,
                            ancestors: &ancestors,
                            entities: &group.entities,
                            is_predicate: true,
                        },
                    )?;
                    all.extend(group.entities);
                }
                all.entities
            };

            visitor.process_node(
                hierarchy,
                &Visit {
                    path: &frame.path,
                    node: frame.node,
                    ancestors: &ancestors,
                    entities: &entities,
                    is_predicate: false,
                },
            )?;
            ancestors.pop();

            match stack.last_mut() {
                Some(parent) => {
                    let predicate = node
                        .relation()
                        .map(|r| r.predicate.short_id().to_string())
                        .unwrap_or_default();
                    parent.absorb(&predicate, entities);
                }
                None => return Ok(entities),
            }
        }

        Ok(Vec::new())
    }
}

/// Ancestor object ids on a path (`root/P21/Q1/P27/Q2` → `[Q1, Q2]`).
pub fn path_objects(path: &str) -> Vec<&str> {
    path.split('/').skip(2).step_by(2).collect()
}
