//! Relational hierarchy: an arena tree of entity partitions.
//!
//! The root holds the whole universe. Every other node is labelled with the
//! [`Relation`] its values share and holds a subset of its parent's values.
//! Nodes are addressed by [`NodeId`]; parents own child indices and there are
//! no back edges, so ancestor context is always carried by the caller.

pub mod builder;
pub mod dump;

use std::collections::BTreeSet;

use crate::mapping::{EntitySet, Relation, Term};

pub use builder::{BuildStats, HierarchyBuilder};

/// Nodes with at most this many values are leaves regardless of children.
pub const LEAF_SIZE: usize = 15;

/// Index of a node in its [`Hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// What a node stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Root,
    Relation(Relation),
}

impl Label {
    pub fn relation(&self) -> Option<&Relation> {
        match self {
            Label::Root => None,
            Label::Relation(relation) => Some(relation),
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Root => f.write_str("root"),
            Label::Relation(relation) => relation.fmt(f),
        }
    }
}

/// One partition of entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub label: Label,
    pub values: EntitySet,
    pub children: Vec<NodeId>,
    /// Predicates consumed on the root-to-node path; never split on again below.
    pub splits: BTreeSet<Term>,
    pub is_root: bool,
}

impl Node {
    pub fn root(values: EntitySet) -> Self {
        Self {
            label: Label::Root,
            values,
            children: Vec::new(),
            splits: BTreeSet::new(),
            is_root: true,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() || self.values.len() <= LEAF_SIZE
    }

    /// `(predicate, object)` of a non-root node.
    pub fn relation(&self) -> Option<&Relation> {
        self.label.relation()
    }
}

/// Arena-backed tree produced by [`HierarchyBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    nodes: Vec<Node>,
}

impl Hierarchy {
    pub fn new(root_values: EntitySet) -> Self {
        Self {
            nodes: vec![Node::root(root_values)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes[id.0]
            .children
            .iter()
            .map(move |&child| (child, &self.nodes[child.0]))
    }

    /// Append a child under `parent`. Children are only ever appended.
    pub fn add_child(&mut self, parent: NodeId, child: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(child);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// All node ids in creation order (root first, then level by level).
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Leaves reachable from the root, depth-first in child order.
    ///
    /// Descent stops at the first node satisfying [`Node::is_leaf`].
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if node.is_leaf() {
                leaves.push(id);
            } else {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        leaves
    }

    /// Depth of the deepest reachable leaf (root alone is depth 0).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self.root(), 0usize)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let node = self.node(id);
            if !node.is_leaf() {
                stack.extend(node.children.iter().map(|&c| (c, depth + 1)));
            }
        }
        max_depth
    }
}
