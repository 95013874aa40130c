//! Entity collector: the full entity list of every internal node.

use crate::hierarchy::Hierarchy;
use crate::traversal::Visit;

use super::record::{TaskFile, filename_from_path};

#[derive(Debug, Clone, Copy, Default)]
pub struct EntityCollector;

impl EntityCollector {
    pub const PREFIX: &str = "entities";

    pub fn process_node(&mut self, hierarchy: &Hierarchy, visit: &Visit<'_>) -> Option<TaskFile> {
        if visit.is_predicate || hierarchy.node(visit.node).is_leaf() {
            return None;
        }
        let rows = visit
            .entities
            .iter()
            .map(|entity| vec![entity.short_id().to_string()])
            .collect();
        Some(TaskFile::new(filename_from_path(visit.path, Self::PREFIX), None, rows))
    }
}
