//! Neighborhood task: consecutive entities grouped into similar clusters.

use crate::traversal::Visit;

use super::record::{TaskFile, filename_from_path, flag};

const HEADER: &[&str] = &["entity", "group_id", "is_similar"];

/// Chunks every call's entity list into clusters of at most `max_size`.
#[derive(Debug, Clone)]
pub struct NeighborhoodTask {
    max_size: usize,
}

impl NeighborhoodTask {
    pub const DEFAULT_MAX_SIZE: usize = 10;
    pub const PREFIX: &str = "neighborhood";

    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
        }
    }

    pub fn process_node(&mut self, visit: &Visit<'_>) -> Option<TaskFile> {
        let rows: Vec<Vec<String>> = visit
            .entities
            .chunks(self.max_size)
            .enumerate()
            .flat_map(|(group_id, chunk)| {
                chunk.iter().map(move |entity| {
                    vec![
                        entity.short_id().to_string(),
                        group_id.to_string(),
                        flag(true),
                    ]
                })
            })
            .collect();

        (rows.len() > 1).then(|| {
            TaskFile::new(
                filename_from_path(visit.path, Self::PREFIX),
                Some(HEADER),
                rows,
            )
        })
    }
}
