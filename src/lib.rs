// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # relhier
//!
//! Builds a relational hierarchy over knowledge-graph entities by recursively
//! splitting them on their most discriminating outgoing relation, then walks
//! the hierarchy to emit benchmark datasets for entity and embedding models.
//!
//! ## Architecture
//!
//! - **Mapping** (`mapping`): `(predicate, object)` → subject-set index, with triple and JSON loaders
//! - **Selection** (`selector`): pruning heuristics and weighted multi-metric predicate scoring
//! - **Hierarchy** (`hierarchy`): arena tree grown level by level on a rayon pool
//! - **Traversal** (`traversal`): post-order walk with per-predicate aggregate calls
//! - **Tasks** (`tasks`): neighborhood, outlier, similarity, analogy and entity-list datasets
//!
//! ## Library usage
//!
//! ```no_run
//! use relhier::hierarchy::HierarchyBuilder;
//! use relhier::mapping::PropertyMapping;
//! use relhier::selector::SelectorOptions;
//! use relhier::tasks::{FsSink, TaskCreator, TaskKind, TaskRunner, TaskSettings};
//! use relhier::traversal::HierarchyTraversal;
//!
//! let mapping = PropertyMapping::from_triples([
//!     ("Q42", "P21", "Q6581097"),
//!     ("Q42", "P27", "Q145"),
//!     ("Q7259", "P21", "Q6581072"),
//! ]);
//! let (hierarchy, stats) = HierarchyBuilder::new(mapping, SelectorOptions::default())
//!     .build()
//!     .unwrap();
//! println!("{stats}");
//!
//! let creator = TaskCreator::new(TaskKind::Neighborhood, &TaskSettings::default());
//! let mut runner = TaskRunner::new(creator, FsSink::new("out"));
//! HierarchyTraversal::traverse(&hierarchy, &mut runner).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod hierarchy;
pub mod mapping;
pub mod selector;
pub mod tasks;
pub mod traversal;
