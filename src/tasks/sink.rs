//! Destinations for task files, and the visitor that feeds them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{TaskError, TaskResult};
use crate::hierarchy::Hierarchy;
use crate::traversal::{NodeVisitor, Visit};

use super::TaskCreator;
use super::record::TaskFile;

/// Receives rendered task files.
pub trait TaskSink {
    fn write(&mut self, file: &TaskFile) -> TaskResult<()>;
}

impl<S: TaskSink + ?Sized> TaskSink for &mut S {
    fn write(&mut self, file: &TaskFile) -> TaskResult<()> {
        (**self).write(file)
    }
}

/// Writes files under a root directory, replacing existing ones.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TaskSink for FsSink {
    fn write(&mut self, file: &TaskFile) -> TaskResult<()> {
        let path = self.root.join(&file.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TaskError::Write {
                path: parent.display().to_string(),
                source,
            })?;
        }
        std::fs::write(&path, file.render()).map_err(|source| TaskError::Write {
            path: path.display().to_string(),
            source,
        })?;
        tracing::debug!(path = %path.display(), rows = file.len(), "wrote task file");
        Ok(())
    }
}

/// Keeps rendered files in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub files: BTreeMap<String, String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskSink for MemorySink {
    fn write(&mut self, file: &TaskFile) -> TaskResult<()> {
        self.files.insert(file.name.clone(), file.render());
        Ok(())
    }
}

/// Traversal visitor that runs one creator and writes what it emits.
#[derive(Debug)]
pub struct TaskRunner<S> {
    creator: TaskCreator,
    sink: S,
    written: usize,
}

impl<S: TaskSink> TaskRunner<S> {
    pub fn new(creator: TaskCreator, sink: S) -> Self {
        Self {
            creator,
            sink,
            written: 0,
        }
    }

    /// Number of files written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: TaskSink> NodeVisitor for TaskRunner<S> {
    fn process_node(&mut self, hierarchy: &Hierarchy, visit: &Visit<'_>) -> TaskResult<()> {
        let Some(file) = self.creator.process_node(hierarchy, visit) else {
            return Ok(());
        };
        self.sink.write(&file).map_err(|source| TaskError::Aborted {
            task: self.creator.kind().to_string(),
            path: visit.path.to_string(),
            source: Box::new(source),
        })?;
        self.written += 1;
        Ok(())
    }
}
