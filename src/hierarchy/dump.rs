//! Debug dump of a built hierarchy: one `label,values` row per leaf.

use std::path::Path;

use crate::error::{TaskError, TaskResult};
use crate::tasks::record::TaskFile;

use super::Hierarchy;

/// Render the leaf dump. Values are space-separated inside one field.
pub fn leaf_dump(hierarchy: &Hierarchy) -> TaskFile {
    let rows = hierarchy
        .leaves()
        .into_iter()
        .map(|id| {
            let node = hierarchy.node(id);
            let values: Vec<&str> = node.values.iter().map(|v| v.as_str()).collect();
            vec![node.label.to_string(), values.join(" ")]
        })
        .collect();
    TaskFile::new("hierarchy", None, rows)
}

/// Write the leaf dump to `path`, overwriting any previous dump.
pub fn write_leaf_dump(hierarchy: &Hierarchy, path: &Path) -> TaskResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| TaskError::Write {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, leaf_dump(hierarchy).render()).map_err(|source| TaskError::Write {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), "wrote hierarchy dump");
    Ok(())
}
