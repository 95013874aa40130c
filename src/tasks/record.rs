//! Task output records and their delimited-text rendering.

/// One output file: a relative name, an optional header, and its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFile {
    /// Path relative to the output root, e.g. `root/P21/neighborhood_Q6581097.csv`.
    pub name: String,
    pub header: Option<&'static [&'static str]>,
    pub rows: Vec<Vec<String>>,
}

impl TaskFile {
    pub fn new(
        name: impl Into<String>,
        header: Option<&'static [&'static str]>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            header,
            rows,
        }
    }

    /// Number of data rows (header excluded).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Comma-delimited text, `\n` line endings, RFC 4180 quoting.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(header) = self.header {
            push_row(&mut out, header.iter().copied());
        }
        for row in &self.rows {
            push_row(&mut out, row.iter().map(String::as_str));
        }
        out
    }
}

fn push_row<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// File name for a task at a hierarchy path.
///
/// The last path segment becomes `{prefix}_{segment}.csv` inside the
/// directory formed by the preceding segments: `root/P21/Q5` with prefix
/// `outlier` → `root/P21/outlier_Q5.csv`.
pub fn filename_from_path(path: &str, prefix: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, leaf)) => format!("{dir}/{prefix}_{leaf}.csv"),
        None => format!("{prefix}_{path}.csv"),
    }
}

/// Boolean cell as written by the downstream evaluation tooling.
pub fn flag(value: bool) -> String {
    String::from(if value { "True" } else { "False" })
}
