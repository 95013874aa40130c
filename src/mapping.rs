//! Property mappings: the relation index every hierarchy is built from.
//!
//! A [`PropertyMapping`] maps each outgoing [`Relation`] `(predicate, object)`
//! to the set of subject entities carrying that exact edge. The union of all
//! groups is the universe of entities to classify.
//!
//! Mappings are produced externally (by the triple fetcher) and loaded here
//! either from the fetcher's triple cache (`subject,predicate,object` rows) or
//! from a JSON snapshot written by [`save_json`].

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, MappingResult};

/// Opaque identifier of a graph node: an entity, predicate, or object value.
///
/// Compared by identifier equality. Ordering is lexicographic, which makes
/// every set and map keyed by terms iterate deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Term(String);

impl Term {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment of the identifier (`http://…/entity/Q5` → `Q5`).
    pub fn short_id(&self) -> &str {
        extract_id(&self.0)
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Term {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Term {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::borrow::Borrow<str> for Term {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Strip a URI down to its final path segment.
pub fn extract_id(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

/// A `(predicate, object)` pair. Its group is the set of subjects with that edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relation {
    pub predicate: Term,
    pub object: Term,
}

impl Relation {
    pub fn new(predicate: impl Into<Term>, object: impl Into<Term>) -> Self {
        Self {
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.predicate, self.object)
    }
}

/// Ordered set of entities.
pub type EntitySet = BTreeSet<Term>;

/// Index of relation → subject-entity set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMapping {
    groups: BTreeMap<Relation, EntitySet>,
}

impl PropertyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from `(subject, predicate, object)` triples.
    pub fn from_triples<I, S, P, O>(triples: I) -> Self
    where
        I: IntoIterator<Item = (S, P, O)>,
        S: Into<Term>,
        P: Into<Term>,
        O: Into<Term>,
    {
        let mut mapping = Self::new();
        for (subject, predicate, object) in triples {
            mapping.insert(Relation::new(predicate, object), subject.into());
        }
        mapping
    }

    /// Record that `subject` carries `relation`.
    pub fn insert(&mut self, relation: Relation, subject: Term) {
        self.groups.entry(relation).or_default().insert(subject);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, relation: &Relation) -> Option<&EntitySet> {
        self.groups.get(relation)
    }

    pub fn contains(&self, relation: &Relation) -> bool {
        self.groups.contains_key(relation)
    }

    pub fn remove(&mut self, relation: &Relation) -> Option<EntitySet> {
        self.groups.remove(relation)
    }

    /// Keep only the groups for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Relation, &EntitySet) -> bool) {
        self.groups.retain(|relation, group| keep(relation, group));
    }

    /// Iterate `(relation, group)` in `(predicate, object)` order.
    pub fn iter(&self) -> impl Iterator<Item = (&Relation, &EntitySet)> {
        self.groups.iter()
    }

    /// Distinct predicates, ascending.
    pub fn predicates(&self) -> BTreeSet<&Term> {
        self.groups.keys().map(|r| &r.predicate).collect()
    }

    /// All `(object, group)` pairs of one predicate, in object order.
    pub fn groups_of<'a>(
        &'a self,
        predicate: &'a Term,
    ) -> impl Iterator<Item = (&'a Term, &'a EntitySet)> + 'a {
        let start = Relation {
            predicate: predicate.clone(),
            object: Term::default(),
        };
        self.groups
            .range(start..)
            .take_while(move |(relation, _)| &relation.predicate == predicate)
            .map(|(relation, group)| (&relation.object, group))
    }

    /// Union of all groups.
    pub fn universe(&self) -> EntitySet {
        self.groups.values().flatten().cloned().collect()
    }

    /// Intersect every group with `values`, dropping groups that become empty.
    pub fn restrict(&self, values: &EntitySet) -> Self {
        let groups = self
            .groups
            .iter()
            .filter_map(|(relation, group)| {
                let local: EntitySet = group.intersection(values).cloned().collect();
                (!local.is_empty()).then(|| (relation.clone(), local))
            })
            .collect();
        Self { groups }
    }

    /// Content fingerprint of the relation set and its groups.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.groups.hash(&mut hasher);
        hasher.finish()
    }
}

impl FromIterator<(Relation, EntitySet)> for PropertyMapping {
    fn from_iter<T: IntoIterator<Item = (Relation, EntitySet)>>(iter: T) -> Self {
        let mut mapping = Self::new();
        for (relation, group) in iter {
            mapping.groups.entry(relation).or_default().extend(group);
        }
        mapping
    }
}

// ---------------------------------------------------------------------------
// Triple cache
// ---------------------------------------------------------------------------

/// Load a mapping from the fetcher's triple cache.
///
/// The first row is a header and is skipped. URIs are reduced to their last
/// path segment.
pub fn load_triples_csv(path: &Path) -> MappingResult<PropertyMapping> {
    let content = std::fs::read_to_string(path).map_err(|source| MappingError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mapping = parse_triples_csv(&content)?;
    tracing::info!(
        path = %path.display(),
        relations = mapping.len(),
        "loaded triple cache"
    );
    Ok(mapping)
}

/// Parse `subject,predicate,object` rows (header row first).
pub fn parse_triples_csv(content: &str) -> MappingResult<PropertyMapping> {
    let mut mapping = PropertyMapping::new();
    for (index, line) in content.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_fields(line).map_err(|message| MappingError::MalformedRow {
            line: index + 1,
            message,
        })?;
        let [subject, predicate, object] = fields.as_slice() else {
            return Err(MappingError::MalformedRow {
                line: index + 1,
                message: format!("expected 3 columns, found {}", fields.len()),
            });
        };
        mapping.insert(
            Relation::new(extract_id(predicate.trim()), extract_id(object.trim())),
            Term::new(extract_id(subject.trim())),
        );
    }
    if mapping.is_empty() {
        return Err(MappingError::Empty);
    }
    Ok(mapping)
}

/// Split one comma-delimited line, honouring double-quoted fields.
fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".into());
    }
    fields.push(field);
    Ok(fields)
}

// ---------------------------------------------------------------------------
// JSON snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct GroupRecord {
    predicate: Term,
    object: Term,
    subjects: Vec<Term>,
}

/// Load a mapping snapshot written by [`save_json`].
pub fn load_json(path: &Path) -> MappingResult<PropertyMapping> {
    let content = std::fs::read_to_string(path).map_err(|source| MappingError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let records: Vec<GroupRecord> =
        serde_json::from_str(&content).map_err(|e| MappingError::Snapshot {
            message: e.to_string(),
        })?;
    let mapping: PropertyMapping = records
        .into_iter()
        .map(|r| (Relation::new(r.predicate, r.object), r.subjects.into_iter().collect()))
        .collect();
    if mapping.is_empty() {
        return Err(MappingError::Empty);
    }
    Ok(mapping)
}

/// Write a mapping snapshot as pretty JSON, overwriting `path`.
pub fn save_json(mapping: &PropertyMapping, path: &Path) -> MappingResult<()> {
    let records: Vec<GroupRecord> = mapping
        .iter()
        .map(|(relation, group)| GroupRecord {
            predicate: relation.predicate.clone(),
            object: relation.object.clone(),
            subjects: group.iter().cloned().collect(),
        })
        .collect();
    let json = serde_json::to_string_pretty(&records).map_err(|e| MappingError::Snapshot {
        message: e.to_string(),
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| MappingError::Write {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(path, json).map_err(|source| MappingError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Load a mapping, choosing the format from the file extension (`.json` or triples).
pub fn load_mapping(path: &Path) -> MappingResult<PropertyMapping> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json(path),
        _ => load_triples_csv(path),
    }
}

// ---------------------------------------------------------------------------
// Seed allow-list
// ---------------------------------------------------------------------------

/// Load a seed entity allow-list: one id per line, `#` comments and blanks skipped.
pub fn load_seed_entities(path: &Path) -> MappingResult<EntitySet> {
    let content = std::fs::read_to_string(path).map_err(|source| MappingError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Term::new(extract_id(line)))
        .collect())
}
