//! Deterministic mapping from remote documents to local relative paths.
//!
//! A non-parent document becomes `<dir>/<name>.md`; a parent document
//! becomes a folder carrying the fixed index filename. Siblings are
//! assigned in id order so collision suffixes never reshuffle between runs.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::hierarchy::Hierarchy;
use crate::models::RemoteDoc;

/// On-disk representative of a parent document.
pub const INDEX_FILE: &str = "README.md";

/// Immutable path assignment for every listed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathAssignment {
    paths: BTreeMap<String, String>,
    folders: BTreeSet<String>,
}

impl PathAssignment {
    /// Relative path for a document; the index-file path for parents.
    #[must_use]
    pub fn rel_path(&self, id: &str) -> Option<&str> {
        self.paths.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn is_folder(&self, id: &str) -> bool {
        self.folders.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.paths
            .iter()
            .map(|(id, path)| (id.as_str(), path.as_str()))
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `-`, collapse
/// runs, trim the ends. Case-preserving; an empty result is `untitled`.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let mut name = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            name.push(ch);
        } else if !name.ends_with('-') {
            name.push('-');
        }
    }
    let trimmed = name.trim_matches('-');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Title a file pushes to the remote: index files take the containing
/// directory name, other files their basename without the extension.
#[must_use]
pub fn title_from_path(rel_path: &str) -> String {
    let (dir, name) = match rel_path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, rel_path),
    };
    if name == INDEX_FILE {
        if let Some(dir) = dir {
            let folder = dir.rsplit_once('/').map_or(dir, |(_, last)| last);
            return folder.to_string();
        }
    }
    name.strip_suffix(".md").unwrap_or(name).to_string()
}

/// Assign a path to every document of the hierarchy.
///
/// Pure in its inputs: shuffling the listing does not change the result,
/// and re-running on the same hierarchy reproduces it exactly.
#[must_use]
pub fn assign(docs: &[RemoteDoc], hierarchy: &Hierarchy) -> PathAssignment {
    let by_id: HashMap<&str, &RemoteDoc> = docs.iter().map(|doc| (doc.id.as_str(), doc)).collect();
    let mut assignment = PathAssignment::default();
    assign_level(hierarchy.roots(), "", &by_id, hierarchy, &mut assignment);
    assignment
}

fn assign_level(
    level: &[String],
    prefix: &str,
    by_id: &HashMap<&str, &RemoteDoc>,
    hierarchy: &Hierarchy,
    assignment: &mut PathAssignment,
) {
    // Level slices come from the hierarchy pre-sorted by id ascending.
    let mut used: HashSet<String> = HashSet::new();
    for id in level {
        let Some(doc) = by_id.get(id.as_str()) else {
            continue;
        };
        let name = dedupe_name(&mut used, sanitize_title(&doc.title));
        if hierarchy.is_parent(id) {
            let dir = format!("{prefix}{name}");
            assignment
                .paths
                .insert(id.clone(), format!("{dir}/{INDEX_FILE}"));
            assignment.folders.insert(id.clone());
            assign_level(
                hierarchy.children(id),
                &format!("{dir}/"),
                by_id,
                hierarchy,
                assignment,
            );
        } else {
            assignment.paths.insert(id.clone(), format!("{prefix}{name}.md"));
        }
    }
}

/// Later-seen colliding siblings get `-2`, `-3`, ... before the extension.
fn dedupe_name(used: &mut HashSet<String>, base: String) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut counter = 2usize;
    loop {
        let candidate = format!("{base}-{counter}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}
