//! Remote-to-local application of a change set.
//!
//! Everything it needs is already in the listing, so no gateway calls
//! happen here. Operations run creates, updates, deletes; each fails
//! independently and is recorded for retry.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frontmatter::{self, Document, FrontMatter};
use crate::models::{DocMapping, LocalFile, RemoteChanges, RemoteDoc};
use crate::pathmap::PathAssignment;
use crate::scanner;
use crate::text::clean_text;

/// What the pull phase did, and which documents need retry bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct PullOutcome {
    pub created: usize,
    pub updated: usize,
    pub moved: usize,
    pub deleted: usize,
    pub skipped: usize,
    /// Keep the previous mapping entry for these ids and hold the sync
    /// point back so the remote delta re-fires next run.
    pub failed_ids: Vec<String>,
}

impl PullOutcome {
    #[must_use]
    pub fn any_failed(&self) -> bool {
        !self.failed_ids.is_empty()
    }
}

/// Apply remote deltas to the local tree.
pub fn apply(
    root: &Path,
    changes: &RemoteChanges,
    docs: &[RemoteDoc],
    assignment: &PathAssignment,
    scan: &mut BTreeMap<String, LocalFile>,
) -> PullOutcome {
    let by_id: BTreeMap<&str, &RemoteDoc> = docs.iter().map(|doc| (doc.id.as_str(), doc)).collect();
    let mut outcome = PullOutcome::default();

    for id in &changes.new_docs {
        let Some(doc) = by_id.get(id.as_str()) else {
            continue;
        };
        if find_local(doc, scan).is_some() {
            debug!("Skipping pull create for {id}: already on disk");
            outcome.skipped += 1;
            continue;
        }
        match create_file(root, doc, assignment, scan) {
            Ok(rel_path) => {
                info!("Pulled new document {id} -> {rel_path}");
                outcome.created += 1;
            }
            Err(error) => {
                warn!("Could not pull new document {id}: {error}");
                outcome.failed_ids.push(id.clone());
            }
        }
    }

    for id in &changes.updated_docs {
        let Some(doc) = by_id.get(id.as_str()) else {
            continue;
        };
        match update_file(root, doc, assignment, scan) {
            Ok(UpdateApplied::InPlace) => outcome.updated += 1,
            Ok(UpdateApplied::Moved) => {
                outcome.updated += 1;
                outcome.moved += 1;
            }
            Ok(UpdateApplied::Created) => outcome.created += 1,
            Ok(UpdateApplied::SkippedStale) => {
                debug!("Skipping pull update for {id}: local copy is newer");
                outcome.skipped += 1;
            }
            Err(error) => {
                warn!("Could not pull update for {id}: {error}");
                outcome.failed_ids.push(id.clone());
            }
        }
    }

    for entry in &changes.deleted_docs {
        match delete_file(root, entry, scan) {
            Ok(true) => {
                info!("Deleted {} for removed document {}", entry.local_path, entry.id);
                outcome.deleted += 1;
            }
            Ok(false) => outcome.skipped += 1,
            Err(error) => {
                warn!("Could not delete {} for {}: {error}", entry.local_path, entry.id);
                outcome.failed_ids.push(entry.id.clone());
            }
        }
    }

    outcome
}

enum UpdateApplied {
    InPlace,
    Moved,
    Created,
    SkippedStale,
}

fn create_file(
    root: &Path,
    doc: &RemoteDoc,
    assignment: &PathAssignment,
    scan: &mut BTreeMap<String, LocalFile>,
) -> Result<String> {
    let assigned = assignment
        .rel_path(&doc.id)
        .ok_or_else(|| Error::Invariant(format!("no path assigned for {}", doc.id)))?;
    let rel_path = unique_path(root, scan, assigned);

    let path = root.join(&rel_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut front_matter = FrontMatter::default();
    front_matter.set_id(doc.front_matter_id());
    let document = Document::new(front_matter, clean_text(&doc.text));
    fs::write(&path, frontmatter::serialize(&document))?;
    set_mtime(&path, doc.updated_at)?;

    refresh_entry(root, &rel_path, scan);
    Ok(rel_path)
}

fn update_file(
    root: &Path,
    doc: &RemoteDoc,
    assignment: &PathAssignment,
    scan: &mut BTreeMap<String, LocalFile>,
) -> Result<UpdateApplied> {
    let Some(file) = find_local(doc, scan) else {
        // The tracked file is gone (deleted or stripped locally after the
        // remote edit); materialize the document fresh instead.
        let rel_path = create_file(root, doc, assignment, scan)?;
        info!("Re-created {rel_path} for updated document {}", doc.id);
        return Ok(UpdateApplied::Created);
    };

    if file.mtime > doc.updated_at {
        return Ok(UpdateApplied::SkippedStale);
    }

    let current_rel = file.rel_path.clone();
    let assigned = assignment
        .rel_path(&doc.id)
        .ok_or_else(|| Error::Invariant(format!("no path assigned for {}", doc.id)))?;

    let (rel_path, moved) = if assigned == current_rel {
        (current_rel.clone(), false)
    } else {
        let rel_path = unique_path(root, scan, assigned);
        let to_path = root.join(&rel_path);
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(root.join(&current_rel), &to_path)?;
        scan.remove(&current_rel);
        if let Some((dir, _)) = current_rel.rsplit_once('/') {
            prune_empty_dirs(root, dir);
        }
        info!("Moved {current_rel} -> {rel_path} for document {}", doc.id);
        (rel_path, true)
    };

    let path = root.join(&rel_path);
    let content = fs::read_to_string(&path)?;
    let mut document = frontmatter::parse(&content);
    document.front_matter.set_id(doc.front_matter_id());
    document.body = clean_text(&doc.text);
    fs::write(&path, frontmatter::serialize(&document))?;
    set_mtime(&path, doc.updated_at)?;

    refresh_entry(root, &rel_path, scan);
    if moved {
        Ok(UpdateApplied::Moved)
    } else {
        Ok(UpdateApplied::InPlace)
    }
}

fn delete_file(
    root: &Path,
    entry: &DocMapping,
    scan: &mut BTreeMap<String, LocalFile>,
) -> Result<bool> {
    let Some(file) = scan.get(&entry.local_path) else {
        debug!(
            "Skipping delete of {}: already gone locally",
            entry.local_path
        );
        return Ok(false);
    };
    // The path may have been reused by another document since the mapping
    // was written; only delete what the mapping actually tracked.
    if let Some(current_id) = file.outline_id.as_deref() {
        if !entry.matches_id(current_id) {
            warn!(
                "Skipping delete of {}: file now belongs to {current_id}",
                entry.local_path
            );
            return Ok(false);
        }
    }

    fs::remove_file(root.join(&entry.local_path))?;
    scan.remove(&entry.local_path);
    if let Some((dir, _)) = entry.local_path.rsplit_once('/') {
        prune_empty_dirs(root, dir);
    }
    Ok(true)
}

fn find_local<'a>(
    doc: &RemoteDoc,
    scan: &'a BTreeMap<String, LocalFile>,
) -> Option<&'a LocalFile> {
    scan.values().find(|file| {
        file.outline_id
            .as_deref()
            .is_some_and(|id| doc.matches_id(id))
    })
}

/// First free variant of `assigned`: the path itself, then `-2`, `-3`, ...
/// before the extension.
fn unique_path(root: &Path, scan: &BTreeMap<String, LocalFile>, assigned: &str) -> String {
    let taken = |candidate: &str| scan.contains_key(candidate) || root.join(candidate).exists();
    if !taken(assigned) {
        return assigned.to_string();
    }
    let (stem, extension) = assigned
        .rsplit_once('.')
        .map_or((assigned, ""), |(stem, ext)| (stem, ext));
    let mut counter = 2usize;
    loop {
        let candidate = if extension.is_empty() {
            format!("{stem}-{counter}")
        } else {
            format!("{stem}-{counter}.{extension}")
        };
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Remove now-empty directories from `dir` up to (excluding) the root.
fn prune_empty_dirs(root: &Path, dir: &str) {
    let mut current = dir.to_string();
    loop {
        let path = root.join(&current);
        let empty = fs::read_dir(&path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !empty || fs::remove_dir(&path).is_err() {
            break;
        }
        match current.rsplit_once('/') {
            Some((parent, _)) => current = parent.to_string(),
            None => break,
        }
    }
}

fn set_mtime(path: &Path, timestamp: DateTime<Utc>) -> Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(timestamp.into())?;
    Ok(())
}

fn refresh_entry(root: &Path, rel_path: &str, scan: &mut BTreeMap<String, LocalFile>) {
    match scanner::snapshot_file(root, &root.join(rel_path)) {
        Ok(file) => {
            scan.insert(rel_path.to_string(), file);
        }
        Err(error) => {
            warn!("Could not re-snapshot {rel_path}: {error}");
        }
    }
}
