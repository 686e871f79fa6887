//! Divergent-edit detection.
//!
//! Runs after change detection and before any mutation; a non-empty
//! result halts the run.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use crate::models::{Conflict, ConflictKind, LocalChanges, LocalFile, RemoteChanges, RemoteDoc, Suggestion};

/// Edits closer together than this are flagged even when they fall inside
/// the previous-sync window, and get no automatic suggestion.
pub const SIMULTANEOUS_WINDOW_SECS: i64 = 300;

/// Identify documents that diverged on both sides.
#[must_use]
pub fn detect(
    local: &LocalChanges,
    remote: &RemoteChanges,
    scan: &BTreeMap<String, LocalFile>,
    docs: &[RemoteDoc],
) -> Vec<Conflict> {
    let updated: HashSet<&str> = remote.updated_docs.iter().map(String::as_str).collect();
    let mut doc_by_any_id: HashMap<&str, &RemoteDoc> = HashMap::new();
    for doc in docs {
        doc_by_any_id.insert(doc.id.as_str(), doc);
        if let Some(short_id) = doc.short_id.as_deref() {
            doc_by_any_id.insert(short_id, doc);
        }
    }

    let mut conflicts = Vec::new();
    let mut flagged: HashSet<&str> = HashSet::new();

    // Both sides changed since the last sync point, regardless of how far
    // apart the edits landed.
    for path in &local.potential_conflicts {
        let Some((file, doc)) = resolve(path, scan, &doc_by_any_id) else {
            continue;
        };
        if updated.contains(doc.id.as_str()) {
            conflicts.push(conflict(ConflictKind::BidirectionalEdit, file, doc));
            flagged.insert(path.as_str());
        }
    }

    // Close-in-time edits, even when the local side falls just inside the
    // previous-sync window.
    for path in &local.modified_files {
        if flagged.contains(path.as_str()) {
            continue;
        }
        let Some((file, doc)) = resolve(path, scan, &doc_by_any_id) else {
            continue;
        };
        if updated.contains(doc.id.as_str())
            && gap_seconds(file.mtime, doc.updated_at) < SIMULTANEOUS_WINDOW_SECS
        {
            conflicts.push(conflict(ConflictKind::SimultaneousEdit, file, doc));
        }
    }

    conflicts
}

fn resolve<'a>(
    path: &str,
    scan: &'a BTreeMap<String, LocalFile>,
    doc_by_any_id: &HashMap<&str, &'a RemoteDoc>,
) -> Option<(&'a LocalFile, &'a RemoteDoc)> {
    let file = scan.get(path)?;
    let id = file.outline_id.as_deref()?;
    let doc = doc_by_any_id.get(id)?;
    Some((file, doc))
}

fn conflict(kind: ConflictKind, file: &LocalFile, doc: &RemoteDoc) -> Conflict {
    Conflict {
        kind,
        path: file.rel_path.clone(),
        id: doc.id.clone(),
        local_mtime: file.mtime,
        remote_updated_at: doc.updated_at,
        local: file.clone(),
        remote: doc.clone(),
        suggestion: suggestion(file.mtime, doc.updated_at),
    }
}

fn gap_seconds(local_mtime: DateTime<Utc>, remote_updated_at: DateTime<Utc>) -> i64 {
    (local_mtime - remote_updated_at).num_seconds().abs()
}

/// Suggest the newer side when the edits are clearly apart, else ask for
/// manual review.
fn suggestion(local_mtime: DateTime<Utc>, remote_updated_at: DateTime<Utc>) -> Suggestion {
    let gap = local_mtime - remote_updated_at;
    if gap > Duration::seconds(SIMULTANEOUS_WINDOW_SECS) {
        Suggestion::KeepLocal
    } else if gap < -Duration::seconds(SIMULTANEOUS_WINDOW_SECS) {
        Suggestion::KeepRemote
    } else {
        Suggestion::ManualReview
    }
}
