//! Three-snapshot change detection.
//!
//! Local deltas diff the current scan against the previous snapshot;
//! remote deltas diff the current listing against the previous mapping.
//! The previous state is the pivot of both comparisons.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{LocalChanges, LocalFile, MovedFile, RemoteChanges, RemoteDoc};
use crate::state::SyncState;

/// Classify local files as new, modified, moved, or deleted.
///
/// First-run rule: without a previous sync point the delta is empty no
/// matter what is on disk. A lost sidecar must never ship the whole tree
/// to the remote; the scan is persisted at the end of the run instead so
/// the next run has a baseline.
#[must_use]
pub fn local_changes(prev: &SyncState, current: &BTreeMap<String, LocalFile>) -> LocalChanges {
    if prev.is_first_run() {
        return LocalChanges::default();
    }

    let prev_by_path = prev.files_by_path();
    let prev_by_id: HashMap<&str, &LocalFile> = prev
        .local_files
        .iter()
        .filter_map(|file| file.outline_id.as_deref().map(|id| (id, file)))
        .collect();

    let mut changes = LocalChanges::default();
    let mut move_sources: HashSet<&str> = HashSet::new();

    for (path, file) in current {
        match prev_by_path.get(path.as_str()) {
            None => {
                if let Some(id) = file.outline_id.as_deref() {
                    if let Some(prev_file) = prev_by_id.get(id) {
                        changes.moved_files.push(MovedFile {
                            id: id.to_string(),
                            from_path: prev_file.rel_path.clone(),
                            to_path: path.clone(),
                        });
                        move_sources.insert(prev_file.rel_path.as_str());
                        continue;
                    }
                }
                changes.new_files.push(path.clone());
            }
            Some(prev_file) => {
                // A tracked path that lost (or never had) its id is still
                // unknown to the remote; keep offering it as new until a
                // create stamps the id into its front-matter.
                if file.outline_id.is_none() {
                    changes.new_files.push(path.clone());
                    continue;
                }
                if file.mtime > prev_file.mtime {
                    changes.modified_files.push(path.clone());
                    if prev.last_sync.is_some_and(|last_sync| file.mtime > last_sync) {
                        changes.potential_conflicts.push(path.clone());
                    }
                }
            }
        }
    }

    for (path, prev_file) in &prev_by_path {
        if move_sources.contains(path) || current.contains_key(*path) {
            continue;
        }
        changes.deleted_files.push((*prev_file).clone());
    }

    changes
}

/// Classify remote documents as new, updated, or deleted.
#[must_use]
pub fn remote_changes(prev: &SyncState, docs: &[RemoteDoc]) -> RemoteChanges {
    let mapping_by_id = prev.mapping_by_id();
    let current_ids: HashSet<&str> = docs.iter().map(|doc| doc.id.as_str()).collect();

    let mut changes = RemoteChanges::default();
    for doc in docs {
        if !mapping_by_id.contains_key(doc.id.as_str()) {
            changes.new_docs.push(doc.id.clone());
        } else if prev
            .last_sync
            .is_some_and(|last_sync| doc.updated_at > last_sync)
        {
            changes.updated_docs.push(doc.id.clone());
        }
    }
    changes.new_docs.sort();
    changes.updated_docs.sort();

    for entry in &prev.document_mapping {
        if !current_ids.contains(entry.id.as_str()) {
            changes.deleted_docs.push(entry.clone());
        }
    }

    changes
}
