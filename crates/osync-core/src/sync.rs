//! Run orchestration: Scan, Detect, Conflict, Execute, Persist.
//!
//! Phases are total barriers. A conflict halts after Detect with nothing
//! mutated; a fatal error during Execute aborts without persisting so the
//! next run re-attempts; a clean finish rewrites the sidecar atomically.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::conflict;
use crate::convert;
use crate::detect;
use crate::error::Result;
use crate::hierarchy::Hierarchy;
use crate::models::{Conflict, DocMapping, LocalChanges, LocalFile, RemoteChanges, RemoteDoc};
use crate::pathmap;
use crate::pull::{self, PullOutcome};
use crate::push::{self, PushOutcome};
use crate::remote::RemoteGateway;
use crate::scanner;
use crate::state::{StateStore, SyncState};

/// What a run did, or why it stopped early.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub conflicts: Vec<Conflict>,
    pub push: PushOutcome,
    pub pull: PullOutcome,
    pub promoted: usize,
    pub demoted: usize,
    /// Operations a dry run would have executed.
    pub planned: Vec<String>,
    pub dry_run: bool,
}

impl SyncReport {
    #[must_use]
    pub fn halted_by_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// One-line summary for the log / CLI.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "pushed {} created / {} updated / {} moved / {} deleted; \
             pulled {} created / {} updated / {} deleted; \
             promoted {}, demoted {}, skipped {}",
            self.push.created,
            self.push.updated,
            self.push.moved,
            self.push.deleted,
            self.pull.created,
            self.pull.updated,
            self.pull.deleted,
            self.promoted,
            self.demoted,
            self.push.skipped + self.pull.skipped,
        )
    }
}

/// Reconcile the tree at `root` with the remote collection.
pub async fn run<G: RemoteGateway>(
    gateway: &G,
    root: &Path,
    collection_id: &str,
    dry_run: bool,
) -> Result<SyncReport> {
    let store = StateStore::new(root);
    let prev = store.load();

    // Phase 1: snapshot both sides.
    let mut scan = scanner::scan(root)?;
    let docs = gateway.list_documents(collection_id).await?;
    info!(
        "Scanned {} local files, {} remote documents",
        scan.len(),
        docs.len()
    );

    // Phase 2: derive structure and deltas.
    let hierarchy = Hierarchy::build(&docs)?;
    let assignment = pathmap::assign(&docs, &hierarchy);
    let local = detect::local_changes(&prev, &scan);
    let remote = detect::remote_changes(&prev, &docs);

    // Phase 3: conflicts halt before anything is touched.
    let conflicts = conflict::detect(&local, &remote, &scan, &docs);
    if !conflicts.is_empty() {
        warn!("Halting: {} conflict(s) detected", conflicts.len());
        return Ok(SyncReport {
            conflicts,
            ..SyncReport::default()
        });
    }

    if dry_run {
        return Ok(SyncReport {
            planned: plan(&local, &remote),
            dry_run: true,
            ..SyncReport::default()
        });
    }

    // Phase 4: promotions first so creates land inside new folders, push
    // before pull so fresh documents carry server ids, demotions last so
    // folders emptied by deletions collapse in the same run.
    let promoted = convert::promote_parents(root, &docs, &hierarchy, &mut scan);
    let push = push::apply(gateway, root, collection_id, &local, &mut scan, &prev, &docs).await;
    let pull = pull::apply(root, &remote, &docs, &assignment, &mut scan);
    let demoted = convert::demote_orphaned_indexes(root, &docs, &hierarchy, &mut scan);

    // Phase 5: persist what both sides look like now.
    let final_docs = gateway.list_documents(collection_id).await?;
    let final_hierarchy = Hierarchy::build(&final_docs)?;
    let final_assignment = pathmap::assign(&final_docs, &final_hierarchy);
    let final_scan = scanner::scan(root)?;

    let state = build_state(
        &prev,
        collection_id,
        final_scan,
        &final_docs,
        &final_hierarchy,
        &final_assignment,
        &push,
        &pull,
    );
    store.save(&state)?;

    let report = SyncReport {
        conflicts: Vec::new(),
        push,
        pull,
        promoted,
        demoted,
        planned: Vec::new(),
        dry_run: false,
    };
    info!("{}", report.summary());
    Ok(report)
}

/// Human-readable operation list for a dry run.
fn plan(local: &LocalChanges, remote: &RemoteChanges) -> Vec<String> {
    let mut planned = Vec::new();
    for path in &local.new_files {
        planned.push(format!("push create {path}"));
    }
    for path in &local.modified_files {
        planned.push(format!("push update {path}"));
    }
    for moved in &local.moved_files {
        planned.push(format!("push move {} -> {}", moved.from_path, moved.to_path));
    }
    for file in &local.deleted_files {
        planned.push(format!("push delete {}", file.rel_path));
    }
    for id in &remote.new_docs {
        planned.push(format!("pull create {id}"));
    }
    for id in &remote.updated_docs {
        planned.push(format!("pull update {id}"));
    }
    for entry in &remote.deleted_docs {
        planned.push(format!("pull delete {}", entry.local_path));
    }
    planned
}

/// Next sidecar content, with retry bookkeeping for failed operations:
/// a failed push keeps the previous snapshot entry for its path, a failed
/// pull keeps the previous mapping entry and holds the sync point back.
#[allow(clippy::too_many_arguments)]
fn build_state(
    prev: &SyncState,
    collection_id: &str,
    mut final_scan: BTreeMap<String, LocalFile>,
    final_docs: &[RemoteDoc],
    final_hierarchy: &Hierarchy,
    final_assignment: &pathmap::PathAssignment,
    push: &PushOutcome,
    pull: &PullOutcome,
) -> SyncState {
    let prev_by_path = prev.files_by_path();
    for path in &push.drop_paths {
        final_scan.remove(path);
    }
    for path in &push.carry_paths {
        match prev_by_path.get(path.as_str()) {
            Some(entry) => {
                final_scan.insert(path.clone(), (*entry).clone());
            }
            None => {
                final_scan.remove(path);
            }
        }
    }

    let mut document_mapping: Vec<DocMapping> = final_docs
        .iter()
        .map(|doc| {
            let local_path = final_scan
                .values()
                .find(|file| {
                    file.outline_id
                        .as_deref()
                        .is_some_and(|id| doc.matches_id(id))
                })
                .map(|file| file.rel_path.clone())
                .or_else(|| final_assignment.rel_path(&doc.id).map(str::to_string))
                .unwrap_or_default();
            DocMapping {
                id: doc.id.clone(),
                short_id: doc.short_id.clone(),
                title: doc.title.clone(),
                parent_id: doc.parent_id.clone(),
                updated_at: doc.updated_at,
                local_path,
                is_folder: final_hierarchy.is_parent(&doc.id),
            }
        })
        .collect();
    document_mapping.sort_by(|a, b| a.id.cmp(&b.id));

    let prev_mapping = prev.mapping_by_id();
    for id in &pull.failed_ids {
        match prev_mapping.get(id.as_str()) {
            Some(prev_entry) => {
                match document_mapping.iter_mut().find(|entry| &entry.id == id) {
                    Some(entry) => *entry = (*prev_entry).clone(),
                    None => document_mapping.push((*prev_entry).clone()),
                }
            }
            // A failed first pull of a new document: forget it entirely so
            // it classifies as new again next run.
            None => document_mapping.retain(|entry| &entry.id != id),
        }
    }

    // The sync point is stamped at persist time so a push's own
    // updated_at echo does not read as a remote edit next run. Pull
    // failures pin it back so their deltas re-fire.
    let last_sync = if pull.any_failed() {
        prev.last_sync
    } else {
        Some(Utc::now())
    };

    SyncState {
        last_sync,
        collection_id: Some(collection_id.to_string()),
        document_mapping,
        local_files: final_scan.into_values().collect(),
        extra: prev.extra.clone(),
    }
}
