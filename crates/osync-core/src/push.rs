//! Local-to-remote application of a change set.
//!
//! Operations run in a fixed order (creates, updates, moves, deletes) and
//! fail independently: a failed call is logged, recorded for retry, and
//! the run continues.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::frontmatter;
use crate::models::{LocalChanges, LocalFile, MovedFile, RemoteDoc};
use crate::pathmap::{title_from_path, INDEX_FILE};
use crate::remote::{DocUpdate, RemoteGateway};
use crate::scanner;
use crate::state::SyncState;
use crate::util::body_hash;

/// Clock-skew allowance for the update staleness guard.
pub const STALENESS_TOLERANCE_SECS: i64 = 5;

/// What the push phase did, and which paths need retry bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    pub created: usize,
    pub updated: usize,
    pub moved: usize,
    pub deleted: usize,
    pub skipped: usize,
    /// Persist the previous snapshot entry for these paths so the delta
    /// re-fires next run.
    pub carry_paths: Vec<String>,
    /// Remove these paths from the persisted snapshot so they classify as
    /// new again next run.
    pub drop_paths: Vec<String>,
}

impl PushOutcome {
    #[must_use]
    pub fn any_failed(&self) -> bool {
        !self.carry_paths.is_empty() || !self.drop_paths.is_empty()
    }
}

/// Apply local deltas through the gateway.
pub async fn apply<G: RemoteGateway>(
    gateway: &G,
    root: &Path,
    collection_id: &str,
    changes: &LocalChanges,
    scan: &mut BTreeMap<String, LocalFile>,
    prev: &SyncState,
    docs: &[RemoteDoc],
) -> PushOutcome {
    let mut outcome = PushOutcome::default();

    for path in creation_order(&changes.new_files) {
        if let Some(existing) = scan.get(path).and_then(|file| file.outline_id.clone()) {
            if docs.iter().any(|doc| doc.matches_id(&existing)) {
                debug!("Skipping create for {path}: already tracked remotely");
                outcome.skipped += 1;
                continue;
            }
        }
        match push_create(gateway, root, collection_id, path, scan, prev, docs).await {
            Ok(()) => outcome.created += 1,
            Err(error) => {
                warn!("Could not create remote document for {path}: {error}");
                outcome.drop_paths.push(path.clone());
            }
        }
    }

    for path in &changes.modified_files {
        match push_update(gateway, root, path, scan, prev, docs).await {
            Ok(true) => outcome.updated += 1,
            Ok(false) => outcome.skipped += 1,
            Err(error) => {
                warn!("Could not update remote document for {path}: {error}");
                outcome.carry_paths.push(path.clone());
            }
        }
    }

    for moved in &changes.moved_files {
        match push_move(gateway, moved, scan, prev, docs).await {
            Ok(()) => outcome.moved += 1,
            Err(error) => {
                warn!(
                    "Could not move remote document for {}: {error}",
                    moved.to_path
                );
                outcome.carry_paths.push(moved.from_path.clone());
                outcome.drop_paths.push(moved.to_path.clone());
            }
        }
    }

    for file in &changes.deleted_files {
        match push_delete(gateway, file, prev, docs).await {
            Ok(true) => outcome.deleted += 1,
            Ok(false) => outcome.skipped += 1,
            Err(error) => {
                warn!(
                    "Could not delete remote document for {}: {error}",
                    file.rel_path
                );
                outcome.carry_paths.push(file.rel_path.clone());
            }
        }
    }

    outcome
}

async fn push_create<G: RemoteGateway>(
    gateway: &G,
    root: &Path,
    collection_id: &str,
    rel_path: &str,
    scan: &mut BTreeMap<String, LocalFile>,
    prev: &SyncState,
    docs: &[RemoteDoc],
) -> Result<()> {
    let body = read_body(root, rel_path)?;
    let title = title_from_path(rel_path);
    let parent_id = resolve_parent_id(rel_path, scan, prev, docs);

    let created = gateway
        .create_document(collection_id, &title, &body, parent_id.as_deref())
        .await?;

    let path = root.join(rel_path);
    frontmatter::rewrite_id_in_file(&path, created.front_matter_id())?;
    refresh_entry(root, rel_path, scan);
    info!("Created remote document {} for {rel_path}", created.id);
    Ok(())
}

async fn push_update<G: RemoteGateway>(
    gateway: &G,
    root: &Path,
    rel_path: &str,
    scan: &BTreeMap<String, LocalFile>,
    prev: &SyncState,
    docs: &[RemoteDoc],
) -> Result<bool> {
    let Some(file) = scan.get(rel_path) else {
        return Ok(false);
    };
    let Some(local_id) = file.outline_id.as_deref() else {
        debug!("Skipping update for {rel_path}: no front-matter id");
        return Ok(false);
    };
    let id = canonical_id(local_id, prev, docs);
    let Some(doc) = docs.iter().find(|doc| doc.id == id) else {
        debug!("Skipping update for {rel_path}: no longer listed remotely");
        return Ok(false);
    };

    let body = read_body(root, rel_path)?;
    let remote_is_newer =
        doc.updated_at > file.mtime + Duration::seconds(STALENESS_TOLERANCE_SECS);
    if remote_is_newer && body_hash(&doc.text) == body_hash(&body) {
        debug!("Skipping update for {rel_path}: remote is newer with identical content");
        return Ok(false);
    }

    let title = title_from_path(rel_path);
    gateway
        .update_document(
            &id,
            DocUpdate {
                title: Some(&title),
                text: Some(&body),
                parent_id: None,
            },
        )
        .await?;
    info!("Updated remote document {id} from {rel_path}");
    Ok(true)
}

async fn push_move<G: RemoteGateway>(
    gateway: &G,
    moved: &MovedFile,
    scan: &BTreeMap<String, LocalFile>,
    prev: &SyncState,
    docs: &[RemoteDoc],
) -> Result<()> {
    let id = canonical_id(&moved.id, prev, docs);
    let title = title_from_path(&moved.to_path);
    let parent_id = resolve_parent_id(&moved.to_path, scan, prev, docs);

    gateway
        .update_document(
            &id,
            DocUpdate {
                title: Some(&title),
                text: None,
                parent_id: Some(parent_id.as_deref()),
            },
        )
        .await?;
    info!(
        "Moved remote document {id}: {} -> {}",
        moved.from_path, moved.to_path
    );
    Ok(())
}

async fn push_delete<G: RemoteGateway>(
    gateway: &G,
    file: &LocalFile,
    prev: &SyncState,
    docs: &[RemoteDoc],
) -> Result<bool> {
    let Some(local_id) = file.outline_id.as_deref() else {
        return Ok(false);
    };
    let id = canonical_id(local_id, prev, docs);
    if !docs.iter().any(|doc| doc.id == id) {
        debug!(
            "Skipping delete for {}: already gone remotely",
            file.rel_path
        );
        return Ok(false);
    }

    gateway.delete_document(&id).await?;
    info!("Deleted remote document {id} for {}", file.rel_path);
    Ok(true)
}

/// Canonical full id for a front-matter identifier that may be a short id.
fn canonical_id(candidate: &str, prev: &SyncState, docs: &[RemoteDoc]) -> String {
    if let Some(doc) = docs.iter().find(|doc| doc.matches_id(candidate)) {
        return doc.id.clone();
    }
    if let Some(entry) = prev.mapping_for(candidate) {
        return entry.id.clone();
    }
    candidate.to_string()
}

/// Parent id for a path: the containing directory's index file carries it,
/// the previous mapping is the fallback, the collection root the default.
fn resolve_parent_id(
    rel_path: &str,
    scan: &BTreeMap<String, LocalFile>,
    prev: &SyncState,
    docs: &[RemoteDoc],
) -> Option<String> {
    let index_rel = containing_index(rel_path)?;
    if let Some(id) = scan.get(&index_rel).and_then(|file| file.outline_id.as_deref()) {
        return Some(canonical_id(id, prev, docs));
    }
    prev.mapping_at_path(&index_rel).map(|entry| entry.id.clone())
}

/// Index file of the directory containing `rel_path`; for an index file
/// that is the directory one level up.
fn containing_index(rel_path: &str) -> Option<String> {
    let (dir, name) = rel_path.rsplit_once('/')?;
    let dir = if name == INDEX_FILE {
        dir.rsplit_once('/')?.0
    } else {
        dir
    };
    Some(format!("{dir}/{INDEX_FILE}"))
}

/// Index files first within a directory, shallow directories before deep
/// ones, so parent ids resolve by the time children are created.
fn creation_order(paths: &[String]) -> Vec<&String> {
    let mut ordered: Vec<&String> = paths.iter().collect();
    ordered.sort_by_key(|path| {
        let (dir, name) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
        (
            path.matches('/').count(),
            dir.to_string(),
            name != INDEX_FILE,
            name.to_string(),
        )
    });
    ordered
}

fn read_body(root: &Path, rel_path: &str) -> Result<String> {
    let content = fs::read_to_string(root.join(rel_path))?;
    Ok(frontmatter::parse(&content).body)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::Collection;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    fn ts(value: &str) -> DateTime<Utc> {
        value.parse().unwrap()
    }

    fn doc(id: &str, title: &str, parent_id: Option<&str>, updated_at: &str) -> RemoteDoc {
        RemoteDoc {
            id: id.to_string(),
            short_id: None,
            title: title.to_string(),
            text: String::new(),
            parent_id: parent_id.map(str::to_string),
            created_at: ts(updated_at),
            updated_at: ts(updated_at),
        }
    }

    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<String>>,
        fail_all: bool,
    }

    impl RecordingGateway {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<()> {
            if self.fail_all {
                return Err(Error::Transport("injected failure".to_string()));
            }
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    impl RemoteGateway for RecordingGateway {
        async fn list_collections(&self) -> Result<Vec<Collection>> {
            Ok(Vec::new())
        }

        async fn list_documents(&self, _collection_id: &str) -> Result<Vec<RemoteDoc>> {
            Ok(Vec::new())
        }

        async fn create_document(
            &self,
            _collection_id: &str,
            title: &str,
            text: &str,
            parent_id: Option<&str>,
        ) -> Result<RemoteDoc> {
            self.record(format!("create {title} parent={parent_id:?}"))?;
            Ok(RemoteDoc {
                id: format!("new-{title}"),
                short_id: None,
                title: title.to_string(),
                text: text.to_string(),
                parent_id: parent_id.map(str::to_string),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
        }

        async fn update_document(&self, id: &str, update: DocUpdate<'_>) -> Result<RemoteDoc> {
            self.record(format!(
                "update {id} title={:?} text={} parent={:?}",
                update.title,
                update.text.is_some(),
                update.parent_id,
            ))?;
            Ok(doc(id, update.title.unwrap_or(""), None, "2024-05-01T12:00:00Z"))
        }

        async fn delete_document(&self, id: &str) -> Result<()> {
            self.record(format!("delete {id}"))
        }
    }

    fn write_note(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn creates_resolve_parent_from_index_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        write_note(
            dir.path(),
            "Topic/README.md",
            "---\nid_outline: t1\n---\n\nindex\n",
        );
        write_note(dir.path(), "Topic/New.md", "new body\n");
        let mut scan = scanner::scan(dir.path()).unwrap();

        let docs = vec![doc("t1", "Topic", None, "2024-05-01T10:00:00Z")];
        let changes = LocalChanges {
            new_files: vec!["Topic/New.md".to_string()],
            ..LocalChanges::default()
        };

        let gateway = RecordingGateway::default();
        let outcome = apply(
            &gateway,
            dir.path(),
            "col",
            &changes,
            &mut scan,
            &SyncState::default(),
            &docs,
        )
        .await;

        assert_eq!(outcome.created, 1);
        assert_eq!(gateway.calls(), ["create New parent=Some(\"t1\")"]);

        let rewritten = fs::read_to_string(dir.path().join("Topic/New.md")).unwrap();
        assert!(rewritten.starts_with("---\nid_outline: new-New\n---\n"));
        assert_eq!(
            scan["Topic/New.md"].outline_id.as_deref(),
            Some("new-New")
        );
    }

    #[tokio::test]
    async fn creates_index_before_siblings_so_children_nest() {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "New/README.md", "index body\n");
        write_note(dir.path(), "New/Apple.md", "apple body\n");
        let mut scan = scanner::scan(dir.path()).unwrap();

        let changes = LocalChanges {
            new_files: vec!["New/Apple.md".to_string(), "New/README.md".to_string()],
            ..LocalChanges::default()
        };

        let gateway = RecordingGateway::default();
        let outcome = apply(
            &gateway,
            dir.path(),
            "col",
            &changes,
            &mut scan,
            &SyncState::default(),
            &[],
        )
        .await;

        assert_eq!(outcome.created, 2);
        assert_eq!(
            gateway.calls(),
            [
                "create New parent=None",
                "create Apple parent=Some(\"new-New\")"
            ]
        );
    }

    #[tokio::test]
    async fn update_skipped_when_remote_newer_and_content_identical() {
        let dir = tempfile::tempdir().unwrap();
        write_note(
            dir.path(),
            "Note.md",
            "---\nid_outline: n1\n---\n\nsame body\n",
        );
        let mut scan = scanner::scan(dir.path()).unwrap();
        scan.get_mut("Note.md").unwrap().mtime = ts("2024-05-01T10:00:00Z");

        let mut remote = doc("n1", "Note", None, "2024-05-01T11:00:00Z");
        remote.text = "same body".to_string();

        let changes = LocalChanges {
            modified_files: vec!["Note.md".to_string()],
            ..LocalChanges::default()
        };

        let gateway = RecordingGateway::default();
        let outcome = apply(
            &gateway,
            dir.path(),
            "col",
            &changes,
            &mut scan,
            &SyncState::default(),
            &[remote],
        )
        .await;

        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.skipped, 1);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn update_sent_when_content_differs() {
        let dir = tempfile::tempdir().unwrap();
        write_note(
            dir.path(),
            "Note.md",
            "---\nid_outline: n1\n---\n\nlocal body\n",
        );
        let mut scan = scanner::scan(dir.path()).unwrap();
        scan.get_mut("Note.md").unwrap().mtime = ts("2024-05-01T12:00:00Z");

        let mut remote = doc("n1", "Note", None, "2024-05-01T10:00:00Z");
        remote.text = "older remote body".to_string();

        let changes = LocalChanges {
            modified_files: vec!["Note.md".to_string()],
            ..LocalChanges::default()
        };

        let gateway = RecordingGateway::default();
        let outcome = apply(
            &gateway,
            dir.path(),
            "col",
            &changes,
            &mut scan,
            &SyncState::default(),
            &[remote],
        )
        .await;

        assert_eq!(outcome.updated, 1);
        assert_eq!(
            gateway.calls(),
            ["update n1 title=Some(\"Note\") text=true parent=None"]
        );
    }

    #[tokio::test]
    async fn move_updates_title_and_parent_only() {
        let dir = tempfile::tempdir().unwrap();
        write_note(
            dir.path(),
            "B/README.md",
            "---\nid_outline: b1\n---\n\nindex\n",
        );
        write_note(dir.path(), "B/X.md", "---\nid_outline: x1\n---\n\nbody\n");
        let mut scan = scanner::scan(dir.path()).unwrap();

        let docs = vec![
            doc("b1", "B", None, "2024-05-01T10:00:00Z"),
            doc("x1", "X", None, "2024-05-01T10:00:00Z"),
        ];
        let changes = LocalChanges {
            moved_files: vec![MovedFile {
                id: "x1".to_string(),
                from_path: "A/X.md".to_string(),
                to_path: "B/X.md".to_string(),
            }],
            ..LocalChanges::default()
        };

        let gateway = RecordingGateway::default();
        let outcome = apply(
            &gateway,
            dir.path(),
            "col",
            &changes,
            &mut scan,
            &SyncState::default(),
            &docs,
        )
        .await;

        assert_eq!(outcome.moved, 1);
        assert_eq!(
            gateway.calls(),
            ["update x1 title=Some(\"X\") text=false parent=Some(Some(\"b1\"))"]
        );
    }

    #[tokio::test]
    async fn delete_translates_short_id_and_skips_missing_docs() {
        let dir = tempfile::tempdir().unwrap();
        let mut scan = BTreeMap::new();

        let mut listed = doc("doc-1", "Hello", None, "2024-05-01T10:00:00Z");
        listed.short_id = Some("Ab3dE9".to_string());

        let deleted_known = LocalFile {
            rel_path: "Hello.md".to_string(),
            mtime: ts("2024-05-01T10:00:00Z"),
            size: 1,
            content_hash: "h".to_string(),
            outline_id: Some("Ab3dE9".to_string()),
            has_front_matter: true,
            is_index: false,
        };
        let deleted_unknown = LocalFile {
            outline_id: Some("vanished".to_string()),
            rel_path: "Gone.md".to_string(),
            ..deleted_known.clone()
        };

        let changes = LocalChanges {
            deleted_files: vec![deleted_known, deleted_unknown],
            ..LocalChanges::default()
        };

        let gateway = RecordingGateway::default();
        let outcome = apply(
            &gateway,
            dir.path(),
            "col",
            &changes,
            &mut scan,
            &SyncState::default(),
            &[listed],
        )
        .await;

        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(gateway.calls(), ["delete doc-1"]);
    }

    #[tokio::test]
    async fn failures_are_recorded_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        write_note(dir.path(), "New.md", "body\n");
        write_note(
            dir.path(),
            "Edited.md",
            "---\nid_outline: e1\n---\n\nbody\n",
        );
        let mut scan = scanner::scan(dir.path()).unwrap();

        let docs = vec![doc("e1", "Edited", None, "2024-05-01T10:00:00Z")];
        let changes = LocalChanges {
            new_files: vec!["New.md".to_string()],
            modified_files: vec!["Edited.md".to_string()],
            ..LocalChanges::default()
        };

        let gateway = RecordingGateway {
            fail_all: true,
            ..RecordingGateway::default()
        };
        let outcome = apply(
            &gateway,
            dir.path(),
            "col",
            &changes,
            &mut scan,
            &SyncState::default(),
            &docs,
        )
        .await;

        assert!(outcome.any_failed());
        assert_eq!(outcome.drop_paths, ["New.md"]);
        assert_eq!(outcome.carry_paths, ["Edited.md"]);
    }
}
