//! Structural conversion between standalone files and folders.
//!
//! The remote model lets a document carry body text and children at once;
//! on disk a name is either a file or a directory. A document that gains
//! children is promoted to a folder with an index file; an index file
//! whose document lost its children (or vanished) is demoted back to a
//! standalone file.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frontmatter;
use crate::hierarchy::Hierarchy;
use crate::models::{LocalFile, RemoteDoc};
use crate::pathmap::{sanitize_title, INDEX_FILE};
use crate::scanner;

/// Convert every parent document still represented by a standalone file.
///
/// Runs before push/pull creation so freshly created children land inside
/// the new folder. Returns the number of conversions performed; failures
/// are logged and skipped.
pub fn promote_parents(
    root: &Path,
    docs: &[RemoteDoc],
    hierarchy: &Hierarchy,
    scan: &mut BTreeMap<String, LocalFile>,
) -> usize {
    let mut sorted: Vec<&RemoteDoc> = docs.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut promoted = 0;
    for doc in sorted {
        if !hierarchy.is_parent(&doc.id) {
            continue;
        }
        let Some(file) = scan.values().find(|file| {
            file.outline_id
                .as_deref()
                .is_some_and(|id| doc.matches_id(id))
        }) else {
            continue;
        };
        if file.is_index {
            continue;
        }
        let from_rel = file.rel_path.clone();
        match promote_one(root, doc, &from_rel) {
            Ok(to_rel) => {
                scan.remove(&from_rel);
                refresh_entry(root, &to_rel, scan);
                info!("Promoted {from_rel} -> {to_rel}");
                promoted += 1;
            }
            Err(error) => {
                warn!("Could not promote {from_rel}: {error}");
            }
        }
    }
    promoted
}

fn promote_one(root: &Path, doc: &RemoteDoc, from_rel: &str) -> Result<String> {
    let parent_prefix = from_rel
        .rsplit_once('/')
        .map_or(String::new(), |(dir, _)| format!("{dir}/"));
    let dir_rel = format!("{parent_prefix}{}", sanitize_title(&doc.title));
    let to_rel = format!("{dir_rel}/{INDEX_FILE}");

    let to_path = root.join(&to_rel);
    if to_path.exists() {
        return Err(Error::Io(io::Error::other(format!(
            "{to_rel} already exists"
        ))));
    }
    fs::create_dir_all(root.join(&dir_rel))?;
    fs::rename(root.join(from_rel), &to_path)?;
    frontmatter::rewrite_id_in_file(&to_path, doc.front_matter_id())?;
    Ok(to_rel)
}

/// Convert index files whose document is gone or no longer a parent.
///
/// Runs after pull deletions so a folder emptied this run collapses in the
/// same run. Never destructive: a folder holding anything besides its
/// index file is left alone.
pub fn demote_orphaned_indexes(
    root: &Path,
    docs: &[RemoteDoc],
    hierarchy: &Hierarchy,
    scan: &mut BTreeMap<String, LocalFile>,
) -> usize {
    let index_paths: Vec<String> = scan
        .values()
        .filter(|file| file.is_index)
        .map(|file| file.rel_path.clone())
        .collect();

    let mut demoted = 0;
    for index_rel in index_paths {
        let Some(local_id) = scan
            .get(&index_rel)
            .and_then(|file| file.outline_id.clone())
        else {
            continue;
        };
        let still_parent = docs
            .iter()
            .find(|doc| doc.matches_id(&local_id))
            .is_some_and(|doc| hierarchy.is_parent(&doc.id));
        if still_parent {
            continue;
        }

        let Some((dir_rel, _)) = index_rel.rsplit_once('/') else {
            debug!("Not demoting {index_rel}: index sits at the sync root");
            continue;
        };
        match only_contains_index(&root.join(dir_rel)) {
            Ok(true) => {}
            Ok(false) => {
                warn!("Skipping demotion of {dir_rel}: directory has other entries");
                continue;
            }
            Err(error) => {
                warn!("Skipping demotion of {dir_rel}: {error}");
                continue;
            }
        }

        match demote_one(root, &index_rel, dir_rel) {
            Ok(to_rel) => {
                scan.remove(&index_rel);
                refresh_entry(root, &to_rel, scan);
                info!("Demoted {index_rel} -> {to_rel}");
                demoted += 1;
            }
            Err(error) => {
                warn!("Could not demote {index_rel}: {error}");
            }
        }
    }
    demoted
}

fn demote_one(root: &Path, index_rel: &str, dir_rel: &str) -> Result<String> {
    let folder_name = dir_rel.rsplit_once('/').map_or(dir_rel, |(_, name)| name);
    let parent_prefix = dir_rel
        .rsplit_once('/')
        .map_or(String::new(), |(dir, _)| format!("{dir}/"));
    let to_rel = format!("{parent_prefix}{folder_name}.md");

    let to_path = root.join(&to_rel);
    if to_path.exists() {
        return Err(Error::Io(io::Error::other(format!(
            "{to_rel} already exists"
        ))));
    }
    fs::rename(root.join(index_rel), &to_path)?;
    fs::remove_dir(root.join(dir_rel))?;
    Ok(to_rel)
}

fn only_contains_index(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name() != OsStr::new(INDEX_FILE) {
            return Ok(false);
        }
    }
    Ok(true)
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
    use chrono::Utc;

    fn doc(id: &str, title: &str, parent_id: Option<&str>) -> RemoteDoc {
        RemoteDoc {
            id: id.to_string(),
            short_id: None,
            title: title.to_string(),
            text: String::new(),
            parent_id: parent_id.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn promotes_file_to_folder_with_index() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("Topic.md"),
            "---\nid_outline: t1\n---\n\ntopic body\n",
        )
        .unwrap();

        let docs = vec![doc("t1", "Topic", None), doc("s1", "Sub", Some("t1"))];
        let hierarchy = Hierarchy::build(&docs).unwrap();
        let mut scan = scanner::scan(dir.path()).unwrap();

        let promoted = promote_parents(dir.path(), &docs, &hierarchy, &mut scan);
        assert_eq!(promoted, 1);
        assert!(!dir.path().join("Topic.md").exists());

        let index = fs::read_to_string(dir.path().join("Topic/README.md")).unwrap();
        assert!(index.contains("id_outline: t1"));
        assert!(index.contains("topic body"));
        assert!(scan.contains_key("Topic/README.md"));
        assert!(!scan.contains_key("Topic.md"));
    }

    #[test]
    fn promotion_ignores_non_parents_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Solo.md"), "---\nid_outline: a1\n---\n\nx\n").unwrap();
        fs::create_dir(dir.path().join("Done")).unwrap();
        fs::write(
            dir.path().join("Done/README.md"),
            "---\nid_outline: d1\n---\n\nx\n",
        )
        .unwrap();

        let docs = vec![
            doc("a1", "Solo", None),
            doc("d1", "Done", None),
            doc("k1", "Kid", Some("d1")),
        ];
        let hierarchy = Hierarchy::build(&docs).unwrap();
        let mut scan = scanner::scan(dir.path()).unwrap();

        assert_eq!(promote_parents(dir.path(), &docs, &hierarchy, &mut scan), 0);
        assert!(dir.path().join("Solo.md").exists());
        assert!(dir.path().join("Done/README.md").exists());
    }

    #[test]
    fn demotes_lone_index_when_doc_loses_children() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Topic")).unwrap();
        fs::write(
            dir.path().join("Topic/README.md"),
            "---\nid_outline: t1\n---\n\nbody\n",
        )
        .unwrap();

        let docs = vec![doc("t1", "Topic", None)];
        let hierarchy = Hierarchy::build(&docs).unwrap();
        let mut scan = scanner::scan(dir.path()).unwrap();

        let demoted = demote_orphaned_indexes(dir.path(), &docs, &hierarchy, &mut scan);
        assert_eq!(demoted, 1);
        assert!(dir.path().join("Topic.md").exists());
        assert!(!dir.path().join("Topic").exists());
        assert!(scan.contains_key("Topic.md"));
        assert!(!scan.contains_key("Topic/README.md"));
    }

    #[test]
    fn demotion_skipped_when_folder_has_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Topic")).unwrap();
        fs::write(
            dir.path().join("Topic/README.md"),
            "---\nid_outline: t1\n---\n\nbody\n",
        )
        .unwrap();
        fs::write(dir.path().join("Topic/Draft.md"), "local draft\n").unwrap();

        let docs = vec![doc("t1", "Topic", None)];
        let hierarchy = Hierarchy::build(&docs).unwrap();
        let mut scan = scanner::scan(dir.path()).unwrap();

        assert_eq!(
            demote_orphaned_indexes(dir.path(), &docs, &hierarchy, &mut scan),
            0
        );
        assert!(dir.path().join("Topic/README.md").exists());
        assert!(dir.path().join("Topic/Draft.md").exists());
    }

    #[test]
    fn demotion_skips_root_index_and_unsynced_indexes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("README.md"),
            "---\nid_outline: r1\n---\n\nroot\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("Local")).unwrap();
        fs::write(dir.path().join("Local/README.md"), "never synced\n").unwrap();

        let docs: Vec<RemoteDoc> = Vec::new();
        let hierarchy = Hierarchy::build(&docs).unwrap();
        let mut scan = scanner::scan(dir.path()).unwrap();

        assert_eq!(
            demote_orphaned_indexes(dir.path(), &docs, &hierarchy, &mut scan),
            0
        );
        assert!(dir.path().join("README.md").exists());
        assert!(dir.path().join("Local/README.md").exists());
    }

    #[test]
    fn demoted_doc_still_listed_but_childless() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Topic")).unwrap();
        fs::write(
            dir.path().join("Topic/README.md"),
            "---\nid_outline: t1\n---\n\nbody\n",
        )
        .unwrap();

        // t1 is listed but has no children anymore.
        let docs = vec![doc("t1", "Topic", None), doc("other", "Other", None)];
        let hierarchy = Hierarchy::build(&docs).unwrap();
        let mut scan = scanner::scan(dir.path()).unwrap();

        assert_eq!(
            demote_orphaned_indexes(dir.path(), &docs, &hierarchy, &mut scan),
            1
        );
        assert!(dir.path().join("Topic.md").exists());
    }
}
