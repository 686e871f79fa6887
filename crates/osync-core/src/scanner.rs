//! Local tree scanner.
//!
//! Walks the sync root and snapshots every markdown file: stat data,
//! content hash, and the front-matter id when present. Hidden path
//! components (including the sidecar) are skipped.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::frontmatter;
use crate::models::LocalFile;
use crate::pathmap::INDEX_FILE;
use crate::util::content_hash;

/// Snapshot every `.md` file under `root`, keyed by relative path.
///
/// An unreadable root is fatal; an unreadable individual file or
/// subdirectory is logged and skipped.
pub fn scan(root: &Path) -> Result<BTreeMap<String, LocalFile>> {
    let metadata = fs::metadata(root)?;
    if !metadata.is_dir() {
        return Err(Error::Io(io::Error::other(format!(
            "sync root {} is not a directory",
            root.display()
        ))));
    }

    let mut files = BTreeMap::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => {
                return Err(Error::Io(io::Error::other(error)));
            }
            Err(error) => {
                warn!("Skipping unreadable entry: {error}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension() != Some(OsStr::new("md")) {
            continue;
        }
        match snapshot_file(root, entry.path()) {
            Ok(file) => {
                files.insert(file.rel_path.clone(), file);
            }
            Err(error) => {
                warn!("Skipping unreadable file {}: {error}", entry.path().display());
            }
        }
    }
    Ok(files)
}

/// Snapshot one file below `root`. Also used after in-place rewrites to
/// refresh a single scan entry.
pub(crate) fn snapshot_file(root: &Path, path: &Path) -> Result<LocalFile> {
    let rel_path = relative_posix(root, path)?;
    let bytes = fs::read(path)?;
    let metadata = fs::metadata(path)?;
    let mtime: DateTime<Utc> = metadata.modified()?.into();

    let content = String::from_utf8_lossy(&bytes);
    let document = frontmatter::parse(&content);

    Ok(LocalFile {
        rel_path,
        mtime,
        size: metadata.len(),
        content_hash: content_hash(&bytes),
        outline_id: document.front_matter.id().map(str::to_string),
        has_front_matter: document.had_front_matter,
        is_index: path.file_name() == Some(OsStr::new(INDEX_FILE)),
    })
}

/// Relative path with POSIX separators, regardless of platform.
pub(crate) fn relative_posix(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::Io(io::Error::other(format!(
            "{} is outside the sync root",
            path.display()
        ))))?;
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| {
            Error::Io(io::Error::other(format!(
                "{} has a non-UTF-8 path component",
                path.display()
            )))
        })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}
