//! Local file snapshot model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of one markdown file under the sync root.
///
/// Serialized into the sidecar's `local_files` array, so field names are
/// part of the on-disk contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFile {
    /// Path relative to the sync root, POSIX separators
    pub rel_path: String,
    /// Filesystem modification time
    pub mtime: DateTime<Utc>,
    /// File size in bytes
    pub size: u64,
    /// SHA-256 of the full file bytes
    pub content_hash: String,
    /// `id_outline` from front-matter; absent for never-synced files
    #[serde(default)]
    pub outline_id: Option<String>,
    #[serde(default)]
    pub has_front_matter: bool,
    /// Basename equals the folder index name
    #[serde(default)]
    pub is_index: bool,
}
