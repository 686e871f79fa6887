//! Sidecar state persistence.
//!
//! The sidecar is the pivot of the three-way diff: what the disk and the
//! remote looked like at the end of the previous successful run. A missing
//! or unreadable sidecar degrades to a safe first run, never to an error.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::models::{DocMapping, LocalFile};

/// Reserved filename under the sync root; never a syncable document.
pub const STATE_FILE: &str = ".outline";

/// Persisted state of the previous run.
///
/// Unknown top-level fields survive a load/save round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub document_mapping: Vec<DocMapping>,
    #[serde(default)]
    pub local_files: Vec<LocalFile>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SyncState {
    /// No previous sync point: local deltas are suppressed this run.
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.last_sync.is_none()
    }

    #[must_use]
    pub fn files_by_path(&self) -> BTreeMap<&str, &LocalFile> {
        self.local_files
            .iter()
            .map(|file| (file.rel_path.as_str(), file))
            .collect()
    }

    #[must_use]
    pub fn file_by_outline_id(&self, id: &str) -> Option<&LocalFile> {
        self.local_files
            .iter()
            .find(|file| file.outline_id.as_deref() == Some(id))
    }

    #[must_use]
    pub fn mapping_by_id(&self) -> HashMap<&str, &DocMapping> {
        self.document_mapping
            .iter()
            .map(|entry| (entry.id.as_str(), entry))
            .collect()
    }

    /// Mapping entry matching either identifier form.
    #[must_use]
    pub fn mapping_for(&self, candidate: &str) -> Option<&DocMapping> {
        self.document_mapping
            .iter()
            .find(|entry| entry.matches_id(candidate))
    }

    /// Mapping entry that represented `local_path` at the end of the
    /// previous run.
    #[must_use]
    pub fn mapping_at_path(&self, local_path: &str) -> Option<&DocMapping> {
        self.document_mapping
            .iter()
            .find(|entry| entry.local_path == local_path)
    }
}

/// Loads and atomically rewrites the sidecar file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(STATE_FILE),
        }
    }

    /// Read the sidecar; absent or malformed content is a first run.
    #[must_use]
    pub fn load(&self) -> SyncState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) => {
                if error.kind() != io::ErrorKind::NotFound {
                    warn!(
                        "Could not read state file {}: {error}; starting fresh",
                        self.path.display()
                    );
                }
                return SyncState::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(error) => {
                warn!(
                    "Ignoring malformed state file {}: {error}; starting fresh",
                    self.path.display()
                );
                SyncState::default()
            }
        }
    }

    /// Write the sidecar atomically (temp file + rename).
    pub fn save(&self, state: &SyncState) -> Result<()> {
        let mut serialized = serde_json::to_string_pretty(state)?;
        serialized.push('\n');

        let temp_path = self.path.with_file_name(format!("{STATE_FILE}.tmp"));
        fs::write(&temp_path, serialized)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
