//! Last-known remote document mapping persisted in the sidecar

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One remote document as it looked at the end of the previous run,
/// together with the local path that represented it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMapping {
    pub id: String,
    #[serde(default)]
    pub short_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub local_path: String,
    #[serde(default)]
    pub is_folder: bool,
}

impl DocMapping {
    /// True when `candidate` equals either identifier form.
    #[must_use]
    pub fn matches_id(&self, candidate: &str) -> bool {
        self.id == candidate || self.short_id.as_deref() == Some(candidate)
    }
}
