//! Divergent-edit conflict model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LocalFile, RemoteDoc};

/// Conflict categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Both sides changed since the last sync point
    BidirectionalEdit,
    /// Edits landed within the simultaneous-edit window of each other
    SimultaneousEdit,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::BidirectionalEdit => write!(f, "bidirectional edit"),
            ConflictKind::SimultaneousEdit => write!(f, "simultaneous edit"),
        }
    }
}

/// Suggested out-of-band resolution, derived from which side is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suggestion {
    KeepLocal,
    KeepRemote,
    ManualReview,
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suggestion::KeepLocal => write!(f, "local copy is newer; likely keep local"),
            Suggestion::KeepRemote => write!(f, "remote copy is newer; likely keep remote"),
            Suggestion::ManualReview => write!(f, "edits are close in time; review manually"),
        }
    }
}

/// A document that diverged on both sides. Any non-empty conflict set
/// halts the run before either side is mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub path: String,
    pub id: String,
    pub local_mtime: DateTime<Utc>,
    pub remote_updated_at: DateTime<Utc>,
    /// Local snapshot at detection time, for the conflict report
    pub local: LocalFile,
    /// Remote document at detection time, for the conflict report
    pub remote: RemoteDoc,
    pub suggestion: Suggestion,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (local {}, remote {}) - {}",
            self.kind, self.path, self.local_mtime, self.remote_updated_at, self.suggestion
        )
    }
}
