//! Change-set categories produced by change detection

use serde::{Deserialize, Serialize};

use super::{DocMapping, LocalFile};

/// A locally renamed or relocated file, matched across paths by its
/// front-matter id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedFile {
    pub id: String,
    pub from_path: String,
    pub to_path: String,
}

/// Local-side deltas since the previous run.
///
/// Categories are disjoint: a moved file is not also reported deleted at
/// its old path, and a potential conflict is always also a modified file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalChanges {
    pub new_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub moved_files: Vec<MovedFile>,
    /// Previous snapshot entries, so the remote id survives the deletion
    pub deleted_files: Vec<LocalFile>,
    /// Modified after the last sync point; conflict candidates
    pub potential_conflicts: Vec<String>,
}

impl LocalChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty()
            && self.modified_files.is_empty()
            && self.moved_files.is_empty()
            && self.deleted_files.is_empty()
    }
}

/// Remote-side deltas since the previous run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteChanges {
    /// Ids present in the listing but not in the previous mapping
    pub new_docs: Vec<String>,
    /// Ids present in both, updated after the last sync point
    pub updated_docs: Vec<String>,
    /// Previous mapping entries whose id is no longer listed
    pub deleted_docs: Vec<DocMapping>,
}

impl RemoteChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_docs.is_empty() && self.updated_docs.is_empty() && self.deleted_docs.is_empty()
    }
}
