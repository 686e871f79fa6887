//! Remote document and collection models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document in the remote collection.
///
/// `id` is the stable opaque identifier; `short_id` is the alternate
/// human-readable form some servers expose. Local front-matter may carry
/// either, so identity checks go through [`RemoteDoc::matches_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDoc {
    pub id: String,
    #[serde(default)]
    pub short_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteDoc {
    /// True when `candidate` equals either identifier form.
    #[must_use]
    pub fn matches_id(&self, candidate: &str) -> bool {
        self.id == candidate || self.short_id.as_deref() == Some(candidate)
    }

    /// Identifier written into local front-matter: the short id when the
    /// server provides one, else the full id.
    #[must_use]
    pub fn front_matter_id(&self) -> &str {
        self.short_id.as_deref().unwrap_or(&self.id)
    }
}

/// A top-level remote container that scopes a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(short_id: Option<&str>) -> RemoteDoc {
        RemoteDoc {
            id: "doc-1".to_string(),
            short_id: short_id.map(str::to_string),
            title: "Title".to_string(),
            text: String::new(),
            parent_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matches_either_identifier_form() {
        let with_short = doc(Some("Ab3dE9"));
        assert!(with_short.matches_id("doc-1"));
        assert!(with_short.matches_id("Ab3dE9"));
        assert!(!with_short.matches_id("other"));
    }

    #[test]
    fn front_matter_id_prefers_short_form() {
        assert_eq!(doc(Some("Ab3dE9")).front_matter_id(), "Ab3dE9");
        assert_eq!(doc(None).front_matter_id(), "doc-1");
    }
}
