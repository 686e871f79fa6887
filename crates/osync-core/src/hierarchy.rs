//! Forest view of the remote listing.
//!
//! Built fresh each run. The server should never send a parent cycle, but
//! the builder refuses one anyway so path assignment cannot loop.

use std::collections::{BTreeMap, HashSet, VecDeque};

use tracing::warn;

use crate::error::{Error, Result};
use crate::models::RemoteDoc;

#[derive(Debug, Clone, Default)]
struct Node {
    parent_id: Option<String>,
    children: Vec<String>,
    depth: usize,
}

/// Parent/child relations of every listed document.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    nodes: BTreeMap<String, Node>,
    roots: Vec<String>,
}

impl Hierarchy {
    /// Build the forest from a listing.
    ///
    /// A `parent_id` that is not in the listing demotes the document to a
    /// root; a cycle is an invariant violation.
    pub fn build(docs: &[RemoteDoc]) -> Result<Self> {
        let ids: HashSet<&str> = docs.iter().map(|doc| doc.id.as_str()).collect();

        let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
        let mut roots = Vec::new();
        for doc in docs {
            let parent_id = match doc.parent_id.as_deref() {
                Some(parent) if ids.contains(parent) => Some(parent.to_string()),
                Some(parent) => {
                    warn!(
                        "Document {} references unknown parent {}; treating as root",
                        doc.id, parent
                    );
                    None
                }
                None => None,
            };
            if parent_id.is_none() {
                roots.push(doc.id.clone());
            }
            nodes.entry(doc.id.clone()).or_default().parent_id = parent_id.clone();
            if let Some(parent) = parent_id {
                nodes.entry(parent).or_default().children.push(doc.id.clone());
            }
        }

        roots.sort();
        for node in nodes.values_mut() {
            node.children.sort();
        }

        // Breadth-first depth assignment; anything unreachable from a root
        // sits on a parent cycle.
        let mut visited = 0usize;
        let mut queue: VecDeque<(String, usize)> =
            roots.iter().map(|id| (id.clone(), 0)).collect();
        while let Some((id, depth)) = queue.pop_front() {
            visited += 1;
            let children = {
                let node = nodes.get_mut(&id).expect("queued id exists");
                node.depth = depth;
                node.children.clone()
            };
            for child in children {
                queue.push_back((child, depth + 1));
            }
        }
        if visited != nodes.len() {
            return Err(Error::Invariant(format!(
                "remote listing contains a parent cycle ({} of {} documents reachable)",
                visited,
                nodes.len()
            )));
        }

        Ok(Self { nodes, roots })
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// A parent document has at least one child.
    #[must_use]
    pub fn is_parent(&self, id: &str) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| !node.children.is_empty())
    }

    #[must_use]
    pub fn children(&self, id: &str) -> &[String] {
        self.nodes
            .get(id)
            .map_or(&[], |node| node.children.as_slice())
    }

    #[must_use]
    pub fn parent(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).and_then(|node| node.parent_id.as_deref())
    }

    #[must_use]
    pub fn depth(&self, id: &str) -> Option<usize> {
        self.nodes.get(id).map(|node| node.depth)
    }

    /// Root ids, ascending.
    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }
}
