//! Remote gateway contract and its HTTP implementation.

mod outline;

pub use outline::OutlineGateway;

use crate::error::Result;
use crate::models::{Collection, RemoteDoc};

/// Field changes for an update call.
///
/// `None` leaves a field untouched. The parent is tri-state: `None` keeps
/// the current parent, `Some(None)` moves the document to the root,
/// `Some(Some(id))` re-parents it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocUpdate<'a> {
    pub title: Option<&'a str>,
    pub text: Option<&'a str>,
    pub parent_id: Option<Option<&'a str>>,
}

/// Typed operations the sync engine needs from the remote side.
///
/// Implementations own transport concerns (auth, pagination, timeouts).
/// A failed call surfaces as `Error::Transport` and is handled by the
/// caller's per-operation policy.
#[allow(async_fn_in_trait)]
pub trait RemoteGateway {
    async fn list_collections(&self) -> Result<Vec<Collection>>;

    /// Full listing of one collection, paginated internally.
    async fn list_documents(&self, collection_id: &str) -> Result<Vec<RemoteDoc>>;

    /// Create a published document; the server assigns its identifiers.
    async fn create_document(
        &self,
        collection_id: &str,
        title: &str,
        text: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteDoc>;

    async fn update_document(&self, id: &str, update: DocUpdate<'_>) -> Result<RemoteDoc>;

    async fn delete_document(&self, id: &str) -> Result<()>;
}
