//! osync-core - Core library for osync
//!
//! Reconciliation engine between a remote Outline collection and a local
//! markdown tree: three-snapshot change detection, conflict policy,
//! ordered execution of sync operations, and the structural conversion
//! between parent documents and folders.

pub mod config;
pub mod conflict;
pub mod convert;
pub mod detect;
pub mod error;
pub mod frontmatter;
pub mod hierarchy;
pub mod models;
pub mod pathmap;
pub mod pull;
pub mod push;
pub mod remote;
pub mod scanner;
pub mod state;
pub mod sync;
pub mod text;
pub mod util;

pub use config::Config;
pub use error::{Error, Result};
pub use hierarchy::Hierarchy;
pub use models::{
    Collection, Conflict, ConflictKind, DocMapping, LocalFile, RemoteDoc, Suggestion,
};
pub use remote::{DocUpdate, OutlineGateway, RemoteGateway};
pub use state::{StateStore, SyncState};
pub use sync::SyncReport;
