//! Data model shared by every sync phase.

mod change_set;
mod conflict;
mod local_file;
mod mapping;
mod remote_doc;

pub use change_set::{LocalChanges, MovedFile, RemoteChanges};
pub use conflict::{Conflict, ConflictKind, Suggestion};
pub use local_file::LocalFile;
pub use mapping::DocMapping;
pub use remote_doc::{Collection, RemoteDoc};
