//! Error types for osync-core

use thiserror::Error;

/// Result type alias using osync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in osync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote gateway error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote state that must never occur (e.g. a parent cycle)
    #[error("Invariant violation: {0}")]
    Invariant(String),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}
