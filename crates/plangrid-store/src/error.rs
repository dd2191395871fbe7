//! Error types for the configuration-file store.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting plan files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("failed to create repository directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    #[error("read error for {filename}: {source}")]
    Read {
        filename: String,
        source: std::io::Error,
    },

    #[error("write error for {filename}: {source}")]
    Write {
        filename: String,
        source: std::io::Error,
    },

    #[error("delete error for {filename}: {source}")]
    Delete {
        filename: String,
        source: std::io::Error,
    },

    #[error("failed to list repository: {0}")]
    List(String),
}
