//! Library access errors

use thiserror::Error;

/// Failure while reading from a library source
#[derive(Debug, Error)]
pub enum LibraryError {
    /// SQLite query or connection failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (snapshot file, data directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON snapshot
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The library cannot be opened at all
    #[error("Library unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, LibraryError>;
