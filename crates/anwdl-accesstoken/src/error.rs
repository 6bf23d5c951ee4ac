//! Access token store error type.

use thiserror::Error;

/// Errors produced by the access token store.
#[derive(Debug, Error)]
pub enum AccessTokenError {
    /// The underlying SQLite database returned an error.
    #[error("access token database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The entry id given to an operation does not exist.
    #[error("no access token entry with id {0}")]
    NotFound(i64),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, AccessTokenError>;
