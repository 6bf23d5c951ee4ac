//! Credential store error type.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the credential store.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A credential entry already exists for this container UUID.
    #[error("a credential entry already exists for container {0}")]
    DuplicateContainer(Uuid),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, CredentialError>;
