//! Port forwarder pool error type.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the port forwarder pool.
#[derive(Debug, Error)]
pub enum ForwardingError {
    /// No bindable port was found in the configured range.
    #[error("no bindable port available in the forwarder pool")]
    NoPortAvailable,

    /// A forwarder already exists for this container UUID.
    #[error("a forwarder already exists for container {0}")]
    DuplicateForwarder(Uuid),

    /// The `socat` relay binary could not be located on `PATH`.
    #[error("relay binary not found: {0}")]
    RelayBinaryMissing(String),

    /// Spawning or killing the relay process failed.
    #[error("relay process error: {0}")]
    Process(#[from] std::io::Error),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, ForwardingError>;
