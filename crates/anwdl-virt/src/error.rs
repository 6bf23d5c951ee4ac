//! Virtualization and endpoint shell error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the hypervisor driver and the container abstraction.
#[derive(Debug, Error)]
pub enum VirtError {
    /// The hypervisor connection could not be opened.
    #[error("could not connect to hypervisor: {0}")]
    Connection(String),

    /// Defining or starting a domain failed.
    #[error("could not start domain: {0}")]
    DomainStart(String),

    /// A domain never became reachable within its start timeout.
    #[error("domain {0} did not acquire an IP address before timing out")]
    DomainUnreachable(Uuid),

    /// An operation referenced a domain handle the driver does not know about.
    #[error("unknown domain handle: {0}")]
    UnknownDomain(String),

    /// Hashing the ISO image failed.
    #[error("could not hash ISO image: {0}")]
    IsoHash(#[from] std::io::Error),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, VirtError>;

/// Errors produced by the SSH-backed endpoint administration shell.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The SSH TCP connection could not be established.
    #[error("could not connect to {0}: {1}")]
    Connect(String, std::io::Error),

    /// The SSH session handshake or authentication failed.
    #[error("SSH session error: {0}")]
    Session(String),

    /// The admin setup script printed output on stdout or stderr, which the
    /// original implementation (and this port) treats as failure.
    #[error("admin setup script reported output: stdout={stdout:?} stderr={stderr:?}")]
    AdminSetupFailed {
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Executing a remote command failed.
    #[error("remote command execution failed: {0}")]
    Exec(String),
}

/// Convenience alias for this crate's endpoint-shell operations.
pub type EndpointResult<T> = std::result::Result<T, EndpointError>;
