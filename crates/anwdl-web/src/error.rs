//! HTTP surface error type.

use thiserror::Error;

/// Errors produced while configuring or running the HTTP/REST surface.
#[derive(Debug, Error)]
pub enum WebError {
    /// The configured bind address/port did not parse as a socket address.
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),

    /// TLS was enabled but the certificate or key path was left unset.
    #[error("web_server.enable_tls is set but tls_cert_path/tls_key_path is missing")]
    MissingTlsMaterial,

    /// The TLS certificate/key material could not be loaded.
    #[error("failed to load TLS material: {0}")]
    Tls(#[source] std::io::Error),

    /// The HTTP listener itself failed.
    #[error("HTTP server I/O error: {0}")]
    Io(#[source] std::io::Error),
}

/// Convenience alias for this crate's fallible operations.
pub type WebResult<T> = std::result::Result<T, WebError>;
