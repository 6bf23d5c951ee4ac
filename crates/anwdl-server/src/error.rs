//! Session and engine error types.

use thiserror::Error;

/// Errors produced by the binary protocol client session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport closed or errored mid-frame.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent a length prefix that was not valid ASCII decimal.
    #[error("malformed frame length prefix")]
    MalformedLength,

    /// The peer nacked a frame this side sent.
    #[error("peer rejected the last frame")]
    PeerRejected,

    /// A cryptographic operation during the handshake or a request failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] anwdl_crypto::CryptoError),

    /// The decrypted body was not valid JSON.
    #[error("malformed request/response body: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for this crate's session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Errors produced by the server engine while handling a request.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The client session itself failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The virtualization layer failed.
    #[error(transparent)]
    Virt(#[from] anwdl_virt::VirtError),

    /// The endpoint administration shell failed.
    #[error(transparent)]
    Endpoint(#[from] anwdl_virt::EndpointError),

    /// The port forwarder pool failed.
    #[error(transparent)]
    Forwarding(#[from] anwdl_forwarding::ForwardingError),

    /// The credential store reported a conflict.
    #[error(transparent)]
    Credential(#[from] anwdl_credentials::CredentialError),

    /// The access token store failed.
    #[error(transparent)]
    AccessToken(#[from] anwdl_accesstoken::AccessTokenError),

    /// The server is at capacity.
    #[error("server is at capacity: {used}/{total} container slots in use")]
    AtCapacity {
        /// Slots currently in use.
        used: u32,
        /// Total configured slots.
        total: u32,
    },

    /// The request was refused by the access token gate.
    #[error("access token missing, unknown, or disabled")]
    AccessTokenRefused,

    /// The request named a container UUID/token pair that does not exist.
    #[error("unknown container or invalid client token")]
    UnknownContainer,

    /// A registered event handler signalled [`anwdl_protocol::EventOutcome::Abort`].
    #[error("request aborted by an event handler")]
    Aborted,
}

/// Convenience alias for this crate's engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
