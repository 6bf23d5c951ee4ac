//! Crypto error type.

use thiserror::Error;

/// Errors produced by key generation, encryption, and decryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// RSA key generation failed.
    #[error("RSA key generation failed: {0}")]
    KeyGeneration(String),

    /// A PEM-encoded key could not be parsed.
    #[error("malformed key material: {0}")]
    CryptoMaterial(String),

    /// Plaintext exceeds the maximum size encryptable under this RSA key.
    #[error("payload of {actual} bytes exceeds the {max} byte limit for this key size")]
    PayloadTooLarge {
        /// Size of the payload that was rejected.
        actual: usize,
        /// Maximum payload size the key can encrypt in one call.
        max: usize,
    },

    /// RSA encryption or decryption failed.
    #[error("RSA operation failed: {0}")]
    Rsa(String),

    /// AES-GCM encryption or decryption failed (includes authentication failure).
    #[error("AES-GCM operation failed: {0}")]
    Aes(String),

    /// A ciphertext was too short to contain a valid authentication tag.
    #[error("ciphertext too short to be valid")]
    CiphertextTooShort,
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
