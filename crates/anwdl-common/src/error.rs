//! Error types shared by the leaf crate.
//!
//! Each downstream crate (`anwdl-crypto`, `anwdl-virt`, `anwdl-server`, ...)
//! defines its own [`thiserror::Error`] enum for its domain; this module only
//! carries the handful of error shapes that are genuinely ambient — I/O and
//! configuration failures that can occur before any domain-specific code runs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors common to configuration loading and ambient I/O.
#[derive(Debug, Error)]
pub enum CommonError {
    /// An I/O operation failed on a known path.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path the operation was attempted on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file failed validation.
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description of what failed validation.
        message: String,
    },

    /// A YAML document could not be parsed.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, CommonError>;
