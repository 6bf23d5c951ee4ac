//! # anwdl-accesstoken
//!
//! File-backed SQLite store of access tokens gating admission to the
//! session server, independent of the per-session credentials issued by
//! `anwdl-credentials`.

pub mod error;
pub mod store;

pub use error::{AccessTokenError, Result};
pub use store::AccessTokenStore;
