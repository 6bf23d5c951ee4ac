//! # anwdl-web
//!
//! The HTTP/REST surface: the same three verbs the binary protocol serves,
//! addressed by path segment rather than a length-prefixed frame. Every
//! handler runs the shared `anwdl-server` engine logic inside
//! `tokio::task::spawn_blocking`, since hypervisor and SSH calls block.

pub mod compensation;
pub mod error;
pub mod routes;
pub mod serve;

pub use error::{WebError, WebResult};
pub use routes::build_router;
pub use serve::serve;
