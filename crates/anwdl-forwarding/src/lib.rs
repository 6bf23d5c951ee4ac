//! # anwdl-forwarding
//!
//! TCP port forwarder pool. Each forwarder relays one host port into a
//! container's guest SSH port via a supervised external relay process.

pub mod error;
pub mod forwarder;
pub mod pool;

pub use error::{ForwardingError, Result};
pub use forwarder::{Forwarder, RELAY_BINARY};
pub use pool::ForwarderPool;
