//! # anwdl-server
//!
//! The binary-protocol client session, the server engine that drives
//! admission control and request dispatch, and the typed event registry
//! both the binary and HTTP surfaces fire into.

pub mod admission;
pub mod engine;
pub mod error;
pub mod events;
pub mod framing;
pub mod session;

pub use admission::IpFilter;
pub use engine::Engine;
pub use error::{EngineError, EngineResult, SessionError, SessionResult};
pub use events::{EventHandler, EventHandlerTable};
pub use session::{session_id_for, ClientSession};
