//! # anwdl-protocol
//!
//! Wire-level request/response schema, verb parsing, structural validation,
//! and the typed lifecycle event vocabulary shared by the binary protocol
//! engine and the HTTP/REST surface.

pub mod event;
pub mod message;
pub mod validation;
pub mod verb;

pub use event::{Context, Event, EventOutcome};
pub use message::{make_response, Request, Response};
pub use validation::{verify_request_content, ValidationError};
pub use verb::{UnknownVerb, Verb};
