//! Typed lifecycle events and their outcome, replacing the reflective
//! `on_xxx` property dispatch of the original implementation with a closed
//! enum and an explicit handler registry (owned by `anwdl-server`).

use serde::{Deserialize, Serialize};

/// The circumstance under which an event fired, mirroring the original
/// implementation's `CONTEXT_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Context {
    /// Fired synchronously while handling a client request.
    NormalProcess,
    /// Fired by a background routine (the reaper) rather than a client request.
    AutomaticAction,
    /// Fired from a deferred/async completion (the HTTP surface).
    DeferredCall,
    /// Fired as a client session is about to close.
    HandleEnd,
    /// Fired while unwinding after an error.
    Error,
}

/// A lifecycle event the engine can fire. Each variant corresponds to one
/// named hook in the original event-handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// A client connection was accepted by the listener.
    ConnectionAccepted,
    /// A connection was refused by the IP filter before any handshake bytes were sent.
    ConnectionRefusedIpFilter,
    /// A `Create` request was refused because the server is at capacity.
    ConnectionRefusedCapacity,
    /// A client session completed its handshake and is ready to receive a request.
    ClientInitialized,
    /// A client session ended, however it got there.
    ClientClosed,
    /// A request was refused for carrying a missing/disabled access token, or
    /// a `Destroy` named an unknown container/client-token pair.
    AccessTokenRefused,
    /// A request named an unknown container UUID or a client token that did not match it.
    AuthenticationError,
    /// A request was received and passed structural validation.
    RequestReceived,
    /// A request failed structural validation.
    MalformedRequest,
    /// A request carried a verb this server does not recognize.
    UnhandledVerb,
    /// A container/VM was successfully provisioned.
    ContainerCreated,
    /// Container provisioning failed partway through and was unwound.
    ContainerCreateFailed,
    /// A container's VM domain finished booting and reported an IP address.
    ContainerDomainStarted,
    /// A container was torn down in response to a `Destroy` request.
    ContainerDestroyed,
    /// The reaper detected a domain had stopped outside of a `Destroy` request.
    ContainerDomainStopped,
    /// A port forwarder was created for a container.
    ForwarderCreated,
    /// A port forwarder's relay thread started running.
    ForwarderStarted,
    /// A port forwarder was stopped.
    ForwarderStopped,
    /// The endpoint administration shell was created for a container.
    EndpointShellCreated,
    /// The endpoint administration shell finished provisioning SSH credentials.
    EndpointShellOpened,
    /// The endpoint administration shell was closed.
    EndpointShellClosed,
    /// A `Stat` request was served.
    StatRequested,
    /// The engine finished startup and began accepting connections.
    ServerStarted,
    /// The engine finished shutdown.
    ServerStopped,
    /// An unexpected error occurred in a background routine.
    RuntimeError,
}

/// The result of firing an event: whether the caller should continue its
/// current operation or abort it. Replaces the `-1` sentinel return value
/// used by the original dispatcher to signal "the client session is gone,
/// stop processing this request".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Proceed with the current operation.
    Continue,
    /// Abort the current operation; the caller must unwind and stop.
    Abort,
}

impl EventOutcome {
    /// True when the outcome is [`EventOutcome::Abort`].
    #[must_use]
    pub const fn is_abort(self) -> bool {
        matches!(self, Self::Abort)
    }
}
