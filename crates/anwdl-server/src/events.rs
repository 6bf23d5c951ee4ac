//! Typed event handler registry.
//!
//! Replaces the original implementation's reflective `on_xxx` property
//! dispatch with a closed [`Event`] enum and a registry built once at
//! construction time. A handler returning [`EventOutcome::Abort`] tells the
//! caller to stop processing the current request/routine immediately —
//! the typed analogue of the `-1` sentinel the original dispatcher returned.

use std::collections::HashMap;

use anwdl_protocol::{Context, Event, EventOutcome};
use serde_json::Value;

/// A registered event callback.
pub type EventHandler = Box<dyn Fn(Context, &Value) -> EventOutcome + Send + Sync>;

/// Maps each [`Event`] to at most one handler.
#[derive(Default)]
pub struct EventHandlerTable {
    handlers: HashMap<Event, EventHandler>,
}

impl EventHandlerTable {
    /// Creates an empty table; every event is a no-op `Continue` until registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the handler for `event`.
    pub fn register(&mut self, event: Event, handler: EventHandler) {
        self.handlers.insert(event, handler);
    }

    /// Fires `event` with `context` and `data`, returning `Continue` if no
    /// handler is registered.
    #[must_use]
    pub fn fire(&self, event: Event, context: Context, data: &Value) -> EventOutcome {
        match self.handlers.get(&event) {
            Some(handler) => handler(context, data),
            None => EventOutcome::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_event_continues() {
        let table = EventHandlerTable::new();
        let outcome = table.fire(Event::ServerStarted, Context::NormalProcess, &Value::Null);
        assert_eq!(outcome, EventOutcome::Continue);
    }

    #[test]
    fn registered_handler_can_abort() {
        let mut table = EventHandlerTable::new();
        table.register(
            Event::ContainerCreated,
            Box::new(|_, _| EventOutcome::Abort),
        );
        let outcome = table.fire(Event::ContainerCreated, Context::NormalProcess, &Value::Null);
        assert_eq!(outcome, EventOutcome::Abort);
    }
}
