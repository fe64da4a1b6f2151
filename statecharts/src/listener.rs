//! Runtime listeners.
//!
//! A listener participates in a running interpreter like a host-defined
//! handler: it is notified of every processed event, every fired
//! transition and every state entered or exited. All hooks default to
//! no-ops, so an implementation overrides only the ones it cares about.

use statecharts_core::{CallbackContext, Event};

pub trait Listener: Send {
    /// An event was dequeued for processing (internal or external).
    fn on_event(&mut self, _event: &Event) {}

    /// A transition's on-transition group ran; `ctx` carries source,
    /// target and the configuration views.
    fn on_transition(&mut self, _ctx: &CallbackContext) {}

    fn on_entry(&mut self, _state: &str, _ctx: &CallbackContext) {}

    fn on_exit(&mut self, _state: &str, _ctx: &CallbackContext) {}
}

/// Handle returned by `add_listener`, accepted by `remove_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
