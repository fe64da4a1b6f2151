//! Event values and descriptor matching.
//!
//! Events are a name plus an opaque JSON payload. Transitions declare
//! [`EventDescriptor`]s: dotted token sequences that match an event name
//! when they are a prefix of it at token boundaries. A `*` token matches
//! any single token; the bare descriptor `*` matches every event.

use std::fmt;

use serde_json::Value;

use crate::error::DefinitionError;

/// Synthetic event name delivered to callbacks while the initial
/// configuration is entered.
pub const INITIAL_EVENT: &str = "__initial__";

/// Internal event raised when a host callback fails and the chart runs with
/// `error_on_execution` enabled.
pub const ERROR_EXECUTION: &str = "error.execution";

/// Prefix of the internal events announcing that a compound or parallel
/// state has completed.
pub const DONE_STATE_PREFIX: &str = "done.state.";

/// The wildcard token.
pub const WILDCARD: &str = "*";

/// A named event with an opaque payload.
///
/// The payload is an arbitrary [`serde_json::Value`]; guards and actions read
/// it through [`CallbackContext::event_data`](crate::CallbackContext).
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub data: Value,
    /// Host-assigned identifier, echoed back in `error.execution` payloads.
    pub id: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Value::Null,
            id: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The synthetic event in effect during initial entry.
    pub fn initial() -> Self {
        Self::new(INITIAL_EVENT)
    }

    /// A `done.state.<id>` completion event.
    pub fn done_state(state_name: &str, data: Value) -> Self {
        Self::new(format!("{DONE_STATE_PREFIX}{state_name}")).with_data(data)
    }

    /// An `error.execution` event carrying the failure message and the id of
    /// the event whose processing failed.
    pub fn error_execution(error: &str, event_id: Option<&str>) -> Self {
        let data = serde_json::json!({
            "error": error,
            "event_id": event_id,
        });
        Self::new(ERROR_EXECUTION).with_data(data)
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event::new(name)
    }
}

/// A dotted event descriptor, stored as its token vector.
///
/// Matching is a prefix check at token boundaries: `error` matches
/// `error.execution` but not `errors`. A `*` token is a wildcard for exactly
/// one position, and the descriptor consisting of a single `*` matches any
/// event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    tokens: Vec<String>,
}

impl EventDescriptor {
    /// Parse a descriptor, rejecting empty tokens (leading, trailing or
    /// doubled dots) and the empty string.
    pub fn parse(descriptor: &str) -> Result<Self, DefinitionError> {
        if descriptor.is_empty() {
            return Err(DefinitionError::InvalidDescriptor(descriptor.to_string()));
        }
        let tokens: Vec<String> = descriptor.split('.').map(str::to_string).collect();
        if tokens.iter().any(String::is_empty) {
            return Err(DefinitionError::InvalidDescriptor(descriptor.to_string()));
        }
        Ok(Self { tokens })
    }

    /// Whether this descriptor matches the given event name.
    pub fn matches(&self, event_name: &str) -> bool {
        if self.tokens.len() == 1 && self.tokens[0] == WILDCARD {
            return true;
        }
        let name_tokens: Vec<&str> = event_name.split('.').collect();
        if self.tokens.len() > name_tokens.len() {
            return false;
        }
        self.tokens
            .iter()
            .zip(name_tokens)
            .all(|(token, part)| token == WILDCARD || token == part)
    }
}

impl fmt::Display for EventDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join("."))
    }
}
