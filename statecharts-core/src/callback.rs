//! Host callback values and the argument set they receive.
//!
//! Callbacks are plain values attached to the chart at declaration time:
//! [`Action`]s for entry/exit/transition executable content and [`Guard`]s
//! for transition predicates. Each is a tagged variant so the interpreter
//! can invoke them uniformly: a synchronous closure, an asynchronous
//! closure, or (for actions) the name of an event to raise internally.
//!
//! Every invocation receives a [`CallbackContext`] carrying the closed set
//! of well-known arguments. A callback reads the fields it needs and
//! ignores the rest.

use std::fmt;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::event::Event;

/// Failure raised by a host callback.
pub type ExecutionError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type ActionFn = Arc<dyn Fn(&CallbackContext) -> Result<Value, ExecutionError> + Send + Sync>;
pub type AsyncActionFn =
    Arc<dyn Fn(CallbackContext) -> BoxFuture<'static, Result<Value, ExecutionError>> + Send + Sync>;
pub type GuardFn = Arc<dyn Fn(&CallbackContext) -> bool + Send + Sync>;
pub type AsyncGuardFn = Arc<dyn Fn(CallbackContext) -> BoxFuture<'static, bool> + Send + Sync>;
pub type DoneDataFn = Arc<dyn Fn(&CallbackContext) -> Value + Send + Sync>;

/// Executable content: an entry/exit/transition action.
#[derive(Clone)]
pub enum Action {
    Sync(ActionFn),
    Async(AsyncActionFn),
    /// Raise the named event on the internal queue when invoked.
    Raise(String),
}

impl Action {
    /// An action that runs for its side effect and returns `Null`.
    pub fn run(f: impl Fn(&CallbackContext) + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(move |ctx| {
            f(ctx);
            Ok(Value::Null)
        }))
    }

    /// An action whose return value is collected by the dispatcher.
    pub fn returning(f: impl Fn(&CallbackContext) -> Value + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(move |ctx| Ok(f(ctx))))
    }

    /// An action that may fail; failures follow the chart's
    /// `error_on_execution` policy.
    pub fn fallible(
        f: impl Fn(&CallbackContext) -> Result<Value, ExecutionError> + Send + Sync + 'static,
    ) -> Self {
        Self::Sync(Arc::new(f))
    }

    /// An action that raises `event_name` on the internal queue.
    pub fn raise(event_name: impl Into<String>) -> Self {
        Self::Raise(event_name.into())
    }

    /// An asynchronous action, only runnable by the async interpreter.
    pub fn run_async(
        f: impl Fn(CallbackContext) -> BoxFuture<'static, Result<Value, ExecutionError>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self::Async(Arc::new(f))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Action::Sync"),
            Self::Async(_) => f.write_str("Action::Async"),
            Self::Raise(name) => write!(f, "Action::Raise({name})"),
        }
    }
}

/// A transition predicate.
#[derive(Clone)]
pub enum Guard {
    Sync(GuardFn),
    Async(AsyncGuardFn),
}

impl Guard {
    pub fn new(f: impl Fn(&CallbackContext) -> bool + Send + Sync + 'static) -> Self {
        Self::Sync(Arc::new(f))
    }

    /// An asynchronous predicate, only evaluable by the async interpreter.
    pub fn new_async(
        f: impl Fn(CallbackContext) -> BoxFuture<'static, bool> + Send + Sync + 'static,
    ) -> Self {
        Self::Async(Arc::new(f))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Guard::Sync"),
            Self::Async(_) => f.write_str("Guard::Async"),
        }
    }
}

/// The closed argument set offered to callbacks.
///
/// | Field | Meaning |
/// |---|---|
/// | `event` | Name of the current event, or `__initial__` during start. |
/// | `event_data` | Full payload of the current event. |
/// | `source` | Source state name (transition callbacks). |
/// | `target` | Primary target state name (transition callbacks). |
/// | `state` | The state whose entry/exit is running. |
/// | `previous_configuration` | Active state names before the microstep. |
/// | `new_configuration` | Active state names after the microstep. |
/// | `error` | The caught failure (`error.execution` handlers only). |
///
/// The context is cheap to clone; asynchronous callbacks take it by value.
#[derive(Clone, Debug)]
pub struct CallbackContext {
    pub event: String,
    pub event_data: Value,
    pub source: Option<String>,
    pub target: Option<String>,
    pub state: Option<String>,
    pub previous_configuration: Vec<String>,
    pub new_configuration: Vec<String>,
    pub error: Option<Value>,
    emitter: EventEmitter,
}

impl CallbackContext {
    pub fn new(event: String, event_data: Value, emitter: EventEmitter) -> Self {
        Self {
            event,
            event_data,
            source: None,
            target: None,
            state: None,
            previous_configuration: Vec::new(),
            new_configuration: Vec::new(),
            error: None,
            emitter,
        }
    }

    /// Enqueue an internal event, delivered within the current macrostep.
    pub fn raise(&self, event: impl Into<Event>) {
        self.emitter.raise(event.into());
    }

    /// Enqueue an external event, delivered after the current macrostep
    /// completes (run-to-completion).
    pub fn send(&self, event: impl Into<Event>) {
        self.emitter.send(event.into());
    }
}

/// Buffered event sink handed to callbacks through the context.
///
/// Events emitted while a microstep runs are buffered here and flushed onto
/// the interpreter queues when the microstep completes, so a callback can
/// initiate events without re-entering the interpreter.
#[derive(Clone, Default)]
pub struct EventEmitter {
    inner: Arc<Mutex<EmitterBuffers>>,
}

#[derive(Default)]
struct EmitterBuffers {
    internal: Vec<Event>,
    external: Vec<Event>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, event: Event) {
        self.inner.lock().expect("emitter poisoned").internal.push(event);
    }

    pub fn send(&self, event: Event) {
        self.inner.lock().expect("emitter poisoned").external.push(event);
    }

    /// Take all buffered events, internal first, preserving emission order
    /// within each channel.
    pub fn drain(&self) -> (Vec<Event>, Vec<Event>) {
        let mut buffers = self.inner.lock().expect("emitter poisoned");
        (
            std::mem::take(&mut buffers.internal),
            std::mem::take(&mut buffers.external),
        )
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventEmitter")
    }
}
