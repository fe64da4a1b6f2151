//! Core model types for the statecharts library.
//!
//! This crate holds everything that is frozen at chart-construction time:
//! - [`Chart`], [`State`] and [`Transition`]: the immutable chart metadata
//! - [`Event`] and [`EventDescriptor`]: event values and the dotted-token
//!   matching algebra
//! - [`Action`], [`Guard`] and [`CallbackContext`]: host callback values and
//!   the argument set they are invoked with
//! - [`DefinitionError`] and [`SendError`]: the error taxonomy
//!
//! The interpreter that executes a chart lives in the `statecharts` crate;
//! chart metadata is created once by the builder and never mutates, so a
//! single [`Chart`] may be shared by any number of interpreter instances.

mod callback;
mod error;
mod event;
mod model;

pub use callback::{
    Action, ActionFn, AsyncActionFn, AsyncGuardFn, CallbackContext, DoneDataFn, EventEmitter,
    ExecutionError, Guard, GuardFn,
};
pub use error::{DefinitionError, SendError};
pub use event::{
    DONE_STATE_PREFIX, ERROR_EXECUTION, Event, EventDescriptor, INITIAL_EVENT, WILDCARD,
};
pub use model::{Chart, ChartSettings, State, StateId, StateKind, Transition, TransitionId,
    TransitionKind};
