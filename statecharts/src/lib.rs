#![doc = include_str!("../../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core {
    pub use statecharts_core::*;
}

mod builder;
mod config;
mod dispatch;
mod interpreter;
mod listener;
mod microstep;
mod queue;
mod select;
mod validation;

#[cfg(feature = "async")]
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
mod async_interpreter;

pub use builder::{ChartBuilder, StateBuilder, TransitionBuilder};
pub use interpreter::{Interpreter, Snapshot};
pub use listener::{Listener, ListenerId};
pub use statecharts_core::{
    Action, CallbackContext, Chart, ChartSettings, DefinitionError, Event, EventDescriptor,
    ExecutionError, Guard, SendError, StateId, StateKind, TransitionKind,
};

#[cfg(feature = "async")]
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
pub use async_interpreter::AsyncInterpreter;
