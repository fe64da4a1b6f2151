//! Error taxonomy.
//!
//! Definition errors are raised once, at chart construction, and are
//! terminal. Runtime errors go to the `send`/`start` caller: rejections
//! ([`SendError::TransitionNotAllowed`], [`SendError::NotStarted`]) never
//! corrupt the configuration, while execution failures follow the chart's
//! `error_on_execution` policy.

use thiserror::Error;

use crate::callback::ExecutionError;

/// Raised while building a chart. Terminal: the chart is not usable.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("chart has no initial state")]
    NoInitialState,

    #[error("state `{0}` declares multiple initial children")]
    MultipleInitialStates(String),

    #[error("duplicate state `{0}`")]
    DuplicateState(String),

    #[error("unknown state `{0}`")]
    UnknownState(String),

    #[error("transition declared from final state `{0}`")]
    TransitionFromFinal(String),

    #[error("state `{0}` is not reachable from the initial configuration")]
    UnreachableState(String),

    #[error("non-final state `{0}` has no outgoing transition")]
    DeadEndState(String),

    #[error("invalid event descriptor `{0}`")]
    InvalidDescriptor(String),

    #[error("history state `{0}` must be declared inside a compound state")]
    HistoryInNonCompound(String),

    #[error("history state `{0}` default target `{1}` is not a descendant of its parent")]
    InvalidHistoryDefault(String, String),

    #[error("final state `{0}` cannot be a direct child of a parallel state")]
    FinalChildOfParallel(String),

    #[error("final state `{0}` cannot have children")]
    FinalWithChildren(String),

    #[error("initial child `{0}` is a history pseudo-state")]
    InitialIsHistory(String),

    #[error("initial child `{0}` is not a child of `{1}`")]
    InitialNotAChild(String, String),

    #[error("targetless transition from `{0}` must be declared internal")]
    TargetlessExternal(String),

    #[error("transition source `{0}` is a history pseudo-state")]
    HistoryAsSource(String),

    #[error("chart `{0}` declares async callbacks; drive it with the async interpreter")]
    AsyncCallbacks(String),
}

/// Raised while driving an interpreter.
#[derive(Debug, Error)]
pub enum SendError {
    /// The event matched no transition and the chart does not tolerate
    /// unknown events. Carries the active configuration at rejection time;
    /// the configuration itself is unchanged.
    #[error("event `{event}` is not allowed in configuration {configuration:?}")]
    TransitionNotAllowed {
        event: String,
        configuration: Vec<String>,
    },

    /// The active configuration was inspected (or an event sent) before the
    /// interpreter entered its initial configuration. Call `start` first.
    #[error("interpreter has not been started; call `start` explicitly")]
    NotStarted,

    /// A host callback failed and the chart runs without
    /// `error_on_execution`, so the failure propagates to the caller.
    #[error("callback failed while handling `{event}`")]
    Execution {
        event: String,
        #[source]
        source: ExecutionError,
    },
}
