//! Immutable chart metadata.
//!
//! A [`Chart`] is a tree of [`State`] nodes plus a flat list of
//! [`Transition`]s, both frozen at construction. States are referenced by
//! [`StateId`] — an index into the chart's state table assigned in document
//! order (pre-order), so document-order comparison of two states is integer
//! comparison of their ids. Parent and child relationships are side tables
//! on the nodes rather than owning pointers, which keeps the tree free of
//! reference cycles.
//!
//! Charts are produced by the builder in the `statecharts` crate; the
//! fields here are public so the builder can assemble them, but nothing
//! mutates a chart after `build`.

use crate::callback::{Action, DoneDataFn, Guard};
use crate::event::EventDescriptor;

/// Index of a state in [`Chart::states`], assigned in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a transition in [`Chart::transitions`], assigned in document
/// order of declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionId(pub usize);

impl TransitionId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Atomic,
    Compound,
    Parallel,
    Final,
    HistoryShallow,
    HistoryDeep,
}

impl StateKind {
    /// History pseudo-states carry recorded state but are never part of the
    /// active configuration.
    pub fn is_history(self) -> bool {
        matches!(self, Self::HistoryShallow | Self::HistoryDeep)
    }

    /// Atomic for transition selection: a leaf the selector starts its
    /// ancestor walk from. Final states are leaves too.
    pub fn is_atomic(self) -> bool {
        matches!(self, Self::Atomic | Self::Final)
    }
}

/// Whether a transition exits up to its least common compound ancestor
/// (`External`) or keeps its source active when the targets are descendants
/// of it (`Internal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    External,
    Internal,
}

/// A node of the chart tree.
pub struct State {
    /// Unique name within the chart.
    pub name: String,
    pub kind: StateKind,
    /// `None` only for the synthetic root.
    pub parent: Option<StateId>,
    /// Children in document order.
    pub children: Vec<StateId>,
    /// Initial child of a compound state.
    pub initial: Option<StateId>,
    pub on_entry: Vec<Action>,
    pub on_exit: Vec<Action>,
    /// Payload producer for `done.state.*` when this final state is entered.
    pub done_data: Option<DoneDataFn>,
    /// Transitions originating here, in document order.
    pub transitions: Vec<TransitionId>,
    /// Default targets of a history pseudo-state, used when no history has
    /// been recorded yet.
    pub history_defaults: Vec<StateId>,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("initial", &self.initial)
            .field("on_entry", &self.on_entry)
            .field("on_exit", &self.on_exit)
            .field("done_data", &self.done_data.as_ref().map(|_| "DoneDataFn"))
            .field("transitions", &self.transitions)
            .field("history_defaults", &self.history_defaults)
            .finish()
    }
}

/// An edge of the chart.
#[derive(Debug)]
pub struct Transition {
    pub source: StateId,
    /// Empty means eventless: the transition is considered whenever the
    /// interpreter looks for eventless transitions within a macrostep.
    pub events: Vec<EventDescriptor>,
    pub guards: Vec<Guard>,
    /// Negated guards: the transition is enabled only if none of these hold.
    pub unless: Vec<Guard>,
    /// Ordered targets. Empty only for internal targetless transitions,
    /// which run their actions without changing the configuration.
    pub targets: Vec<StateId>,
    pub kind: TransitionKind,
    pub before: Vec<Action>,
    /// The on-transition group; return values of these are collected and
    /// handed back to the `send` caller.
    pub actions: Vec<Action>,
    pub after: Vec<Action>,
}

impl Transition {
    pub fn is_eventless(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether any descriptor matches the event name.
    pub fn matches(&self, event_name: &str) -> bool {
        self.events.iter().any(|d| d.matches(event_name))
    }
}

/// Design-time configuration attributes, immutable on the chart.
#[derive(Debug, Clone)]
pub struct ChartSettings {
    /// Tolerate events matching no transition instead of raising
    /// `TransitionNotAllowed`.
    pub allow_event_without_transition: bool,
    /// Self-transitions run exit/entry like any other transition; when
    /// disabled they only run their transition actions (legacy mode).
    pub enable_self_transition_entries: bool,
    /// Defer visible configuration mutation until after transition actions,
    /// applying exit and entry as one swap (legacy mode). When disabled the
    /// configuration mutates in SCXML-strict exit-then-action-then-enter
    /// order.
    pub atomic_configuration_update: bool,
    /// Catch callback failures and synthesize `error.execution` instead of
    /// propagating them to the caller.
    pub error_on_execution: bool,
    /// Require every state to be reachable from the initial configuration.
    pub validate_disconnected_states: bool,
    /// Reject charts in which a non-final leaf has no outgoing transition.
    pub strict_states: bool,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            allow_event_without_transition: false,
            enable_self_transition_entries: true,
            atomic_configuration_update: false,
            error_on_execution: false,
            validate_disconnected_states: true,
            strict_states: false,
        }
    }
}

/// The frozen chart: state table, transition table, root and settings.
///
/// The root is synthetic: it holds the top-level states, never appears in
/// the active configuration, and is not a valid transition source or
/// target.
#[derive(Debug)]
pub struct Chart {
    pub name: String,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
    pub root: StateId,
    pub settings: ChartSettings,
}

impl Chart {
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    pub fn transition(&self, id: TransitionId) -> &Transition {
        &self.transitions[id.index()]
    }

    pub fn root(&self) -> StateId {
        self.root
    }

    pub fn settings(&self) -> &ChartSettings {
        &self.settings
    }

    /// Look a state up by name.
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .map(StateId)
    }

    pub fn parent(&self, id: StateId) -> Option<StateId> {
        self.state(id).parent
    }

    /// Proper ancestors of `id`, nearest first, root last.
    pub fn ancestors(&self, id: StateId) -> Ancestors<'_> {
        Ancestors {
            chart: self,
            next: self.parent(id),
        }
    }

    /// Whether `id` is a proper descendant of `ancestor`.
    pub fn is_descendant(&self, id: StateId, ancestor: StateId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Proper descendants of `id` in document order.
    pub fn descendants(&self, id: StateId) -> Vec<StateId> {
        let mut out = Vec::new();
        let mut stack: Vec<StateId> = self.state(id).children.iter().rev().copied().collect();
        while let Some(s) = stack.pop() {
            out.push(s);
            stack.extend(self.state(s).children.iter().rev());
        }
        out
    }

    /// Whether any callback on the chart is asynchronous. The sync
    /// interpreter rejects such charts at construction.
    pub fn has_async_callbacks(&self) -> bool {
        let actions_async = |actions: &[Action]| actions.iter().any(Action::is_async);
        self.states
            .iter()
            .any(|s| actions_async(&s.on_entry) || actions_async(&s.on_exit))
            || self.transitions.iter().any(|t| {
                actions_async(&t.before)
                    || actions_async(&t.actions)
                    || actions_async(&t.after)
                    || t.guards.iter().any(Guard::is_async)
                    || t.unless.iter().any(Guard::is_async)
            })
    }
}

/// Iterator over proper ancestors, nearest first.
pub struct Ancestors<'a> {
    chart: &'a Chart,
    next: Option<StateId>,
}

impl Iterator for Ancestors<'_> {
    type Item = StateId;

    fn next(&mut self) -> Option<StateId> {
        let current = self.next?;
        self.next = self.chart.parent(current);
        Some(current)
    }
}
