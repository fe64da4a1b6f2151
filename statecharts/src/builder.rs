//! The declarative chart builder.
//!
//! States nest through closures; transitions are declared at the chart
//! level against state names. `build` assigns ids in document order,
//! resolves every name, and validates the result before freezing it into
//! a [`Chart`].
//!
//! ```
//! use statecharts::{ChartBuilder, Guard};
//!
//! let chart = ChartBuilder::new("review_flow")
//!     .state("pending", |s| s.initial())
//!     .state("approved", |s| s.final_state())
//!     .state("rejected", |s| s.final_state())
//!     .transition("pending", |t| {
//!         t.on("review")
//!             .to("approved")
//!             .guard(Guard::new(|ctx| {
//!                 ctx.event_data["score"].as_i64().unwrap_or(0) >= 70
//!             }))
//!     })
//!     .transition("pending", |t| t.on("review").to("rejected"))
//!     .build()
//!     .unwrap();
//! assert_eq!(chart.name, "review_flow");
//! ```

use std::collections::HashMap;

use serde_json::Value;
use statecharts_core::{
    Action, CallbackContext, Chart, ChartSettings, DefinitionError, DoneDataFn, EventDescriptor,
    Guard, State, StateId, StateKind, Transition, TransitionId, TransitionKind,
};

use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecKind {
    Plain,
    Parallel,
    Final,
    HistoryShallow,
    HistoryDeep,
}

struct StateSpec {
    name: String,
    kind: SpecKind,
    children: Vec<StateSpec>,
    marked_initial: bool,
    initial_child: Option<String>,
    on_entry: Vec<Action>,
    on_exit: Vec<Action>,
    done_data: Option<DoneDataFn>,
    history_defaults: Vec<String>,
}

impl StateSpec {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: SpecKind::Plain,
            children: Vec::new(),
            marked_initial: false,
            initial_child: None,
            on_entry: Vec::new(),
            on_exit: Vec::new(),
            done_data: None,
            history_defaults: Vec::new(),
        }
    }
}

struct TransitionSpec {
    source: String,
    events: Vec<String>,
    targets: Vec<String>,
    internal: bool,
    guards: Vec<Guard>,
    unless: Vec<Guard>,
    before: Vec<Action>,
    actions: Vec<Action>,
    after: Vec<Action>,
}

/// Builds one state; handed to the closures of
/// [`ChartBuilder::state`] and [`StateBuilder::state`].
pub struct StateBuilder {
    spec: StateSpec,
}

impl StateBuilder {
    /// Mark this state as its parent's initial child.
    pub fn initial(mut self) -> Self {
        self.spec.marked_initial = true;
        self
    }

    /// Make this state parallel: entering it enters every child region.
    pub fn parallel(mut self) -> Self {
        self.spec.kind = SpecKind::Parallel;
        self
    }

    /// Make this a final state.
    pub fn final_state(mut self) -> Self {
        self.spec.kind = SpecKind::Final;
        self
    }

    /// Declare a child state.
    pub fn state(mut self, name: &str, f: impl FnOnce(StateBuilder) -> StateBuilder) -> Self {
        let child = f(StateBuilder {
            spec: StateSpec::new(name),
        });
        self.spec.children.push(child.spec);
        self
    }

    /// Name the initial child explicitly, as an alternative to marking it
    /// with [`StateBuilder::initial`].
    pub fn initial_child(mut self, name: &str) -> Self {
        self.spec.initial_child = Some(name.to_string());
        self
    }

    /// Declare a shallow history child: on re-entry through it, the
    /// previously active direct child is restored. `defaults` are entered
    /// when no history has been recorded yet.
    pub fn shallow_history(mut self, name: &str, defaults: &[&str]) -> Self {
        let mut spec = StateSpec::new(name);
        spec.kind = SpecKind::HistoryShallow;
        spec.history_defaults = defaults.iter().map(|s| s.to_string()).collect();
        self.spec.children.push(spec);
        self
    }

    /// Declare a deep history child: the previously active leaf set is
    /// restored.
    pub fn deep_history(mut self, name: &str, defaults: &[&str]) -> Self {
        let mut spec = StateSpec::new(name);
        spec.kind = SpecKind::HistoryDeep;
        spec.history_defaults = defaults.iter().map(|s| s.to_string()).collect();
        self.spec.children.push(spec);
        self
    }

    pub fn on_entry(mut self, action: Action) -> Self {
        self.spec.on_entry.push(action);
        self
    }

    pub fn on_exit(mut self, action: Action) -> Self {
        self.spec.on_exit.push(action);
        self
    }

    /// Payload producer for the `done.state.*` event emitted when this
    /// final state completes its parent.
    pub fn done_data(
        mut self,
        f: impl Fn(&CallbackContext) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.spec.done_data = Some(std::sync::Arc::new(f));
        self
    }
}

/// Builds one transition; handed to the closure of
/// [`ChartBuilder::transition`].
pub struct TransitionBuilder {
    spec: TransitionSpec,
}

impl TransitionBuilder {
    /// Add an event descriptor. A transition without any is eventless.
    pub fn on(mut self, descriptor: &str) -> Self {
        self.spec.events.push(descriptor.to_string());
        self
    }

    /// Add a target. Repeat for multi-target transitions into parallel
    /// regions; a transition without targets must be internal.
    pub fn to(mut self, target: &str) -> Self {
        self.spec.targets.push(target.to_string());
        self
    }

    /// Make the transition internal: its compound source stays active when
    /// all targets are descendants of it.
    pub fn internal(mut self) -> Self {
        self.spec.internal = true;
        self
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.spec.guards.push(guard);
        self
    }

    /// Negated guard: the transition is enabled only while this is false.
    pub fn unless(mut self, guard: Guard) -> Self {
        self.spec.unless.push(guard);
        self
    }

    pub fn before(mut self, action: Action) -> Self {
        self.spec.before.push(action);
        self
    }

    /// On-transition action; its return value is collected and handed back
    /// by `send`.
    pub fn action(mut self, action: Action) -> Self {
        self.spec.actions.push(action);
        self
    }

    /// Runs after the entry set has been entered.
    pub fn after(mut self, action: Action) -> Self {
        self.spec.after.push(action);
        self
    }
}

/// Declarative chart front-end. See the module docs for an example.
pub struct ChartBuilder {
    name: String,
    settings: ChartSettings,
    roots: Vec<StateSpec>,
    transitions: Vec<TransitionSpec>,
}

impl ChartBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            settings: ChartSettings::default(),
            roots: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Declare a top-level state. Declaration order is document order.
    pub fn state(mut self, name: &str, f: impl FnOnce(StateBuilder) -> StateBuilder) -> Self {
        let built = f(StateBuilder {
            spec: StateSpec::new(name),
        });
        self.roots.push(built.spec);
        self
    }

    /// Declare a transition from `source`. Declaration order fixes the
    /// document order of transitions sharing a source.
    pub fn transition(
        mut self,
        source: &str,
        f: impl FnOnce(TransitionBuilder) -> TransitionBuilder,
    ) -> Self {
        let built = f(TransitionBuilder {
            spec: TransitionSpec {
                source: source.to_string(),
                events: Vec::new(),
                targets: Vec::new(),
                internal: false,
                guards: Vec::new(),
                unless: Vec::new(),
                before: Vec::new(),
                actions: Vec::new(),
                after: Vec::new(),
            },
        });
        self.transitions.push(built.spec);
        self
    }

    pub fn allow_event_without_transition(mut self, value: bool) -> Self {
        self.settings.allow_event_without_transition = value;
        self
    }

    pub fn enable_self_transition_entries(mut self, value: bool) -> Self {
        self.settings.enable_self_transition_entries = value;
        self
    }

    pub fn atomic_configuration_update(mut self, value: bool) -> Self {
        self.settings.atomic_configuration_update = value;
        self
    }

    pub fn error_on_execution(mut self, value: bool) -> Self {
        self.settings.error_on_execution = value;
        self
    }

    pub fn validate_disconnected_states(mut self, value: bool) -> Self {
        self.settings.validate_disconnected_states = value;
        self
    }

    pub fn strict_states(mut self, value: bool) -> Self {
        self.settings.strict_states = value;
        self
    }

    /// Resolve names, assign document-order ids and validate, freezing the
    /// chart.
    pub fn build(self) -> Result<Chart, DefinitionError> {
        let mut assembler = Assembler {
            states: Vec::new(),
            names: HashMap::new(),
            pending_initial: Vec::new(),
            pending_history: Vec::new(),
        };

        // Synthetic root carrying the top-level states.
        let root = StateId(0);
        assembler.states.push(State {
            name: self.name.clone(),
            kind: StateKind::Compound,
            parent: None,
            children: Vec::new(),
            initial: None,
            on_entry: Vec::new(),
            on_exit: Vec::new(),
            done_data: None,
            transitions: Vec::new(),
            history_defaults: Vec::new(),
        });

        let root_marked: Vec<String> = self
            .roots
            .iter()
            .filter(|s| s.marked_initial)
            .map(|s| s.name.clone())
            .collect();
        assembler.pending_initial.push((root, None, root_marked));
        for child in self.roots {
            let id = assembler.flatten(child, root)?;
            assembler.states[root.index()].children.push(id);
        }
        assembler.resolve_initials()?;
        assembler.resolve_history_defaults()?;

        // Transitions, in declaration order.
        let mut transitions = Vec::new();
        for spec in self.transitions {
            let source = assembler.lookup(&spec.source)?;
            let source_state = &assembler.states[source.index()];
            if source_state.kind == StateKind::Final {
                return Err(DefinitionError::TransitionFromFinal(spec.source));
            }
            if source_state.kind.is_history() {
                return Err(DefinitionError::HistoryAsSource(spec.source));
            }
            let events = spec
                .events
                .iter()
                .map(|d| EventDescriptor::parse(d))
                .collect::<Result<Vec<_>, _>>()?;
            let targets = spec
                .targets
                .iter()
                .map(|t| assembler.lookup(t))
                .collect::<Result<Vec<_>, _>>()?;
            if targets.is_empty() && !spec.internal {
                return Err(DefinitionError::TargetlessExternal(spec.source));
            }
            let id = TransitionId(transitions.len());
            transitions.push(Transition {
                source,
                events,
                guards: spec.guards,
                unless: spec.unless,
                targets,
                kind: if spec.internal {
                    TransitionKind::Internal
                } else {
                    TransitionKind::External
                },
                before: spec.before,
                actions: spec.actions,
                after: spec.after,
            });
            assembler.states[source.index()].transitions.push(id);
        }

        let chart = Chart {
            name: self.name,
            states: assembler.states,
            transitions,
            root,
            settings: self.settings,
        };
        validation::validate(&chart)?;
        Ok(chart)
    }
}

struct Assembler {
    states: Vec<State>,
    names: HashMap<String, StateId>,
    /// `(compound, spec initial info)` collected while flattening; resolved
    /// once all names are known.
    pending_initial: Vec<(StateId, Option<String>, Vec<String>)>,
    /// `(history state, default target names)`.
    pending_history: Vec<(StateId, Vec<String>)>,
}

impl Assembler {
    /// Pre-order flatten, which is what makes id order document order.
    fn flatten(&mut self, spec: StateSpec, parent: StateId) -> Result<StateId, DefinitionError> {
        let id = StateId(self.states.len());
        if self.names.insert(spec.name.clone(), id).is_some() {
            return Err(DefinitionError::DuplicateState(spec.name));
        }
        let kind = match spec.kind {
            SpecKind::Parallel => StateKind::Parallel,
            SpecKind::Final => StateKind::Final,
            SpecKind::HistoryShallow => StateKind::HistoryShallow,
            SpecKind::HistoryDeep => StateKind::HistoryDeep,
            SpecKind::Plain if spec.children.is_empty() => StateKind::Atomic,
            SpecKind::Plain => StateKind::Compound,
        };
        if kind == StateKind::Final && !spec.children.is_empty() {
            return Err(DefinitionError::FinalWithChildren(spec.name));
        }
        self.states.push(State {
            name: spec.name,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            initial: None,
            on_entry: spec.on_entry,
            on_exit: spec.on_exit,
            done_data: spec.done_data,
            transitions: Vec::new(),
            history_defaults: Vec::new(),
        });
        if kind.is_history() {
            self.pending_history.push((id, spec.history_defaults));
        }

        let marked: Vec<String> = spec
            .children
            .iter()
            .filter(|c| c.marked_initial)
            .map(|c| c.name.clone())
            .collect();
        self.pending_initial
            .push((id, spec.initial_child.clone(), marked));

        for child in spec.children {
            let child_id = self.flatten(child, id)?;
            self.states[id.index()].children.push(child_id);
        }
        Ok(id)
    }

    fn lookup(&self, name: &str) -> Result<StateId, DefinitionError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| DefinitionError::UnknownState(name.to_string()))
    }

    /// Fix each compound's initial child: the explicitly named one, the
    /// marked one, or (except for the root) the first non-history child.
    fn resolve_initials(&mut self) -> Result<(), DefinitionError> {
        let pending = std::mem::take(&mut self.pending_initial);
        for (id, named, marked) in pending {
            let state = &self.states[id.index()];
            if state.kind != StateKind::Compound {
                continue;
            }
            let name = state.name.clone();
            let mut candidates: Vec<String> = marked;
            if let Some(named) = named {
                if !candidates.contains(&named) {
                    candidates.push(named);
                }
            }
            if candidates.len() > 1 {
                return Err(DefinitionError::MultipleInitialStates(name));
            }
            let initial = match candidates.into_iter().next() {
                Some(candidate) => {
                    let child = self.lookup(&candidate)?;
                    if self.states[child.index()].parent != Some(id) {
                        return Err(DefinitionError::InitialNotAChild(candidate, name));
                    }
                    if self.states[child.index()].kind.is_history() {
                        return Err(DefinitionError::InitialIsHistory(candidate));
                    }
                    child
                }
                None => {
                    if id == StateId(0) {
                        return Err(DefinitionError::NoInitialState);
                    }
                    let first = self.states[id.index()]
                        .children
                        .iter()
                        .copied()
                        .find(|&c| !self.states[c.index()].kind.is_history());
                    match first {
                        Some(first) => first,
                        None => return Err(DefinitionError::NoInitialState),
                    }
                }
            };
            self.states[id.index()].initial = Some(initial);
        }
        Ok(())
    }

    fn resolve_history_defaults(&mut self) -> Result<(), DefinitionError> {
        let pending = std::mem::take(&mut self.pending_history);
        for (id, defaults) in pending {
            let resolved = defaults
                .iter()
                .map(|d| self.lookup(d))
                .collect::<Result<Vec<_>, _>>()?;
            self.states[id.index()].history_defaults = resolved;
        }
        Ok(())
    }
}
