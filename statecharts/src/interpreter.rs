//! The synchronous interpreter: macrostep loop and public facade.
//!
//! Events are processed under run-to-completion semantics: a macrostep
//! drains the internal queue (taking eventless transitions whenever no
//! internal event is pending), then pulls one external event, until both
//! queues are quiet or the chart terminates. Callbacks that enqueue
//! further events never recurse into the loop; the outermost caller
//! drives everything to quiescence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use statecharts_core::{
    CallbackContext, Chart, ChartSettings, DefinitionError, Event, EventEmitter, SendError,
    StateId, StateKind, TransitionId,
};
use tracing::debug;

use crate::config::Configuration;
use crate::dispatch;
use crate::listener::{Listener, ListenerId};
use crate::microstep;
use crate::queue::EventQueue;
use crate::select;

/// Serializable interpreter state: active configuration and history
/// records, both by state name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub configuration: Vec<String>,
    pub history: BTreeMap<String, Vec<String>>,
}

/// Executes one chart, synchronously.
///
/// The chart metadata is immutable and may be shared between interpreter
/// instances; each instance owns its configuration and queues. Driving an
/// instance requires `&mut self`, which is also what rules out concurrent
/// macrosteps on it.
pub struct Interpreter {
    chart: Arc<Chart>,
    config: Configuration,
    queue: EventQueue,
    listeners: Vec<(ListenerId, Box<dyn Listener>)>,
    next_listener: u64,
    started: bool,
    processing: bool,
}

impl Interpreter {
    /// Wrap a chart for synchronous execution. Charts declaring async
    /// callbacks are rejected here; drive those with the async interpreter.
    pub fn new(chart: impl Into<Arc<Chart>>) -> Result<Self, DefinitionError> {
        let chart = chart.into();
        if chart.has_async_callbacks() {
            return Err(DefinitionError::AsyncCallbacks(chart.name.clone()));
        }
        Ok(Self {
            chart,
            config: Configuration::new(),
            queue: EventQueue::new(),
            listeners: Vec::new(),
            next_listener: 0,
            started: false,
            processing: false,
        })
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    /// Enter the initial configuration and run to quiescence. Idempotent;
    /// `send` calls it implicitly, so an explicit call is only needed when
    /// the initial entry itself should be observed first.
    pub fn start(&mut self) -> Result<(), SendError> {
        if self.started {
            return Ok(());
        }
        debug!(chart = %self.chart.name, "starting interpreter");
        self.started = true;
        self.processing = true;
        let result = self
            .enter_initial()
            .and_then(|_| self.drive(None).map(|_| ()));
        self.processing = false;
        result
    }

    /// Send an external event and drain to quiescence.
    ///
    /// Returns the values returned by the on-transition callbacks of the
    /// transitions fired in direct response to this event. If a macrostep
    /// is already in progress (a listener re-entered the facade), the event
    /// is enqueued and an empty list returned; the outermost caller picks
    /// it up.
    pub fn send(&mut self, event: impl Into<Event>) -> Result<Vec<Value>, SendError> {
        self.start()?;
        let seq = self.queue.push_external(event.into());
        if self.processing {
            return Ok(Vec::new());
        }
        self.run_to_quiescence(Some(seq))
    }

    /// Schedule an external event `delay` from now. The event fires on
    /// whichever drive pulls the external queue once it is due; an optional
    /// `cancel_id` makes it cancellable until then.
    pub fn send_delayed(
        &mut self,
        event: impl Into<Event>,
        delay: Duration,
        cancel_id: Option<&str>,
    ) -> Result<(), SendError> {
        self.start()?;
        self.queue
            .schedule(event.into(), Instant::now() + delay, cancel_id.map(String::from));
        if !self.processing {
            self.run_to_quiescence(None)?;
        }
        Ok(())
    }

    /// Cancel an unfired delayed event. Returns false if it already fired
    /// or was never scheduled.
    pub fn cancel(&mut self, cancel_id: &str) -> bool {
        self.queue.cancel(cancel_id)
    }

    /// Enqueue an event on the internal queue, as if an action had raised
    /// it, and drain to quiescence.
    pub fn raise_internal(&mut self, event: impl Into<Event>) -> Result<(), SendError> {
        self.start()?;
        self.queue.push_internal(event.into());
        if !self.processing {
            self.run_to_quiescence(None)?;
        }
        Ok(())
    }

    /// Active state names in document order.
    pub fn configuration(&self) -> Result<Vec<String>, SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        Ok(self.config.names(&self.chart))
    }

    /// Whether a top-level final state has been entered.
    pub fn is_terminated(&self) -> bool {
        self.started
            && self
                .chart
                .state(self.chart.root())
                .children
                .iter()
                .any(|&c| {
                    self.chart.state(c).kind == StateKind::Final && self.config.contains(c)
                })
    }

    /// Event names some transition from the current configuration declares.
    /// Guards are not evaluated; this is structural.
    pub fn allowed_events(&self) -> Result<Vec<String>, SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for s in self.config.iter() {
            for &id in &self.chart.state(s).transitions {
                for descriptor in &self.chart.transition(id).events {
                    let descriptor = descriptor.to_string();
                    if seen.insert(descriptor.clone()) {
                        out.push(descriptor);
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn add_listener(&mut self, listener: Box<dyn Listener>) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Capture `{configuration, history}` by state name.
    pub fn snapshot(&self) -> Result<Snapshot, SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        let name_of = |id: StateId| self.chart.state(id).name.clone();
        Ok(Snapshot {
            configuration: self.config.names(&self.chart),
            history: self
                .config
                .history_entries()
                .map(|(h, stored)| (name_of(h), stored.iter().copied().map(name_of).collect()))
                .collect(),
        })
    }

    /// Rebuild an interpreter from a snapshot taken against the same chart.
    pub fn restore(
        chart: impl Into<Arc<Chart>>,
        snapshot: &Snapshot,
    ) -> Result<Self, DefinitionError> {
        let mut interpreter = Self::new(chart)?;
        let chart = Arc::clone(&interpreter.chart);
        let resolve = |name: &String| {
            chart
                .state_id(name)
                .ok_or_else(|| DefinitionError::UnknownState(name.clone()))
        };
        for name in &snapshot.configuration {
            let id = resolve(name)?;
            interpreter.config.add(id);
        }
        for (history, stored) in &snapshot.history {
            let id = resolve(history)?;
            let stored = stored.iter().map(resolve).collect::<Result<Vec<_>, _>>()?;
            interpreter.config.restore_history(id, stored);
        }
        interpreter.started = true;
        Ok(interpreter)
    }

    fn run_to_quiescence(&mut self, collect_seq: Option<u64>) -> Result<Vec<Value>, SendError> {
        self.processing = true;
        let result = self.drive(collect_seq);
        self.processing = false;
        result
    }

    /// The RTC loop: drain internal events and eventless transitions, then
    /// pull one due external event, until nothing is left or the chart
    /// terminates.
    fn drive(&mut self, collect_seq: Option<u64>) -> Result<Vec<Value>, SendError> {
        let chart = Arc::clone(&self.chart);
        let mut collected = Vec::new();
        loop {
            loop {
                if self.is_terminated() {
                    return Ok(collected);
                }
                if let Some(event) = self.queue.pop_internal() {
                    self.notify_event(&event);
                    let enabled = self.select_enabled(Some(&event));
                    // Internal events matching nothing are always tolerated.
                    if !enabled.is_empty() {
                        self.microstep(&enabled, Some(&event))?;
                    }
                } else {
                    let enabled = self.select_enabled(None);
                    if enabled.is_empty() {
                        break;
                    }
                    self.microstep(&enabled, None)?;
                }
            }
            if self.is_terminated() {
                return Ok(collected);
            }
            let Some((seq, event)) = self.queue.pop_external(Instant::now()) else {
                return Ok(collected);
            };
            self.notify_event(&event);
            let enabled = self.select_enabled(Some(&event));
            if enabled.is_empty() {
                if !chart.settings.allow_event_without_transition {
                    return Err(SendError::TransitionNotAllowed {
                        event: event.name,
                        configuration: self.config.names(&chart),
                    });
                }
                debug!(event = %event.name, "no transition enabled; event tolerated");
            } else {
                let values = self.microstep(&enabled, Some(&event))?;
                if collect_seq == Some(seq) {
                    collected.extend(values);
                }
            }
        }
    }

    fn notify_event(&mut self, event: &Event) {
        for (_, listener) in &mut self.listeners {
            listener.on_event(event);
        }
    }

    /// One selection pass: per active atom, the first candidate whose
    /// guards pass; then preemption across parallel regions.
    fn select_enabled(&mut self, event: Option<&Event>) -> Vec<TransitionId> {
        let chart = Arc::clone(&self.chart);
        let emitter = EventEmitter::new();
        let current = self.config.names(&chart);
        let mut selected: Vec<TransitionId> = Vec::new();
        for atom in self.config.atomic_states(&chart) {
            for id in select::candidates(&chart, atom, event) {
                if selected.contains(&id) {
                    break;
                }
                let transition = chart.transition(id);
                let mut ctx = dispatch::base_context(event, &emitter, &current, &[]);
                ctx.source = Some(chart.state(transition.source).name.clone());
                ctx.target = transition
                    .targets
                    .first()
                    .map(|&target| chart.state(target).name.clone());
                if dispatch::guards_pass(transition, &ctx) {
                    selected.push(id);
                    break;
                }
            }
        }
        let enabled = select::remove_conflicting(&chart, &self.config, chart.settings(), &selected);
        self.flush(&emitter);
        enabled
    }

    /// Apply one microstep: exits (reverse document order), transition
    /// actions (document order), entries (document order), done events.
    /// Returns the collected on-transition values.
    fn microstep(
        &mut self,
        enabled: &[TransitionId],
        event: Option<&Event>,
    ) -> Result<Vec<Value>, SendError> {
        let chart = Arc::clone(&self.chart);
        let settings = chart.settings().clone();
        let emitter = EventEmitter::new();
        let plan = microstep::plan(&chart, &mut self.config, enabled, &settings);
        debug!(
            event = event.map(|e| e.name.as_str()).unwrap_or("<eventless>"),
            exits = plan.exit.len(),
            entries = plan.entry.len(),
            "microstep"
        );
        let base = dispatch::base_context(event, &emitter, &plan.previous, &plan.next);
        let legacy = settings.atomic_configuration_update;

        // Step 1: exits. History was recorded while planning. Failures in
        // exit actions are never caught, whatever the error policy.
        for &s in &plan.exit {
            let state = chart.state(s);
            let mut ctx = base.clone();
            ctx.state = Some(state.name.clone());
            for action in &state.on_exit {
                if let Err(failure) = dispatch::invoke_action(action, &ctx) {
                    return Err(SendError::Execution {
                        event: ctx.event.clone(),
                        source: failure,
                    });
                }
            }
            for (_, listener) in &mut self.listeners {
                listener.on_exit(&state.name, &ctx);
            }
            if !legacy {
                self.config.remove(s);
            }
        }

        // Step 2: transition actions, before group first.
        let mut on_values = Vec::new();
        for &id in &plan.transitions {
            let transition = chart.transition(id);
            let mut ctx = base.clone();
            ctx.source = Some(chart.state(transition.source).name.clone());
            ctx.target = transition
                .targets
                .first()
                .map(|&target| chart.state(target).name.clone());
            dispatch::run_actions(&settings, &transition.before, &ctx, event, None)?;
            dispatch::run_actions(&settings, &transition.actions, &ctx, event, Some(&mut on_values))?;
            for (_, listener) in &mut self.listeners {
                listener.on_transition(&ctx);
            }
        }

        // In legacy mode the configuration changes as one swap, only now.
        if legacy {
            for &s in &plan.exit {
                self.config.remove(s);
            }
        }

        // Step 3: entries, plus done events for entered final states.
        self.apply_entries(&chart, &settings, &base, &plan.entry, event)?;

        // After groups run once the new configuration is in place.
        for &id in &plan.transitions {
            let transition = chart.transition(id);
            let mut ctx = base.clone();
            ctx.source = Some(chart.state(transition.source).name.clone());
            ctx.target = transition
                .targets
                .first()
                .map(|&target| chart.state(target).name.clone());
            dispatch::run_actions(&settings, &transition.after, &ctx, event, None)?;
        }

        self.flush(&emitter);
        Ok(on_values)
    }

    fn apply_entries(
        &mut self,
        chart: &Chart,
        settings: &ChartSettings,
        base: &CallbackContext,
        entry: &[StateId],
        event: Option<&Event>,
    ) -> Result<(), SendError> {
        let legacy = settings.atomic_configuration_update;
        if legacy {
            for &s in entry {
                self.config.add(s);
            }
        }
        for &s in entry {
            if !legacy {
                self.config.add(s);
            }
            let state = chart.state(s);
            let mut ctx = base.clone();
            ctx.state = Some(state.name.clone());
            dispatch::run_actions(settings, &state.on_entry, &ctx, event, None)?;
            for (_, listener) in &mut self.listeners {
                listener.on_entry(&state.name, &ctx);
            }
        }
        for &s in entry {
            if chart.state(s).kind != StateKind::Final {
                continue;
            }
            for (completed, with_data) in microstep::completions(chart, &self.config, s) {
                let data = if with_data {
                    match &chart.state(s).done_data {
                        Some(done_data) => {
                            let mut ctx = base.clone();
                            ctx.state = Some(chart.state(s).name.clone());
                            done_data(&ctx)
                        }
                        None => Value::Null,
                    }
                } else {
                    Value::Null
                };
                let done = Event::done_state(&chart.state(completed).name, data);
                debug!(event = %done.name, "state completed");
                base.raise(done);
            }
        }
        Ok(())
    }

    /// Entry of the initial configuration, driven by a synthetic
    /// `__initial__` transition.
    fn enter_initial(&mut self) -> Result<(), SendError> {
        let chart = Arc::clone(&self.chart);
        let settings = chart.settings().clone();
        let emitter = EventEmitter::new();
        let entry = microstep::initial_entry_set(&chart, &self.config);
        let next: Vec<String> = entry
            .iter()
            .map(|&s| chart.state(s).name.clone())
            .collect();
        let base = dispatch::base_context(None, &emitter, &[], &next);
        self.apply_entries(&chart, &settings, &base, &entry, None)?;
        self.flush(&emitter);
        Ok(())
    }

    /// Move events buffered during a microstep onto the real queues.
    fn flush(&mut self, emitter: &EventEmitter) {
        let (internal, external) = emitter.drain();
        for event in internal {
            self.queue.push_internal(event);
        }
        for event in external {
            self.queue.push_external(event);
        }
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("chart", &self.chart.name)
            .field("configuration", &self.config)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}
