//! The asynchronous interpreter variant.
//!
//! Same selection and microstep logic as the synchronous interpreter; the
//! difference is that host callbacks may be asynchronous (they are awaited
//! in place) and that [`AsyncInterpreter::run_until_terminated`] really
//! waits for delayed events instead of returning when nothing is due.
//! Because construction cannot enter the initial configuration, `start`
//! must be called explicitly before driving or inspecting the instance.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use statecharts_core::{
    Action, CallbackContext, Chart, ChartSettings, DefinitionError, Event, EventEmitter,
    ExecutionError, Guard, SendError, StateId, StateKind, Transition, TransitionId,
};
use tracing::debug;

use crate::config::Configuration;
use crate::dispatch;
use crate::interpreter::Snapshot;
use crate::listener::{Listener, ListenerId};
use crate::microstep;
use crate::queue::EventQueue;
use crate::select;

async fn invoke_action(action: &Action, ctx: &CallbackContext) -> Result<Value, ExecutionError> {
    match action {
        Action::Sync(f) => f(ctx),
        Action::Raise(event_name) => {
            ctx.raise(Event::new(event_name.clone()));
            Ok(Value::Null)
        }
        Action::Async(f) => f(ctx.clone()).await,
    }
}

async fn eval_guard(guard: &Guard, ctx: &CallbackContext) -> bool {
    match guard {
        Guard::Sync(f) => f(ctx),
        Guard::Async(f) => f(ctx.clone()).await,
    }
}

async fn guards_pass(transition: &Transition, ctx: &CallbackContext) -> bool {
    for guard in &transition.guards {
        if !eval_guard(guard, ctx).await {
            return false;
        }
    }
    for guard in &transition.unless {
        if eval_guard(guard, ctx).await {
            return false;
        }
    }
    true
}

async fn run_actions(
    settings: &ChartSettings,
    actions: &[Action],
    ctx: &CallbackContext,
    event: Option<&Event>,
    mut collect: Option<&mut Vec<Value>>,
) -> Result<(), SendError> {
    for action in actions {
        match invoke_action(action, ctx).await {
            Ok(value) => {
                if let Some(values) = collect.as_deref_mut() {
                    values.push(value);
                }
            }
            Err(failure) => {
                dispatch::absorb_failure(settings, event, failure, ctx)?;
                break;
            }
        }
    }
    Ok(())
}

/// Executes one chart cooperatively. The public surface mirrors
/// [`Interpreter`](crate::Interpreter) with `async fn`s.
pub struct AsyncInterpreter {
    chart: Arc<Chart>,
    config: Configuration,
    queue: EventQueue,
    listeners: Vec<(ListenerId, Box<dyn Listener>)>,
    next_listener: u64,
    started: bool,
    processing: bool,
}

impl AsyncInterpreter {
    /// Wrap a chart for cooperative execution. Both sync and async
    /// callbacks are accepted.
    pub fn new(chart: impl Into<Arc<Chart>>) -> Result<Self, DefinitionError> {
        Ok(Self {
            chart: chart.into(),
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

    /// Enter the initial configuration and run to quiescence. Required
    /// before `send`; idempotent afterwards.
    pub async fn start(&mut self) -> Result<(), SendError> {
        if self.started {
            return Ok(());
        }
        debug!(chart = %self.chart.name, "starting async interpreter");
        self.started = true;
        self.processing = true;
        let result = match self.enter_initial().await {
            Ok(()) => self.drive(None).await.map(|_| ()),
            Err(err) => Err(err),
        };
        self.processing = false;
        result
    }

    /// Send an external event and drain to quiescence, returning the
    /// on-transition values of the transitions fired in direct response.
    pub async fn send(&mut self, event: impl Into<Event>) -> Result<Vec<Value>, SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        let seq = self.queue.push_external(event.into());
        if self.processing {
            return Ok(Vec::new());
        }
        self.run_to_quiescence(Some(seq)).await
    }

    pub async fn send_delayed(
        &mut self,
        event: impl Into<Event>,
        delay: Duration,
        cancel_id: Option<&str>,
    ) -> Result<(), SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        self.queue
            .schedule(event.into(), Instant::now() + delay, cancel_id.map(String::from));
        if !self.processing {
            self.run_to_quiescence(None).await?;
        }
        Ok(())
    }

    pub fn cancel(&mut self, cancel_id: &str) -> bool {
        self.queue.cancel(cancel_id)
    }

    pub async fn raise_internal(&mut self, event: impl Into<Event>) -> Result<(), SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        self.queue.push_internal(event.into());
        if !self.processing {
            self.run_to_quiescence(None).await?;
        }
        Ok(())
    }

    /// Drive until the chart terminates, sleeping until delayed events
    /// come due. Returns immediately if no event could ever arrive.
    pub async fn run_until_terminated(&mut self) -> Result<(), SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        loop {
            self.run_to_quiescence(None).await?;
            if self.is_terminated() {
                return Ok(());
            }
            let Some(due) = self.queue.next_due() else {
                return Ok(());
            };
            tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await;
        }
    }

    pub fn configuration(&self) -> Result<Vec<String>, SendError> {
        if !self.started {
            return Err(SendError::NotStarted);
        }
        Ok(self.config.names(&self.chart))
    }

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
                .collect::<BTreeMap<_, _>>(),
        })
    }

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

    async fn run_to_quiescence(
        &mut self,
        collect_seq: Option<u64>,
    ) -> Result<Vec<Value>, SendError> {
        self.processing = true;
        let result = self.drive(collect_seq).await;
        self.processing = false;
        result
    }

    async fn drive(&mut self, collect_seq: Option<u64>) -> Result<Vec<Value>, SendError> {
        let chart = Arc::clone(&self.chart);
        let mut collected = Vec::new();
        loop {
            loop {
                if self.is_terminated() {
                    return Ok(collected);
                }
                if let Some(event) = self.queue.pop_internal() {
                    self.notify_event(&event);
                    let enabled = self.select_enabled(Some(&event)).await;
                    if !enabled.is_empty() {
                        self.microstep(&enabled, Some(&event)).await?;
                    }
                } else {
                    let enabled = self.select_enabled(None).await;
                    if enabled.is_empty() {
                        break;
                    }
                    self.microstep(&enabled, None).await?;
                }
            }
            if self.is_terminated() {
                return Ok(collected);
            }
            let Some((seq, event)) = self.queue.pop_external(Instant::now()) else {
                return Ok(collected);
            };
            self.notify_event(&event);
            let enabled = self.select_enabled(Some(&event)).await;
            if enabled.is_empty() {
                if !chart.settings.allow_event_without_transition {
                    return Err(SendError::TransitionNotAllowed {
                        event: event.name,
                        configuration: self.config.names(&chart),
                    });
                }
                debug!(event = %event.name, "no transition enabled; event tolerated");
            } else {
                let values = self.microstep(&enabled, Some(&event)).await?;
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

    async fn select_enabled(&mut self, event: Option<&Event>) -> Vec<TransitionId> {
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
                if guards_pass(transition, &ctx).await {
                    selected.push(id);
                    break;
                }
            }
        }
        let enabled = select::remove_conflicting(&chart, &self.config, chart.settings(), &selected);
        self.flush(&emitter);
        enabled
    }

    async fn microstep(
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

        for &s in &plan.exit {
            let state = chart.state(s);
            let mut ctx = base.clone();
            ctx.state = Some(state.name.clone());
            for action in &state.on_exit {
                if let Err(failure) = invoke_action(action, &ctx).await {
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

        let mut on_values = Vec::new();
        for &id in &plan.transitions {
            let transition = chart.transition(id);
            let mut ctx = base.clone();
            ctx.source = Some(chart.state(transition.source).name.clone());
            ctx.target = transition
                .targets
                .first()
                .map(|&target| chart.state(target).name.clone());
            run_actions(&settings, &transition.before, &ctx, event, None).await?;
            run_actions(&settings, &transition.actions, &ctx, event, Some(&mut on_values)).await?;
            for (_, listener) in &mut self.listeners {
                listener.on_transition(&ctx);
            }
        }

        if legacy {
            for &s in &plan.exit {
                self.config.remove(s);
            }
        }

        self.apply_entries(&chart, &settings, &base, &plan.entry, event)
            .await?;

        for &id in &plan.transitions {
            let transition = chart.transition(id);
            let mut ctx = base.clone();
            ctx.source = Some(chart.state(transition.source).name.clone());
            ctx.target = transition
                .targets
                .first()
                .map(|&target| chart.state(target).name.clone());
            run_actions(&settings, &transition.after, &ctx, event, None).await?;
        }

        self.flush(&emitter);
        Ok(on_values)
    }

    async fn apply_entries(
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
            run_actions(settings, &state.on_entry, &ctx, event, None).await?;
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

    async fn enter_initial(&mut self) -> Result<(), SendError> {
        let chart = Arc::clone(&self.chart);
        let settings = chart.settings().clone();
        let emitter = EventEmitter::new();
        let entry = microstep::initial_entry_set(&chart, &self.config);
        let next: Vec<String> = entry
            .iter()
            .map(|&s| chart.state(s).name.clone())
            .collect();
        let base = dispatch::base_context(None, &emitter, &[], &next);
        self.apply_entries(&chart, &settings, &base, &entry, None)
            .await?;
        self.flush(&emitter);
        Ok(())
    }

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

impl std::fmt::Debug for AsyncInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncInterpreter")
            .field("chart", &self.chart.name)
            .field("configuration", &self.config)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}
