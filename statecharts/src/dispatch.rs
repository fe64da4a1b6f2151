//! Callback dispatch and the error-event channel.
//!
//! Callbacks run with a [`CallbackContext`] carrying the well-known
//! argument set. Failures are either propagated to the `send`/`start`
//! caller or converted into an `error.execution` internal event, per the
//! chart's `error_on_execution` setting; a failure raised while the
//! `error.execution` event itself is being handled is logged and dropped
//! to prevent infinite loops.

use serde_json::Value;
use statecharts_core::{
    Action, CallbackContext, ChartSettings, ERROR_EXECUTION, Event, EventEmitter, ExecutionError,
    Guard, INITIAL_EVENT, SendError, Transition,
};
use tracing::{debug, error};

/// Base context for one microstep: event fields filled in, configuration
/// views attached. Per-callback fields (`source`, `target`, `state`) are
/// cloned on top of this by the interpreter.
pub(crate) fn base_context(
    event: Option<&Event>,
    emitter: &EventEmitter,
    previous: &[String],
    next: &[String],
) -> CallbackContext {
    let (name, data) = match event {
        Some(event) => (event.name.clone(), event.data.clone()),
        None => (INITIAL_EVENT.to_string(), Value::Null),
    };
    let mut ctx = CallbackContext::new(name, data, emitter.clone());
    ctx.previous_configuration = previous.to_vec();
    ctx.new_configuration = next.to_vec();
    if ctx.event == ERROR_EXECUTION {
        ctx.error = Some(ctx.event_data.get("error").cloned().unwrap_or(Value::Null));
    }
    ctx
}

/// Invoke one action synchronously. `Raise` variants enqueue their event on
/// the context's internal channel and return `Null`.
pub(crate) fn invoke_action(
    action: &Action,
    ctx: &CallbackContext,
) -> Result<Value, ExecutionError> {
    match action {
        Action::Sync(f) => f(ctx),
        Action::Raise(event_name) => {
            ctx.raise(Event::new(event_name.clone()));
            Ok(Value::Null)
        }
        // Ruled out when the sync interpreter is constructed.
        Action::Async(_) => Err("async action invoked from the sync interpreter".into()),
    }
}

/// All guards hold and no `unless` guard does.
pub(crate) fn guards_pass(transition: &Transition, ctx: &CallbackContext) -> bool {
    let eval = |guard: &Guard| match guard {
        Guard::Sync(f) => f(ctx),
        Guard::Async(_) => false,
    };
    transition.guards.iter().all(eval) && !transition.unless.iter().any(eval)
}

/// Apply the failure policy to a caught callback error.
///
/// Returns `Err` when the chart propagates execution errors; otherwise the
/// failure becomes exactly one `error.execution` internal event — or, when
/// the failing callback was already handling `error.execution`, nothing.
pub(crate) fn absorb_failure(
    settings: &ChartSettings,
    event: Option<&Event>,
    failure: ExecutionError,
    ctx: &CallbackContext,
) -> Result<(), SendError> {
    let event_name = event.map_or(INITIAL_EVENT, |e| e.name.as_str());
    if !settings.error_on_execution {
        return Err(SendError::Execution {
            event: event_name.to_string(),
            source: failure,
        });
    }
    if event_name == ERROR_EXECUTION {
        error!(%failure, "dropping failure raised while handling error.execution");
        return Ok(());
    }
    debug!(%failure, event = event_name, "converting callback failure to error.execution");
    let event_id = event.and_then(|e| e.id.as_deref());
    ctx.raise(Event::error_execution(&failure.to_string(), event_id));
    Ok(())
}

/// Run an action list in order, collecting return values (`Null`
/// preserved). A caught failure skips the rest of the list; whether it is
/// caught at all follows [`absorb_failure`].
pub(crate) fn run_actions(
    settings: &ChartSettings,
    actions: &[Action],
    ctx: &CallbackContext,
    event: Option<&Event>,
    mut collect: Option<&mut Vec<Value>>,
) -> Result<(), SendError> {
    for action in actions {
        match invoke_action(action, ctx) {
            Ok(value) => {
                if let Some(values) = collect.as_deref_mut() {
                    values.push(value);
                }
            }
            Err(failure) => {
                absorb_failure(settings, event, failure, ctx)?;
                break;
            }
        }
    }
    Ok(())
}
