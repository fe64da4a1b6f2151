//! Exit/entry set computation for microsteps.
//!
//! A microstep applies a selected transition set: states below each
//! transition's scope are exited in reverse document order, transition
//! actions run in document order, and the entry set is entered in document
//! order after expanding compound, parallel and history states. Everything
//! here is pure set computation; the interpreter applies the resulting
//! plan, invoking callbacks in between.

use std::collections::{BTreeSet, VecDeque};

use statecharts_core::{Chart, ChartSettings, StateId, StateKind, TransitionId};
use tracing::trace;

use crate::config::Configuration;

/// Everything a microstep needs before any callback runs. History records
/// are captured while planning, so the entry set already reflects the
/// history of states about to be exited.
#[derive(Debug)]
pub(crate) struct MicrostepPlan {
    /// Effective transitions in document order.
    pub(crate) transitions: Vec<TransitionId>,
    /// Exit set, reverse document order (children before parents).
    pub(crate) exit: Vec<StateId>,
    /// Entry set, document order (parents before children).
    pub(crate) entry: Vec<StateId>,
    /// Active state names before the microstep.
    pub(crate) previous: Vec<String>,
    /// Active state names once the microstep has been applied.
    pub(crate) next: Vec<String>,
}

/// A transition that changes no configuration: targetless, or a
/// self-transition while self-transition entries are disabled.
pub(crate) fn structurally_inert(chart: &Chart, id: TransitionId, settings: &ChartSettings) -> bool {
    let t = chart.transition(id);
    if t.targets.is_empty() {
        return true;
    }
    !settings.enable_self_transition_entries && t.targets == [t.source]
}

/// The transition scope: the source itself for an internal transition whose
/// targets all sit below its compound source, otherwise the least common
/// compound ancestor of source and targets. The synthetic root acts as the
/// outermost scope.
pub(crate) fn transition_scope(chart: &Chart, id: TransitionId) -> StateId {
    let t = chart.transition(id);
    let source = chart.state(t.source);
    if t.kind == statecharts_core::TransitionKind::Internal
        && source.kind == StateKind::Compound
        && t.targets
            .iter()
            .all(|&target| chart.is_descendant(target, t.source))
    {
        return t.source;
    }
    chart
        .ancestors(t.source)
        .find(|&a| {
            (chart.state(a).kind == StateKind::Compound || a == chart.root())
                && t.targets.iter().all(|&target| chart.is_descendant(target, a))
        })
        .unwrap_or(chart.root())
}

/// Active descendants of one transition's scope, unordered.
pub(crate) fn exit_set_of(
    chart: &Chart,
    config: &Configuration,
    id: TransitionId,
    settings: &ChartSettings,
) -> BTreeSet<StateId> {
    if structurally_inert(chart, id, settings) {
        return BTreeSet::new();
    }
    let scope = transition_scope(chart, id);
    config
        .iter()
        .filter(|&s| chart.is_descendant(s, scope))
        .collect()
}

/// Union of the exit sets of `transitions`, reverse document order.
fn exit_set(
    chart: &Chart,
    config: &Configuration,
    transitions: &[TransitionId],
    settings: &ChartSettings,
) -> Vec<StateId> {
    let mut set = BTreeSet::new();
    for &id in transitions {
        set.extend(exit_set_of(chart, config, id, settings));
    }
    set.into_iter().rev().collect()
}

/// Insert `state` and its proper ancestors up to (excluding) `scope`,
/// queueing each new member for expansion.
pub(crate) fn add_with_ancestors(
    chart: &Chart,
    state: StateId,
    scope: StateId,
    set: &mut BTreeSet<StateId>,
    work: &mut VecDeque<StateId>,
) {
    if set.insert(state) {
        work.push_back(state);
    }
    for ancestor in chart.ancestors(state) {
        if ancestor == scope || ancestor == chart.root() {
            break;
        }
        if set.insert(ancestor) {
            work.push_back(ancestor);
        }
    }
}

/// Entry set of `transitions` in document order: the targets with their
/// ancestors below each transition's scope, expanded through compound
/// initials, parallel regions and history records.
fn entry_set(
    chart: &Chart,
    config: &Configuration,
    transitions: &[TransitionId],
    settings: &ChartSettings,
) -> Vec<StateId> {
    let mut set = BTreeSet::new();
    let mut work = VecDeque::new();
    for &id in transitions {
        if structurally_inert(chart, id, settings) {
            continue;
        }
        let scope = transition_scope(chart, id);
        for &target in &chart.transition(id).targets {
            add_with_ancestors(chart, target, scope, &mut set, &mut work);
        }
    }
    expand_entry_set(chart, config, &mut set, &mut work);
    set.into_iter().collect()
}

pub(crate) fn expand_entry_set(
    chart: &Chart,
    config: &Configuration,
    set: &mut BTreeSet<StateId>,
    work: &mut VecDeque<StateId>,
) {
    while let Some(s) = work.pop_front() {
        let state = chart.state(s);
        match state.kind {
            StateKind::Compound => {
                let has_entered_child = state.children.iter().any(|c| set.contains(c));
                if !has_entered_child {
                    if let Some(initial) = state.initial {
                        if set.insert(initial) {
                            work.push_back(initial);
                        }
                    }
                }
            }
            StateKind::Parallel => {
                for &child in &state.children {
                    if chart.state(child).kind.is_history() {
                        continue;
                    }
                    if set.insert(child) {
                        work.push_back(child);
                    }
                }
            }
            StateKind::HistoryShallow | StateKind::HistoryDeep => {
                // Substitute the record (or the default targets) for the
                // pseudo-state; it never stays in the entry set itself.
                set.remove(&s);
                let stop = state.parent.unwrap_or(chart.root());
                let mut targets: Vec<StateId> = match config.stored_history(s) {
                    Some(stored) => stored.to_vec(),
                    None => state.history_defaults.clone(),
                };
                if targets.is_empty() {
                    // No record and no default: fall back to the compound's
                    // ordinary initial entry.
                    targets.extend(chart.state(stop).initial);
                }
                trace!(history = %state.name, ?targets, "resolve history entry");
                for target in targets {
                    add_with_ancestors(chart, target, stop, set, work);
                }
            }
            StateKind::Atomic | StateKind::Final => {}
        }
    }
}

/// Entry set for `start`: the root's initial child expanded to its default
/// descendants.
pub(crate) fn initial_entry_set(chart: &Chart, config: &Configuration) -> Vec<StateId> {
    let mut set = BTreeSet::new();
    let mut work = VecDeque::new();
    if let Some(initial) = chart.state(chart.root()).initial {
        add_with_ancestors(chart, initial, chart.root(), &mut set, &mut work);
    }
    expand_entry_set(chart, config, &mut set, &mut work);
    set.into_iter().collect()
}

/// Compute a microstep plan, recording history for every state about to be
/// exited. The configuration itself is not touched; the interpreter applies
/// exits and entries interleaved with callbacks.
pub(crate) fn plan(
    chart: &Chart,
    config: &mut Configuration,
    transitions: &[TransitionId],
    settings: &ChartSettings,
) -> MicrostepPlan {
    let mut ordered: Vec<TransitionId> = transitions.to_vec();
    ordered.sort_unstable();

    let exit = exit_set(chart, config, &ordered, settings);
    for &s in &exit {
        config.record_history(chart, s);
    }
    let entry = entry_set(chart, config, &ordered, settings);

    let previous = config.names(chart);
    let mut next_ids: BTreeSet<StateId> = config.iter().collect();
    for &s in &exit {
        next_ids.remove(&s);
    }
    next_ids.extend(entry.iter().copied());
    let next = next_ids
        .into_iter()
        .map(|id| chart.state(id).name.clone())
        .collect();

    MicrostepPlan {
        transitions: ordered,
        exit,
        entry,
        previous,
        next,
    }
}

/// Whether `s` counts as "in a final state": a compound with an active
/// final child, or a parallel whose regions all are.
pub(crate) fn in_final(chart: &Chart, config: &Configuration, s: StateId) -> bool {
    let state = chart.state(s);
    match state.kind {
        StateKind::Compound => state
            .children
            .iter()
            .any(|&c| chart.state(c).kind == StateKind::Final && config.contains(c)),
        StateKind::Parallel => state
            .children
            .iter()
            .filter(|&&c| !chart.state(c).kind.is_history())
            .all(|&c| in_final(chart, config, c)),
        _ => false,
    }
}

/// The done events a freshly entered final state gives rise to, as
/// `(completed state, include done_data)` pairs: its compound parent, and
/// its parallel grandparent once every sibling region is final.
pub(crate) fn completions(
    chart: &Chart,
    config: &Configuration,
    entered_final: StateId,
) -> Vec<(StateId, bool)> {
    let mut out = Vec::new();
    let Some(parent) = chart.parent(entered_final) else {
        return out;
    };
    if parent != chart.root() && chart.state(parent).kind == StateKind::Compound {
        out.push((parent, true));
        if let Some(grandparent) = chart.parent(parent) {
            if chart.state(grandparent).kind == StateKind::Parallel
                && in_final(chart, config, grandparent)
            {
                out.push((grandparent, false));
            }
        }
    }
    out
}
