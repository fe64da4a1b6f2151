//! Transition selection: the optimally enabled transition set.
//!
//! For each active atomic state the selector walks the state and its
//! ancestors, innermost first, scanning each state's transitions in
//! document order and keeping the first one whose event descriptor matches
//! and whose guards pass. Selections from different parallel regions are
//! then collapsed: a later selection is preempted when its exit set
//! intersects the exit set of an earlier one.

use std::collections::BTreeSet;

use statecharts_core::{Chart, ChartSettings, Event, StateId, TransitionId};
use tracing::trace;

use crate::config::Configuration;
use crate::microstep;

/// The descriptor-matching transitions along `atom`'s ancestor walk, in
/// priority order. Guard evaluation happens at the call site (it differs
/// between the sync and async interpreters); the caller keeps the first
/// candidate whose guards pass.
pub(crate) fn candidates(
    chart: &Chart,
    atom: StateId,
    event: Option<&Event>,
) -> Vec<TransitionId> {
    let mut out = Vec::new();
    for state in std::iter::once(atom).chain(chart.ancestors(atom)) {
        if state == chart.root() {
            break;
        }
        for &id in &chart.state(state).transitions {
            let transition = chart.transition(id);
            let matched = match event {
                Some(event) => transition.matches(&event.name),
                None => transition.is_eventless(),
            };
            if matched {
                out.push(id);
            }
        }
    }
    trace!(atom = %chart.state(atom).name, candidates = out.len(), "selection candidates");
    out
}

/// Collapse per-atom selections to a conflict-free set. Atoms are visited
/// in document order, so when two selections' exit sets intersect the one
/// sourced in the earlier atom wins.
pub(crate) fn remove_conflicting(
    chart: &Chart,
    config: &Configuration,
    settings: &ChartSettings,
    selected: &[TransitionId],
) -> Vec<TransitionId> {
    let mut kept: Vec<TransitionId> = Vec::new();
    let mut kept_exits: Vec<BTreeSet<StateId>> = Vec::new();
    for &id in selected {
        let exits = microstep::exit_set_of(chart, config, id, settings);
        let conflicts = kept_exits
            .iter()
            .any(|earlier| earlier.intersection(&exits).next().is_some());
        if conflicts {
            trace!(transition = id.index(), "transition preempted");
            continue;
        }
        kept.push(id);
        kept_exits.push(exits);
    }
    kept
}
