//! Chart validation, run once by the builder before the chart freezes.
//!
//! Structural resolution errors (unknown names, duplicate states, bad
//! descriptors) are raised earlier, while the builder resolves names; this
//! module checks the properties that need the whole tree: history
//! placement, parallel/final constraints, reachability and (under
//! `strict_states`) dead ends.

use std::collections::{BTreeSet, VecDeque};

use statecharts_core::{Chart, DefinitionError, StateId, StateKind};

use crate::config::Configuration;
use crate::microstep;

pub(crate) fn validate(chart: &Chart) -> Result<(), DefinitionError> {
    for state in &chart.states {
        let Some(parent) = state.parent else {
            continue;
        };
        let parent_kind = chart.state(parent).kind;
        match state.kind {
            StateKind::HistoryShallow | StateKind::HistoryDeep => {
                if parent_kind != StateKind::Compound {
                    return Err(DefinitionError::HistoryInNonCompound(state.name.clone()));
                }
                for &default in &state.history_defaults {
                    if !chart.is_descendant(default, parent) {
                        return Err(DefinitionError::InvalidHistoryDefault(
                            state.name.clone(),
                            chart.state(default).name.clone(),
                        ));
                    }
                }
            }
            StateKind::Final => {
                if parent_kind == StateKind::Parallel {
                    return Err(DefinitionError::FinalChildOfParallel(state.name.clone()));
                }
            }
            _ => {}
        }
    }

    if chart.settings.validate_disconnected_states {
        check_reachability(chart)?;
    }
    if chart.settings.strict_states {
        check_dead_ends(chart)?;
    }
    Ok(())
}

/// Default-entry closure of `seed`: the states that become active when a
/// transition targets it, ignoring recorded history (none exists at
/// definition time).
fn entry_closure(chart: &Chart, seed: StateId) -> BTreeSet<StateId> {
    let mut set = BTreeSet::new();
    let mut work = VecDeque::new();
    microstep::add_with_ancestors(chart, seed, chart.root(), &mut set, &mut work);
    microstep::expand_entry_set(chart, &Configuration::new(), &mut set, &mut work);
    set
}

/// Every state must be activatable: part of the initial configuration's
/// closure, or the target (directly or through default entry) of a
/// transition whose source is itself reachable.
fn check_reachability(chart: &Chart) -> Result<(), DefinitionError> {
    let empty = Configuration::new();
    let mut reachable: BTreeSet<StateId> =
        microstep::initial_entry_set(chart, &empty).into_iter().collect();
    loop {
        let mut grew = false;
        for transition in &chart.transitions {
            if !reachable.contains(&transition.source) {
                continue;
            }
            for &target in &transition.targets {
                if !reachable.contains(&target) {
                    reachable.extend(entry_closure(chart, target));
                    grew = true;
                }
            }
        }
        if !grew {
            break;
        }
    }
    for (index, state) in chart.states.iter().enumerate() {
        let id = StateId(index);
        if id == chart.root() || state.kind.is_history() {
            continue;
        }
        if !reachable.contains(&id) {
            return Err(DefinitionError::UnreachableState(state.name.clone()));
        }
    }
    Ok(())
}

/// Under `strict_states`, every non-final leaf must be able to leave: some
/// transition on itself or an ancestor.
fn check_dead_ends(chart: &Chart) -> Result<(), DefinitionError> {
    for (index, state) in chart.states.iter().enumerate() {
        let id = StateId(index);
        if state.kind != StateKind::Atomic {
            continue;
        }
        let has_outgoing = !state.transitions.is_empty()
            || chart
                .ancestors(id)
                .any(|a| !chart.state(a).transitions.is_empty());
        if !has_outgoing {
            return Err(DefinitionError::DeadEndState(state.name.clone()));
        }
    }
    Ok(())
}
