//! The active configuration: an ordered set of currently active states.
//!
//! Document order equals id order (ids are assigned pre-order), so a
//! `BTreeSet<StateId>` iterates ancestors before descendants for free.
//! History records live beside the active set because both are the only
//! interpreter state that survives across microsteps.

use std::collections::{BTreeSet, HashMap};

use statecharts_core::{Chart, StateId, StateKind};

#[derive(Debug, Default, Clone)]
pub(crate) struct Configuration {
    active: BTreeSet<StateId>,
    history: HashMap<StateId, Vec<StateId>>,
}

impl Configuration {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(&self, id: StateId) -> bool {
        self.active.contains(&id)
    }

    pub(crate) fn add(&mut self, id: StateId) {
        self.active.insert(id);
    }

    pub(crate) fn remove(&mut self, id: StateId) {
        self.active.remove(&id);
    }

    /// Active states in document order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.active.iter().copied()
    }

    /// Active atomic states in document order. These are the walk roots the
    /// transition selector iterates.
    pub(crate) fn atomic_states(&self, chart: &Chart) -> Vec<StateId> {
        self.iter()
            .filter(|&id| chart.state(id).kind.is_atomic())
            .collect()
    }

    /// Active proper descendants of `id`, document order.
    pub(crate) fn descendants_in_config(&self, chart: &Chart, id: StateId) -> Vec<StateId> {
        self.iter()
            .filter(|&s| chart.is_descendant(s, id))
            .collect()
    }

    /// Record the history of `exiting` into each of its history pseudo-state
    /// children, filtered by depth: a shallow history stores the active
    /// direct children, a deep one the active leaves.
    pub(crate) fn record_history(&mut self, chart: &Chart, exiting: StateId) {
        let state = chart.state(exiting);
        for &h in &state.children {
            let stored: Vec<StateId> = match chart.state(h).kind {
                StateKind::HistoryShallow => state
                    .children
                    .iter()
                    .copied()
                    .filter(|&c| !chart.state(c).kind.is_history() && self.contains(c))
                    .collect(),
                StateKind::HistoryDeep => self
                    .descendants_in_config(chart, exiting)
                    .into_iter()
                    .filter(|&d| chart.state(d).kind.is_atomic())
                    .collect(),
                _ => continue,
            };
            self.history.insert(h, stored);
        }
    }

    pub(crate) fn stored_history(&self, history_state: StateId) -> Option<&[StateId]> {
        self.history.get(&history_state).map(Vec::as_slice)
    }

    pub(crate) fn restore_history(&mut self, history_state: StateId, stored: Vec<StateId>) {
        self.history.insert(history_state, stored);
    }

    pub(crate) fn history_entries(&self) -> impl Iterator<Item = (StateId, &[StateId])> {
        self.history.iter().map(|(&h, v)| (h, v.as_slice()))
    }

    /// Active state names in document order, for host-facing reporting.
    pub(crate) fn names(&self, chart: &Chart) -> Vec<String> {
        self.iter().map(|id| chart.state(id).name.clone()).collect()
    }
}
