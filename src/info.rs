//! Read-only reflection over a configured machine, returned by
//! `StateMachine::info`. Useful for diagnostics, visualisation, or simply
//! asserting on how a machine ended up configured in a test.

use crate::engine::Representations;
use std::fmt::Debug;
use std::hash::Hash;

/// A snapshot of one configured state: its position in the hierarchy and
/// the triggers it accepts.
#[derive(Debug, Clone)]
pub struct StateInfo<S, T> {
    pub state: S,
    pub superstate: Option<S>,
    pub substates: Vec<S>,
    pub is_active: bool,
    pub has_initial_transition: bool,
    /// Statically-known destinations for each trigger registered directly
    /// on this state. A `Dynamic` behaviour contributes no entry here,
    /// since its destination depends on the arguments of a concrete fire.
    pub fixed_trigger_destinations: Vec<(T, Vec<S>)>,
}

/// A snapshot of every configured state in a machine.
#[derive(Debug, Clone)]
pub struct MachineInfo<S, T> {
    pub states: Vec<StateInfo<S, T>>,
}

impl<S: Clone + Eq + Hash + Debug, T: Clone + Eq + Hash + Debug> MachineInfo<S, T> {
    pub(crate) fn build(representations: &Representations<S, T>) -> Self {
        let states = representations
            .representations()
            .map(|rep| StateInfo {
                state: rep.state().clone(),
                superstate: rep.superstate().cloned(),
                substates: rep.substates().to_vec(),
                is_active: rep.is_active(),
                has_initial_transition: rep.has_initial_transition(),
                fixed_trigger_destinations: rep.trigger_destinations(),
            })
            .collect();
        MachineInfo { states }
    }

    pub fn state(&self, state: &S) -> Option<&StateInfo<S, T>> {
        self.states.iter().find(|info| &info.state == state)
    }
}
