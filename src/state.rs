//! Per-state configuration and runtime record.

use crate::action::{Action, EntryAction, LifecycleAction};
use crate::error::Error;
use crate::param::Args;
use crate::trigger::TriggerBehaviour;
use indexmap::IndexMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Outcome of a purely local (non-ancestor-walking) handler lookup.
pub enum LocalLookup<'a, S, T> {
    /// No trigger behaviour is registered for this trigger on this state.
    Absent,
    /// At least one behaviour is registered, but none has all of its guards
    /// met. Carries the unmet-guard descriptions of the first such
    /// behaviour, for diagnostics.
    Blocked(Vec<&'static str>),
    /// Exactly one behaviour has all of its guards met.
    Found(&'a TriggerBehaviour<S, T>),
}

/// The runtime record for one configured state: its trigger behaviours,
/// action lists, and position in the hierarchy.
pub struct StateRepresentation<S, T> {
    state: S,
    trigger_behaviours: IndexMap<T, Vec<TriggerBehaviour<S, T>>>,
    entry_actions: Vec<EntryAction<S, T>>,
    exit_actions: Vec<Action<S, T>>,
    activate_actions: Vec<LifecycleAction<S, T>>,
    deactivate_actions: Vec<LifecycleAction<S, T>>,
    superstate: Option<S>,
    substates: Vec<S>,
    initial_transition_target: Option<S>,
    active: bool,
}

impl<S: Clone + Eq + Hash + Debug, T: Clone + Eq + Hash + Debug> StateRepresentation<S, T> {
    pub fn new(state: S) -> Self {
        StateRepresentation {
            state,
            trigger_behaviours: IndexMap::new(),
            entry_actions: Vec::new(),
            exit_actions: Vec::new(),
            activate_actions: Vec::new(),
            deactivate_actions: Vec::new(),
            superstate: None,
            substates: Vec::new(),
            initial_transition_target: None,
            active: false,
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn add_trigger_behaviour(&mut self, trigger: T, behaviour: TriggerBehaviour<S, T>) {
        self.trigger_behaviours
            .entry(trigger)
            .or_insert_with(Vec::new)
            .push(behaviour);
    }

    pub fn add_entry_action(&mut self, action: EntryAction<S, T>) {
        self.entry_actions.push(action);
    }

    pub fn add_exit_action(&mut self, action: Action<S, T>) {
        self.exit_actions.push(action);
    }

    pub fn add_activate_action(&mut self, action: LifecycleAction<S, T>) {
        self.activate_actions.push(action);
    }

    pub fn add_deactivate_action(&mut self, action: LifecycleAction<S, T>) {
        self.deactivate_actions.push(action);
    }

    pub fn superstate(&self) -> Option<&S> {
        self.superstate.as_ref()
    }

    pub fn set_superstate(&mut self, parent: S) {
        self.superstate = Some(parent);
    }

    pub fn substates(&self) -> &[S] {
        &self.substates
    }

    pub fn add_substate(&mut self, child: S) {
        if !self.substates.contains(&child) {
            self.substates.push(child);
        }
    }

    pub fn initial_transition_target(&self) -> Option<&S> {
        self.initial_transition_target.as_ref()
    }

    pub fn has_initial_transition(&self) -> bool {
        self.initial_transition_target.is_some()
    }

    pub fn set_initial_transition(&mut self, target: S) {
        self.initial_transition_target = Some(target);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Resolve a trigger behaviour registered directly on this state,
    /// without consulting any ancestor. Fails fatally if two or more
    /// candidates have all guards met simultaneously.
    pub fn try_find_local_handler(
        &self,
        trigger: &T,
        args: &Args,
    ) -> Result<LocalLookup<'_, S, T>, Error<S, T>> {
        let candidates = match self.trigger_behaviours.get(trigger) {
            None => return Ok(LocalLookup::Absent),
            Some(v) => v,
        };
        let mut met: Option<&TriggerBehaviour<S, T>> = None;
        let mut met_count = 0usize;
        let mut first_unmet: Option<Vec<&'static str>> = None;
        for behaviour in candidates {
            let unmet = behaviour.guard().unmet(args);
            if unmet.is_empty() {
                met_count += 1;
                if met.is_none() {
                    met = Some(behaviour);
                }
            } else if first_unmet.is_none() {
                first_unmet = Some(unmet);
            }
        }
        if met_count >= 2 {
            return Err(Error::MultipleTransitionsPermitted {
                state: self.state.clone(),
                trigger: trigger.clone(),
            });
        }
        if let Some(behaviour) = met {
            return Ok(LocalLookup::Found(behaviour));
        }
        match first_unmet {
            Some(unmet) => Ok(LocalLookup::Blocked(unmet)),
            None => Ok(LocalLookup::Absent),
        }
    }

    /// Triggers with at least one fully-met local candidate, in
    /// first-registered order.
    pub fn local_permitted_triggers(&self, args: &Args) -> Vec<T> {
        self.trigger_behaviours
            .iter()
            .filter(|(_, candidates)| candidates.iter().any(|b| b.guard().all_met(args)))
            .map(|(trigger, _)| trigger.clone())
            .collect()
    }

    pub fn has_trigger(&self, trigger: &T) -> bool {
        self.trigger_behaviours.contains_key(trigger)
    }

    /// Entry actions in registration order. The caller (the entry walk in
    /// `engine::Representations`) is responsible for cloning out the ones
    /// that `applies_to` a given transition and invoking them *after*
    /// releasing any borrow of the owning table, so that a re-entrant fire
    /// from inside one of them can re-borrow it.
    pub fn entry_actions(&self) -> &[EntryAction<S, T>] {
        &self.entry_actions
    }

    pub fn exit_actions(&self) -> &[Action<S, T>] {
        &self.exit_actions
    }

    pub fn activate_actions(&self) -> &[LifecycleAction<S, T>] {
        &self.activate_actions
    }

    pub fn deactivate_actions(&self) -> &[LifecycleAction<S, T>] {
        &self.deactivate_actions
    }

    /// Destinations reachable from this state for each registered trigger,
    /// restricted to the statically-known `Transitioning`/`Reentry`
    /// behaviours (a `Dynamic` destination depends on the fire's arguments
    /// and cannot be reported without them). Used by `info::MachineInfo`.
    pub fn trigger_destinations(&self) -> Vec<(T, Vec<S>)> {
        self.trigger_behaviours
            .iter()
            .map(|(trigger, candidates)| {
                let destinations = candidates
                    .iter()
                    .filter_map(|behaviour| match behaviour {
                        TriggerBehaviour::Transitioning { destination, .. } => Some(destination.clone()),
                        TriggerBehaviour::Reentry { destination, .. } => Some(destination.clone()),
                        _ => None,
                    })
                    .collect();
                (trigger.clone(), destinations)
            })
            .collect()
    }
}

impl<S: Debug, T> Debug for StateRepresentation<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRepresentation")
            .field("state", &self.state)
            .field("superstate", &self.superstate)
            .field("substates", &self.substates)
            .field("active", &self.active)
            .finish()
    }
}
