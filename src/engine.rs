//! The transition engine: hierarchy walks, handler resolution and the
//! per-fire dispatch algorithm. Everything else in the crate is a thin skin
//! over this module.
//!
//! Every method here that inspects the representation table is synchronous
//! and returns owned data (a chain of state ids, a cloned list of actions) –
//! never a borrow held across an `.await`. `machine::MachineCore` is wrapped
//! in a `RefCell`, and an action may itself fire the machine re-entrantly
//! (Immediate mode); if any of these methods held the table borrowed while
//! awaiting an action, that re-entrant fire would panic on a second
//! `borrow_mut`. Keeping "what to run" (computed here) separate from
//! "running it" (driven by `machine::fire_core`, with no borrow alive across
//! the `.await`) is what makes that reentrancy sound.

use crate::action::{Action, LifecycleAction};
use crate::error::Error;
use crate::param::Args;
use crate::state::{LocalLookup, StateRepresentation};
use crate::transition::Transition;
use crate::trigger::TriggerBehaviour;
use indexmap::IndexMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Outcome of ascending the hierarchy looking for a handler.
pub enum HandlerOutcome<'a, S, T> {
    NotFound,
    Blocked { unmet: Vec<&'static str> },
    Found {
        found_at: S,
        behaviour: &'a TriggerBehaviour<S, T>,
    },
}

/// Owns every configured state representation, keyed by state id in
/// insertion order.
pub struct Representations<S, T> {
    table: IndexMap<S, StateRepresentation<S, T>>,
}

impl<S: Clone + Eq + Hash + Debug, T: Clone + Eq + Hash + Debug> Representations<S, T> {
    pub fn new() -> Self {
        Representations {
            table: IndexMap::new(),
        }
    }

    pub fn get(&self, state: &S) -> Option<&StateRepresentation<S, T>> {
        self.table.get(state)
    }

    pub fn get_mut(&mut self, state: &S) -> &mut StateRepresentation<S, T> {
        self.table
            .entry(state.clone())
            .or_insert_with(|| StateRepresentation::new(state.clone()))
    }

    pub fn contains(&self, state: &S) -> bool {
        self.table.contains_key(state)
    }

    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.table.keys()
    }

    pub fn representations(&self) -> impl Iterator<Item = &StateRepresentation<S, T>> {
        self.table.values()
    }

    /// Does the subtree rooted at `ancestor` contain `candidate` (reflexively)?
    pub fn includes(&self, ancestor: &S, candidate: &S) -> bool {
        let mut cur = candidate.clone();
        loop {
            if cur == *ancestor {
                return true;
            }
            match self.get(&cur).and_then(|r| r.superstate().cloned()) {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
    }

    /// Ascend from `state` looking for a trigger behaviour, stopping at the
    /// first state that has *any* registration for `trigger` (met or not).
    pub fn try_find_handler<'a>(
        &'a self,
        state: &S,
        trigger: &T,
        args: &Args,
    ) -> Result<HandlerOutcome<'a, S, T>, Error<S, T>> {
        let mut cur = state.clone();
        loop {
            let rep = match self.get(&cur) {
                Some(r) => r,
                None => return Ok(HandlerOutcome::NotFound),
            };
            match rep.try_find_local_handler(trigger, args)? {
                LocalLookup::Found(behaviour) => {
                    return Ok(HandlerOutcome::Found {
                        found_at: cur,
                        behaviour,
                    })
                }
                LocalLookup::Blocked(unmet) => return Ok(HandlerOutcome::Blocked { unmet }),
                LocalLookup::Absent => match rep.superstate() {
                    Some(parent) => cur = parent.clone(),
                    None => return Ok(HandlerOutcome::NotFound),
                },
            }
        }
    }

    /// Union of permitted triggers across `state` and its ancestors,
    /// first-seen order preserved.
    pub fn permitted_triggers(&self, state: &S, args: &Args) -> Vec<T> {
        let mut result: Vec<T> = Vec::new();
        let mut cur = Some(state.clone());
        while let Some(s) = cur {
            let rep = match self.get(&s) {
                Some(r) => r,
                None => break,
            };
            for t in rep.local_permitted_triggers(args) {
                if !result.contains(&t) {
                    result.push(t);
                }
            }
            cur = rep.superstate().cloned();
        }
        result
    }

    pub fn is_in_state(&self, current: &S, target: &S) -> bool {
        self.includes(target, current)
    }

    /// Validate that `target` is a (direct or transitive) substate of `of`.
    pub fn is_substate_of(&self, target: &S, of: &S) -> bool {
        let mut cur = target.clone();
        loop {
            match self.get(&cur).and_then(|r| r.superstate().cloned()) {
                Some(parent) if parent == *of => return true,
                Some(parent) => cur = parent,
                None => return false,
            }
        }
    }

    /// Would assigning `child.superstate = parent` create a cycle?
    pub fn would_cycle(&self, child: &S, parent: &S) -> bool {
        if child == parent {
            return true;
        }
        self.includes(child, parent)
    }

    // ---- chain computation (synchronous, no actions invoked) ----

    /// States whose *local* exit actions must run, inner-to-outer, for a
    /// fire leaving `from` towards `transition.destination`.
    pub fn exit_chain(&self, from: &S, transition: &Transition<S, T>) -> Vec<S> {
        if transition.is_reentry {
            return vec![from.clone()];
        }
        let mut chain = Vec::new();
        let mut cur = from.clone();
        loop {
            if self.includes(&cur, &transition.destination) {
                break;
            }
            chain.push(cur.clone());
            match self.get(&cur).and_then(|r| r.superstate().cloned()) {
                Some(parent) if parent == transition.destination => break,
                Some(parent) => cur = parent,
                None => break,
            }
        }
        chain
    }

    /// States whose *local* entry actions must run, outer-to-inner, for a
    /// fire arriving at `to` from `transition.source`.
    pub fn enter_chain(&self, to: &S, transition: &Transition<S, T>) -> Vec<S> {
        if transition.is_reentry {
            return vec![to.clone()];
        }
        let mut chain = Vec::new();
        let mut cur = to.clone();
        loop {
            if self.includes(&cur, &transition.source) {
                break;
            }
            chain.push(cur.clone());
            if transition.is_initial {
                break;
            }
            match self.get(&cur).and_then(|r| r.superstate().cloned()) {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    /// States that need activating, root-down, stopping as soon as an
    /// already-active ancestor is reached (activation is assumed transitive:
    /// if a state is active, whoever activated it already activated its
    /// ancestors).
    pub fn activate_chain(&self, state: &S) -> Vec<S> {
        let mut chain = Vec::new();
        let mut cur = Some(state.clone());
        while let Some(s) = cur {
            let rep = match self.get(&s) {
                Some(r) => r,
                None => break,
            };
            if rep.is_active() {
                break;
            }
            chain.push(s.clone());
            cur = rep.superstate().cloned();
        }
        chain.reverse();
        chain
    }

    /// States that need deactivating, local-first, stopping as soon as an
    /// already-inactive ancestor is reached.
    pub fn deactivate_chain(&self, state: &S) -> Vec<S> {
        let mut chain = Vec::new();
        let mut cur = Some(state.clone());
        while let Some(s) = cur {
            let rep = match self.get(&s) {
                Some(r) => r,
                None => break,
            };
            if !rep.is_active() {
                break;
            }
            chain.push(s.clone());
            cur = rep.superstate().cloned();
        }
        chain
    }

    // ---- cloned action lists (no borrow held once returned) ----

    pub fn cloned_exit_actions(&self, state: &S) -> Vec<Action<S, T>> {
        self.get(state).map(|r| r.exit_actions().to_vec()).unwrap_or_default()
    }

    pub fn cloned_entry_actions(&self, state: &S, transition: &Transition<S, T>) -> Vec<Action<S, T>> {
        self.get(state)
            .map(|r| {
                r.entry_actions()
                    .iter()
                    .filter(|entry| entry.applies_to(transition))
                    .map(|entry| entry.action.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn cloned_activate_actions(&self, state: &S) -> Vec<LifecycleAction<S, T>> {
        self.get(state).map(|r| r.activate_actions().to_vec()).unwrap_or_default()
    }

    pub fn cloned_deactivate_actions(&self, state: &S) -> Vec<LifecycleAction<S, T>> {
        self.get(state).map(|r| r.deactivate_actions().to_vec()).unwrap_or_default()
    }

    pub fn set_active(&mut self, state: &S, active: bool) {
        if let Some(rep) = self.table.get_mut(state) {
            rep.set_active(active);
        }
    }
}

impl<S: Clone + Eq + Hash + Debug, T: Clone + Eq + Hash + Debug> Default for Representations<S, T> {
    fn default() -> Self {
        Self::new()
    }
}
