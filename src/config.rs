//! Fluent per-state configuration, returned by `StateMachine::configure`.
//!
//! Mirrors the builder style of `oxo42-stateless-rs`'s `StateConfiguration`:
//! every method takes `&self` (not `&mut self`) and mutates the shared
//! `MachineCore` through the `Rc<RefCell<_>>` handle, so a caller can chain
//! calls or hold on to a `StateConfig` and keep adding to it across several
//! statements without fighting the borrow checker.

use crate::action::{Action, EntryAction, LifecycleAction};
use crate::error::{Error, Result as CrateResult};
use crate::guard::Guard;
use crate::machine::MachineCore;
use crate::trigger::TriggerBehaviour;
use std::cell::RefCell;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

/// Fluent configuration scoped to one state. Cloning it is cheap and refers
/// to the same underlying machine and the same state.
pub struct StateConfig<S, T> {
    core: Rc<RefCell<MachineCore<S, T>>>,
    state: S,
}

impl<S: Clone, T> Clone for StateConfig<S, T> {
    fn clone(&self) -> Self {
        StateConfig {
            core: Rc::clone(&self.core),
            state: self.state.clone(),
        }
    }
}

impl<S: Clone + Eq + Hash + Debug + 'static, T: Clone + Eq + Hash + Debug + 'static> StateConfig<S, T> {
    pub(crate) fn new(core: Rc<RefCell<MachineCore<S, T>>>, state: S) -> Self {
        StateConfig { core, state }
    }

    /// Unconditionally permit `trigger` to move this state to `destination`.
    pub fn permit(&self, trigger: T, destination: S) -> &Self {
        self.permit_if(trigger, destination, Guard::new())
    }

    /// Permit `trigger` to move to `destination` only while `guard` is met.
    pub fn permit_if(&self, trigger: T, destination: S, guard: Guard) -> &Self {
        self.add_behaviour(trigger, TriggerBehaviour::Transitioning { destination, guard })
    }

    /// Permit `trigger` to re-enter this same state, forcing a local
    /// exit+entry rather than being a no-op.
    pub fn permit_reentry(&self, trigger: T) -> &Self {
        self.permit_reentry_if(trigger, Guard::new())
    }

    pub fn permit_reentry_if(&self, trigger: T, guard: Guard) -> &Self {
        self.add_behaviour(
            trigger,
            TriggerBehaviour::Reentry {
                destination: self.state.clone(),
                guard,
            },
        )
    }

    /// Permit `trigger`, computing its destination from the fire's
    /// arguments rather than a fixed state.
    pub fn permit_dynamic(&self, trigger: T, resolver: impl Fn(&crate::param::Args) -> S + 'static) -> &Self {
        self.permit_dynamic_if(trigger, resolver, Guard::new())
    }

    pub fn permit_dynamic_if(
        &self,
        trigger: T,
        resolver: impl Fn(&crate::param::Args) -> S + 'static,
        guard: Guard,
    ) -> &Self {
        self.add_behaviour(
            trigger,
            TriggerBehaviour::Dynamic {
                resolver: Box::new(resolver),
                guard,
            },
        )
    }

    /// Run `action` for `trigger` without leaving or entering any state.
    pub fn internal_transition(&self, trigger: T, action: Action<S, T>) -> &Self {
        self.internal_transition_if(trigger, action, Guard::new())
    }

    pub fn internal_transition_if(&self, trigger: T, action: Action<S, T>, guard: Guard) -> &Self {
        self.add_behaviour(trigger, TriggerBehaviour::Internal { action, guard })
    }

    /// Consume `trigger` silently: it is permitted, but does nothing.
    pub fn ignore(&self, trigger: T) -> &Self {
        self.ignore_if(trigger, Guard::new())
    }

    pub fn ignore_if(&self, trigger: T, guard: Guard) -> &Self {
        self.add_behaviour(trigger, TriggerBehaviour::Ignored { guard })
    }

    fn add_behaviour(&self, trigger: T, behaviour: TriggerBehaviour<S, T>) -> &Self {
        self.core
            .borrow_mut()
            .representations
            .get_mut(&self.state)
            .add_trigger_behaviour(trigger, behaviour);
        self
    }

    /// Run `action` on every entry into this state.
    pub fn on_entry(&self, action: Action<S, T>) -> &Self {
        self.core
            .borrow_mut()
            .representations
            .get_mut(&self.state)
            .add_entry_action(EntryAction::unscoped(action));
        self
    }

    /// Run `action` on entry into this state, but only when arriving via `trigger`.
    pub fn on_entry_from(&self, trigger: T, action: Action<S, T>) -> &Self {
        self.core
            .borrow_mut()
            .representations
            .get_mut(&self.state)
            .add_entry_action(EntryAction::scoped(trigger, action));
        self
    }

    /// Run `action` on every exit from this state.
    pub fn on_exit(&self, action: Action<S, T>) -> &Self {
        self.core
            .borrow_mut()
            .representations
            .get_mut(&self.state)
            .add_exit_action(action);
        self
    }

    /// Run `action` when this state (or its first active ancestor) is activated.
    pub fn on_activate(&self, action: LifecycleAction<S, T>) -> &Self {
        self.core
            .borrow_mut()
            .representations
            .get_mut(&self.state)
            .add_activate_action(action);
        self
    }

    /// Run `action` when this state is deactivated.
    pub fn on_deactivate(&self, action: LifecycleAction<S, T>) -> &Self {
        self.core
            .borrow_mut()
            .representations
            .get_mut(&self.state)
            .add_deactivate_action(action);
        self
    }

    /// Automatically descend into `target` immediately after entering this
    /// state, for every trigger that leads here. `target` must be a direct
    /// or transitive substate of this state (checked eagerly, since the
    /// alternative — discovering the mistake mid-fire — would leave a
    /// partially-entered hierarchy).
    pub fn initial_transition(&self, target: S) -> CrateResult<(), S, T> {
        {
            let core = self.core.borrow();
            if !core.representations.is_substate_of(&target, &self.state) {
                return Err(Error::InvalidInitialTransition {
                    state: self.state.clone(),
                    target,
                });
            }
        }
        self.core
            .borrow_mut()
            .representations
            .get_mut(&self.state)
            .set_initial_transition(target);
        Ok(())
    }

    /// Nest this state under `parent`. Fails if doing so would create a
    /// cycle in the hierarchy.
    pub fn substate_of(&self, parent: S) -> CrateResult<(), S, T> {
        {
            let core = self.core.borrow();
            if core.representations.would_cycle(&self.state, &parent) {
                return Err(Error::CyclicHierarchy { state: self.state.clone() });
            }
        }
        let mut core = self.core.borrow_mut();
        core.representations.get_mut(&self.state).set_superstate(parent.clone());
        core.representations.get_mut(&parent).add_substate(self.state.clone());
        Ok(())
    }
}
