//! The state-machine facade: the table of configured states, the external
//! state accessor, the firing-mode discipline and the `fire`/`fire_async`
//! entry points that drive the `engine` module's hierarchy walks.
//!
//! `StateMachine<S, T>` is a cheap `Rc`-backed handle, not an owning value —
//! cloning it shares the same underlying machine. That is deliberate: an
//! action registered through `config::StateConfig` typically needs to fire
//! the machine it's attached to (a re-entrant trigger), and the idiomatic way
//! to let a single-threaded callback reach back into the thing invoking it is
//! to hand the callback its own clone of an `Rc<RefCell<_>>` handle.
//!
//! `MachineCore` is the `RefCell`-guarded interior. Every method below that
//! needs to invoke a user callback (`action.invoke(..).await`) first takes
//! whatever it needs out of a short-lived `borrow()`/`borrow_mut()`, drops
//! it, and only then awaits the callback — so a callback that turns around
//! and fires the machine again finds the `RefCell` free. `engine::Representations`
//! is built the same way, for exactly this reason.

use crate::access::{DirectStateAccess, StateAccess};
use crate::action::{Action, LifecycleAction};
use crate::config::StateConfig;
use crate::engine::{HandlerOutcome, Representations};
use crate::error::{Error, Result as CrateResult};
use crate::info::MachineInfo;
use crate::param::{Args, TriggerParameters};
use crate::transition::Transition;
use indexmap::IndexMap;
use log::{debug, info, trace, warn};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;
use strum_macros::{Display, EnumString};

/// Immediate recursively runs a re-entrant fire before the action that
/// caused it returns; Queued defers it to a FIFO drained after the
/// in-flight transition finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum FiringMode {
    Immediate,
    Queued,
}

type UnhandledPolicy<S, T> = Box<dyn FnMut(&S, &T, &[&'static str]) -> CrateResult<(), S, T>>;
type Listener<S, T> = Box<dyn FnMut(&Transition<S, T>)>;

pub(crate) struct MachineCore<S, T> {
    pub(crate) representations: Representations<S, T>,
    state_access: Box<dyn StateAccess<S>>,
    firing_mode: FiringMode,
    event_queue: VecDeque<(T, Rc<Args>)>,
    firing: bool,
    transition_listeners: Vec<Listener<S, T>>,
    unhandled_trigger_policy: UnhandledPolicy<S, T>,
    trigger_params: IndexMap<T, TriggerParameters>,
}

fn default_unhandled_policy<S: Clone + Debug + 'static, T: Clone + Debug + 'static>() -> UnhandledPolicy<S, T> {
    Box::new(|state, trigger, unmet| {
        warn!("cannot handle trigger '{:?}' in state '{:?}'", trigger, state);
        Err(Error::Unhandled {
            state: state.clone(),
            trigger: trigger.clone(),
            unmet_guards: unmet.to_vec(),
        })
    })
}

/// Dispatch outcome for a single resolved trigger. Computed synchronously
/// while `MachineCore` is borrowed; carried as owned data across the
/// `.await` points that actually run actions, so no borrow survives them.
enum Dispatch<S, T> {
    Ignored,
    Unhandled { unmet: Vec<&'static str> },
    Internal { action: Action<S, T> },
    Move { destination: S, from_reentry_behaviour: bool },
}

#[derive(Clone, Copy)]
enum Direction {
    Activate,
    Deactivate,
}

/// A handle onto a hierarchical state machine. Cheap to `Clone`; every clone
/// refers to the same underlying machine.
pub struct StateMachine<S, T>(pub(crate) Rc<RefCell<MachineCore<S, T>>>);

impl<S, T> Clone for StateMachine<S, T> {
    fn clone(&self) -> Self {
        StateMachine(Rc::clone(&self.0))
    }
}

impl<S: Clone + Eq + Hash + Debug + 'static, T: Clone + Eq + Hash + Debug + 'static> StateMachine<S, T> {
    pub fn new(initial: S) -> Self {
        Self::with_mode(initial, FiringMode::Immediate)
    }

    pub fn with_mode(initial: S, firing_mode: FiringMode) -> Self {
        Self::with_state_access(Box::new(DirectStateAccess::new(initial)), firing_mode)
    }

    pub fn with_state_access(state_access: Box<dyn StateAccess<S>>, firing_mode: FiringMode) -> Self {
        StateMachine(Rc::new(RefCell::new(MachineCore {
            representations: Representations::new(),
            state_access,
            firing_mode,
            event_queue: VecDeque::new(),
            firing: false,
            transition_listeners: Vec::new(),
            unhandled_trigger_policy: default_unhandled_policy(),
            trigger_params: IndexMap::new(),
        })))
    }

    /// Begin (or resume) fluent configuration of `state`.
    pub fn configure(&self, state: S) -> StateConfig<S, T> {
        StateConfig::new(Rc::clone(&self.0), state)
    }

    pub fn register_trigger_parameters(&self, trigger: T, params: TriggerParameters) {
        self.0.borrow_mut().trigger_params.insert(trigger, params);
    }

    pub fn on_transitioned(&self, listener: impl FnMut(&Transition<S, T>) + 'static) {
        self.0.borrow_mut().transition_listeners.push(Box::new(listener));
    }

    pub fn on_unhandled_trigger(
        &self,
        policy: impl FnMut(&S, &T, &[&'static str]) -> CrateResult<(), S, T> + 'static,
    ) {
        self.0.borrow_mut().unhandled_trigger_policy = Box::new(policy);
    }

    pub fn current_state(&self) -> S {
        self.0.borrow().state_access.current()
    }

    pub fn is_in_state(&self, target: &S) -> bool {
        let core = self.0.borrow();
        let current = core.state_access.current();
        core.representations.is_in_state(&current, target)
    }

    pub fn can_fire(&self, trigger: &T) -> bool {
        self.can_fire_with_args(trigger, &Args::new())
    }

    pub fn can_fire_with_args(&self, trigger: &T, args: &Args) -> bool {
        self.permitted_triggers_with_args(args).contains(trigger)
    }

    pub fn permitted_triggers(&self) -> Vec<T> {
        self.permitted_triggers_with_args(&Args::new())
    }

    pub fn permitted_triggers_with_args(&self, args: &Args) -> Vec<T> {
        let core = self.0.borrow();
        let current = core.state_access.current();
        core.representations.permitted_triggers(&current, args)
    }

    pub fn info(&self) -> MachineInfo<S, T> {
        MachineInfo::build(&self.0.borrow().representations)
    }

    // ---- firing ----

    pub fn fire(&self, trigger: T) -> CrateResult<(), S, T> {
        pollster::block_on(self.fire_with_args_async(trigger, Args::new()))
    }

    pub fn fire_with_args(&self, trigger: T, args: Args) -> CrateResult<(), S, T> {
        pollster::block_on(self.fire_with_args_async(trigger, args))
    }

    pub async fn fire_async(&self, trigger: T) -> CrateResult<(), S, T> {
        self.fire_with_args_async(trigger, Args::new()).await
    }

    /// Convenience overload for a single typed argument, mirroring the
    /// 1-/2-/3-argument `fire` family a variadic-generics language would
    /// offer as one method.
    pub fn fire1<A: std::any::Any>(&self, trigger: T, arg: A) -> CrateResult<(), S, T> {
        self.fire_with_args(trigger, Args::new().with(arg))
    }

    pub fn fire2<A: std::any::Any, B: std::any::Any>(&self, trigger: T, a: A, b: B) -> CrateResult<(), S, T> {
        self.fire_with_args(trigger, Args::new().with(a).with(b))
    }

    pub fn fire3<A: std::any::Any, B: std::any::Any, C: std::any::Any>(
        &self,
        trigger: T,
        a: A,
        b: B,
        c: C,
    ) -> CrateResult<(), S, T> {
        self.fire_with_args(trigger, Args::new().with(a).with(b).with(c))
    }

    pub async fn fire1_async<A: std::any::Any>(&self, trigger: T, arg: A) -> CrateResult<(), S, T> {
        self.fire_with_args_async(trigger, Args::new().with(arg)).await
    }

    pub async fn fire2_async<A: std::any::Any, B: std::any::Any>(
        &self,
        trigger: T,
        a: A,
        b: B,
    ) -> CrateResult<(), S, T> {
        self.fire_with_args_async(trigger, Args::new().with(a).with(b)).await
    }

    pub async fn fire3_async<A: std::any::Any, B: std::any::Any, C: std::any::Any>(
        &self,
        trigger: T,
        a: A,
        b: B,
        c: C,
    ) -> CrateResult<(), S, T> {
        self.fire_with_args_async(trigger, Args::new().with(a).with(b).with(c)).await
    }

    pub async fn fire_with_args_async(&self, trigger: T, args: Args) -> CrateResult<(), S, T> {
        let should_defer_to_queue = {
            let mut core = self.0.borrow_mut();
            match core.firing_mode {
                FiringMode::Queued if core.firing => {
                    core.event_queue.push_back((trigger, Rc::new(args)));
                    true
                }
                _ => {
                    core.firing = true;
                    false
                }
            }
        };
        if should_defer_to_queue {
            return Ok(());
        }

        let result = self.process_one(trigger, Rc::new(args)).await;
        // Drain unconditionally, even if the top-level fire errored: otherwise a
        // reentrant fire queued before the error would sit stale while `firing`
        // goes false, and the next top-level `fire` would jump the queue instead
        // of enqueuing behind it. Draining to empty before clearing `firing`
        // keeps that FIFO guarantee regardless of which fire in the run fails.
        let drain_result = self.drain_queue().await;
        self.0.borrow_mut().firing = false;
        result.and(drain_result)
    }

    /// Runs every queued event to completion, continuing past a failing one
    /// so the queue always ends up empty, and returns the first error seen
    /// (if any) rather than the last.
    async fn drain_queue(&self) -> CrateResult<(), S, T> {
        let mut first_error = None;
        loop {
            let next = self.0.borrow_mut().event_queue.pop_front();
            match next {
                Some((trigger, args)) => {
                    if let Err(error) = self.process_one(trigger, args).await {
                        first_error.get_or_insert(error);
                    }
                }
                None => break,
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn process_one(&self, trigger: T, args: Rc<Args>) -> CrateResult<(), S, T> {
        if let Some(Err(reason)) = {
            let core = self.0.borrow();
            core.trigger_params.get(&trigger).map(|params| params.validate(&args))
        } {
            return Err(Error::InvalidArgument { trigger, reason });
        }

        let source = self.0.borrow().state_access.current();

        let dispatch = {
            let core = self.0.borrow();
            match core.representations.try_find_handler(&source, &trigger, &args)? {
                HandlerOutcome::NotFound => Dispatch::Unhandled { unmet: Vec::new() },
                HandlerOutcome::Blocked { unmet } => Dispatch::Unhandled { unmet },
                HandlerOutcome::Found { found_at, behaviour } => {
                    if behaviour.is_ignored() {
                        Dispatch::Ignored
                    } else if behaviour.is_internal() {
                        let action = behaviour.internal_action().cloned().ok_or_else(|| Error::MissingInternalHandler {
                            state: found_at.clone(),
                            trigger: trigger.clone(),
                        })?;
                        Dispatch::Internal { action }
                    } else {
                        let resolution = behaviour.resolve(&source, &args);
                        Dispatch::Move {
                            destination: resolution.destination,
                            from_reentry_behaviour: behaviour.is_reentry(),
                        }
                    }
                }
            }
        };

        match dispatch {
            Dispatch::Ignored => Ok(()),
            Dispatch::Unhandled { unmet } => {
                let mut core = self.0.borrow_mut();
                (core.unhandled_trigger_policy)(&source, &trigger, &unmet)
            }
            Dispatch::Internal { action } => {
                debug!("dispatching internal trigger '{:?}' in state '{:?}'. processing callback...", trigger, source);
                let transition = Transition::new(source.clone(), source, trigger, args, false);
                action.invoke(&transition).await?;
                info!("finished processing internal trigger '{:?}' in state '{:?}'", transition.trigger, transition.source);
                Ok(())
            }
            Dispatch::Move {
                destination,
                from_reentry_behaviour,
            } => self.dispatch_move(source, destination, trigger, args, from_reentry_behaviour).await,
        }
    }

    async fn dispatch_move(
        &self,
        source: S,
        destination: S,
        trigger: T,
        args: Rc<Args>,
        from_reentry_behaviour: bool,
    ) -> CrateResult<(), S, T> {
        let transition = Transition::new(source.clone(), destination, trigger.clone(), args, from_reentry_behaviour);

        let exit_chain = self.0.borrow().representations.exit_chain(&source, &transition);
        for state in exit_chain {
            debug!("exiting '{:?}'. processing exit callbacks...", state);
            let actions = self.0.borrow().representations.cloned_exit_actions(&state);
            for action in actions {
                trace!("running exit callback for '{:?}'", state);
                action.invoke(&transition).await?;
            }
            info!("finished processing '{:?}' exit callbacks", state);
        }

        self.0.borrow_mut().state_access.set(transition.destination.clone());

        {
            let mut core = self.0.borrow_mut();
            for listener in core.transition_listeners.iter_mut() {
                listener(&transition);
            }
        }

        let enter_chain = self.0.borrow().representations.enter_chain(&transition.destination, &transition);
        for state in enter_chain {
            debug!("entering '{:?}'. processing entry callbacks...", state);
            let actions = self.0.borrow().representations.cloned_entry_actions(&state, &transition);
            for action in actions {
                trace!("running entry callback for '{:?}'", state);
                action.invoke(&transition).await?;
            }
            info!("finished processing '{:?}' entry callbacks", state);
        }

        if from_reentry_behaviour {
            // A dedicated Reentry behaviour skips initial-transition expansion.
            return Ok(());
        }

        self.expand_initial_transitions(transition.source, transition.destination, trigger, transition.args)
            .await
    }

    async fn expand_initial_transitions(
        &self,
        original_source: S,
        mut cur_state: S,
        trigger: T,
        args: Rc<Args>,
    ) -> CrateResult<(), S, T> {
        loop {
            let target = {
                let core = self.0.borrow();
                core.representations.get(&cur_state).and_then(|rep| rep.initial_transition_target().cloned())
            };
            let target = match target {
                Some(target) => target,
                None => return Ok(()),
            };
            let is_valid = self.0.borrow().representations.is_substate_of(&target, &cur_state);
            if !is_valid {
                return Err(Error::InvalidInitialTransition {
                    state: cur_state,
                    target,
                });
            }
            debug!("expanding initial transition: '{:?}' -> '{:?}'. processing entry callbacks...", cur_state, target);
            let init_transition = Transition::initial(original_source.clone(), target.clone(), trigger.clone(), Rc::clone(&args));
            let actions = self.0.borrow().representations.cloned_entry_actions(&target, &init_transition);
            for action in actions {
                trace!("running entry callback for '{:?}'", target);
                action.invoke(&init_transition).await?;
            }
            info!("finished processing '{:?}' entry callbacks", target);
            self.0.borrow_mut().state_access.set(target.clone());
            cur_state = target;
        }
    }

    // ---- activation ----

    pub fn activate(&self) -> CrateResult<(), S, T> {
        pollster::block_on(self.activate_async())
    }

    pub async fn activate_async(&self) -> CrateResult<(), S, T> {
        let current = self.0.borrow().state_access.current();
        let chain = self.0.borrow().representations.activate_chain(&current);
        self.run_lifecycle_chain(chain, Direction::Activate).await
    }

    pub fn deactivate(&self) -> CrateResult<(), S, T> {
        pollster::block_on(self.deactivate_async())
    }

    pub async fn deactivate_async(&self) -> CrateResult<(), S, T> {
        let current = self.0.borrow().state_access.current();
        let chain = self.0.borrow().representations.deactivate_chain(&current);
        self.run_lifecycle_chain(chain, Direction::Deactivate).await
    }

    async fn run_lifecycle_chain(&self, chain: Vec<S>, direction: Direction) -> CrateResult<(), S, T> {
        for state in chain {
            let actions: Vec<LifecycleAction<S, T>> = {
                let core = self.0.borrow();
                match direction {
                    Direction::Activate => core.representations.cloned_activate_actions(&state),
                    Direction::Deactivate => core.representations.cloned_deactivate_actions(&state),
                }
            };
            for action in actions {
                action.invoke().await?;
            }
            let active = matches!(direction, Direction::Activate);
            self.0.borrow_mut().representations.set_active(&state, active);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::Guard;
    use std::cell::RefCell as StdRefCell;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum S {
        A,
        B,
        C,
    }
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum T {
        X,
        Y,
        Z,
        W,
        Bad,
    }

    #[test]
    fn simple_transition() {
        let machine = StateMachine::<S, T>::new(S::A);
        machine.configure(S::A).permit(T::X, S::B);
        machine.fire(T::X).unwrap();
        assert_eq!(machine.current_state(), S::B);
    }

    #[test]
    fn reentry_runs_local_exit_then_entry() {
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        let machine = StateMachine::<S, T>::new(S::B);
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::B).on_exit(Action::sync(move |_| {
                trace.borrow_mut().push("exit");
                Ok(())
            }));
        }
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::B).on_entry(Action::sync(move |_| {
                trace.borrow_mut().push("entry");
                Ok(())
            }));
        }
        machine.configure(S::B).permit_reentry(T::X);
        machine.fire(T::X).unwrap();
        assert_eq!(machine.current_state(), S::B);
        assert_eq!(*trace.borrow(), vec!["exit", "entry"]);
    }

    #[test]
    fn hierarchy_exit_ordering_runs_inner_before_outer() {
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        let machine = StateMachine::<S, T>::new(S::B);
        machine.configure(S::B).substate_of(S::A).unwrap();
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::A).on_exit(Action::sync(move |_| {
                trace.borrow_mut().push("exit_a");
                Ok(())
            }));
        }
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::B).on_exit(Action::sync(move |_| {
                trace.borrow_mut().push("exit_b");
                Ok(())
            }));
        }
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::C).on_entry(Action::sync(move |_| {
                trace.borrow_mut().push("enter_c");
                Ok(())
            }));
        }
        machine.configure(S::A).permit(T::Y, S::C);
        machine.fire(T::Y).unwrap();
        assert_eq!(machine.current_state(), S::C);
        assert_eq!(*trace.borrow(), vec!["exit_b", "exit_a", "enter_c"]);
    }

    #[test]
    fn initial_transition_descends_into_configured_substate() {
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        let machine = StateMachine::<S, T>::new(S::A);
        machine.configure(S::A).permit(T::X, S::B);
        machine.configure(S::C).substate_of(S::B).unwrap();
        machine.configure(S::B).initial_transition(S::C).unwrap();
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::B).on_entry(Action::sync(move |_| {
                trace.borrow_mut().push("enter_b");
                Ok(())
            }));
        }
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::C).on_entry(Action::sync(move |_| {
                trace.borrow_mut().push("enter_c");
                Ok(())
            }));
        }
        machine.fire(T::X).unwrap();
        assert_eq!(machine.current_state(), S::C);
        assert_eq!(*trace.borrow(), vec!["enter_b", "enter_c"]);
    }

    #[test]
    fn guard_blocks_and_default_policy_reports_it() {
        let machine = StateMachine::<S, T>::new(S::A);
        machine.configure(S::A).permit_if(T::X, S::B, Guard::new().with("g1", |_| false));
        let error = machine.fire(T::X).unwrap_err();
        match error {
            Error::Unhandled { unmet_guards, .. } => assert_eq!(unmet_guards, vec!["g1"]),
            other => panic!("expected Unhandled, got {:?}", other),
        }
        assert_eq!(machine.current_state(), S::A);
    }

    #[test]
    fn multiple_permitted_transitions_is_a_fatal_error() {
        let machine = StateMachine::<S, T>::new(S::A);
        machine.configure(S::A).permit(T::X, S::B);
        machine.configure(S::A).permit_if(T::X, S::C, Guard::new().with("always", |_| true));
        let error = machine.fire(T::X).unwrap_err();
        assert!(matches!(error, Error::MultipleTransitionsPermitted { .. }));
    }

    #[test]
    fn internal_transition_runs_action_without_changing_state() {
        let ran = Rc::new(StdRefCell::new(false));
        let machine = StateMachine::<S, T>::new(S::A);
        {
            let ran = Rc::clone(&ran);
            machine.configure(S::A).internal_transition(
                T::X,
                Action::sync(move |_| {
                    *ran.borrow_mut() = true;
                    Ok(())
                }),
            );
        }
        machine.fire(T::X).unwrap();
        assert_eq!(machine.current_state(), S::A);
        assert!(*ran.borrow());
    }

    #[test]
    fn ignored_trigger_is_a_complete_no_op() {
        let ran = Rc::new(StdRefCell::new(false));
        let machine = StateMachine::<S, T>::new(S::A);
        machine.configure(S::A).ignore(T::X);
        {
            let ran = Rc::clone(&ran);
            machine.configure(S::A).on_exit(Action::sync(move |_| {
                *ran.borrow_mut() = true;
                Ok(())
            }));
        }
        machine.fire(T::X).unwrap();
        assert_eq!(machine.current_state(), S::A);
        assert!(!*ran.borrow());
    }

    #[test]
    fn transition_into_own_superstate_does_not_exit_the_superstate() {
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        let machine = StateMachine::<S, T>::new(S::B);
        machine.configure(S::B).substate_of(S::A).unwrap();
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::A).on_exit(Action::sync(move |_| {
                trace.borrow_mut().push("exit_a");
                Ok(())
            }));
        }
        machine.configure(S::B).permit(T::X, S::A);
        machine.fire(T::X).unwrap();
        assert_eq!(machine.current_state(), S::A);
        assert!(trace.borrow().is_empty());
    }

    #[test]
    fn immediate_mode_reentrant_fire_runs_inside_the_causing_action() {
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        let machine = StateMachine::<S, T>::new(S::A);
        machine.configure(S::A).permit(T::X, S::B);
        machine.configure(S::B).permit(T::Y, S::A);
        {
            let trace = Rc::clone(&trace);
            let inner = machine.clone();
            machine.configure(S::B).on_entry(Action::sync(move |_| {
                trace.borrow_mut().push("enter_b_begin");
                inner.fire(T::Y).unwrap();
                trace.borrow_mut().push("enter_b_end");
                Ok(())
            }));
        }
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::A).on_entry(Action::sync(move |_| {
                trace.borrow_mut().push("enter_a");
                Ok(())
            }));
        }
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::B).on_exit(Action::sync(move |_| {
                trace.borrow_mut().push("exit_b");
                Ok(())
            }));
        }
        machine.fire(T::X).unwrap();
        assert_eq!(machine.current_state(), S::A);
        assert_eq!(*trace.borrow(), vec!["enter_b_begin", "exit_b", "enter_a", "enter_b_end"]);
    }

    #[test]
    fn queued_mode_defers_reentrant_fire_until_the_outer_one_completes() {
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        let machine = StateMachine::<S, T>::with_mode(S::A, FiringMode::Queued);
        machine.configure(S::A).permit(T::X, S::B);
        machine.configure(S::B).permit(T::Y, S::A);
        {
            let trace = Rc::clone(&trace);
            let inner = machine.clone();
            machine.configure(S::B).on_entry(Action::sync(move |_| {
                trace.borrow_mut().push("enter_b");
                inner.fire(T::Y).unwrap();
                Ok(())
            }));
        }
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::A).on_entry(Action::sync(move |_| {
                trace.borrow_mut().push("enter_a");
                Ok(())
            }));
        }
        machine.fire(T::X).unwrap();
        assert_eq!(machine.current_state(), S::A);
        assert_eq!(*trace.borrow(), vec!["enter_b", "enter_a"]);
    }

    #[test]
    fn queued_mode_drains_the_rest_of_the_queue_even_after_one_event_errors() {
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        let machine = StateMachine::<S, T>::with_mode(S::A, FiringMode::Queued);
        machine.configure(S::A).permit(T::X, S::B);
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::B).internal_transition(
                T::Z,
                Action::sync(move |_| {
                    trace.borrow_mut().push("z");
                    Ok(())
                }),
            );
        }
        {
            let trace = Rc::clone(&trace);
            machine.configure(S::B).internal_transition(
                T::W,
                Action::sync(move |_| {
                    trace.borrow_mut().push("w");
                    Ok(())
                }),
            );
        }
        {
            let trace = Rc::clone(&trace);
            let inner = machine.clone();
            machine.configure(S::B).on_entry(Action::sync(move |_| {
                trace.borrow_mut().push("enter_b");
                // T::Bad is unhandled in B, so processing it during the drain
                // will fail; T::Z is queued right behind it and must still run.
                let _ = inner.fire(T::Bad);
                let _ = inner.fire(T::Z);
                Ok(())
            }));
        }
        let outer_result = machine.fire(T::X);
        assert!(outer_result.is_err());
        // The queue must be fully drained — including "z", which was queued
        // before the later top-level fire below — before `firing` clears.
        assert_eq!(*trace.borrow(), vec!["enter_b", "z"]);

        machine.fire(T::W).unwrap();
        assert_eq!(*trace.borrow(), vec!["enter_b", "z", "w"]);
    }

    #[test]
    fn dynamic_destination_is_resolved_from_fire_arguments() {
        let machine = StateMachine::<S, T>::new(S::A);
        machine.configure(S::A).permit_dynamic(T::X, |args| if *args.get::<bool>(0).unwrap() { S::B } else { S::C });
        machine.fire1(T::X, true).unwrap();
        assert_eq!(machine.current_state(), S::B);
    }

    #[test]
    fn wrong_argument_arity_is_rejected_before_any_side_effect() {
        let ran = Rc::new(StdRefCell::new(false));
        let machine = StateMachine::<S, T>::new(S::A);
        machine.register_trigger_parameters(T::X, crate::param::TriggerParameters::new().slot::<i32>());
        {
            let ran = Rc::clone(&ran);
            machine.configure(S::A).on_exit(Action::sync(move |_| {
                *ran.borrow_mut() = true;
                Ok(())
            }));
        }
        machine.configure(S::A).permit(T::X, S::B);
        let error = machine.fire(T::X).unwrap_err();
        assert!(matches!(error, Error::InvalidArgument { .. }));
        assert_eq!(machine.current_state(), S::A);
        assert!(!*ran.borrow());
    }

    #[test]
    fn custom_unhandled_trigger_policy_overrides_the_default() {
        let machine = StateMachine::<S, T>::new(S::A);
        machine.on_unhandled_trigger(|_state, _trigger, _unmet| Ok(()));
        assert!(machine.fire(T::X).is_ok());
        assert_eq!(machine.current_state(), S::A);
    }

    #[test]
    fn transition_listener_observes_the_committed_destination() {
        let seen = Rc::new(StdRefCell::new(None));
        let machine = StateMachine::<S, T>::new(S::A);
        machine.configure(S::A).permit(T::X, S::B);
        {
            let seen = Rc::clone(&seen);
            machine.on_transitioned(move |transition| {
                *seen.borrow_mut() = Some((transition.source, transition.destination));
            });
        }
        machine.fire(T::X).unwrap();
        assert_eq!(*seen.borrow(), Some((S::A, S::B)));
    }
}
