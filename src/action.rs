//! Action behaviours: entry, exit, activate and deactivate callbacks.
//!
//! Every action is represented uniformly as a boxed future-returning closure
//! so that synchronous and suspending registrations share one shape. A purely
//! synchronous action resolves on its first poll; a suspending one may
//! genuinely `.await` inside.
//!
//! The closure is held behind an `Rc` rather than a plain `Box` so the engine
//! can clone a state's action list out from under its borrow of the
//! representation table before invoking anything (see `engine::Representations`).
//! That is what lets an action fired immediately-mode re-enter `fire` on the
//! same machine without the table already being borrowed.

use crate::error::Error;
use crate::transition::Transition;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

pub type ActionResult<S, T> = Result<(), Error<S, T>>;
pub type ActionFuture<'a, S, T> = Pin<Box<dyn Future<Output = ActionResult<S, T>> + 'a>>;

/// A single entry/exit/activate/deactivate callback.
pub struct Action<S, T> {
    f: Rc<dyn Fn(&Transition<S, T>) -> ActionFuture<'_, S, T>>,
}

impl<S, T> Clone for Action<S, T> {
    fn clone(&self) -> Self {
        Action { f: Rc::clone(&self.f) }
    }
}

impl<S: Debug + 'static, T: Debug + 'static> Action<S, T> {
    /// Wrap a plain synchronous callback. The returned future resolves
    /// immediately on first poll.
    pub fn sync(f: impl Fn(&Transition<S, T>) -> ActionResult<S, T> + 'static) -> Self {
        Action {
            f: Rc::new(move |transition| {
                let result = f(transition);
                Box::pin(async move { result })
            }),
        }
    }

    /// Wrap a callback that produces its own boxed future, allowing real
    /// `.await` points inside.
    pub fn suspending(f: impl Fn(&Transition<S, T>) -> ActionFuture<'_, S, T> + 'static) -> Self {
        Action { f: Rc::new(f) }
    }

    pub fn invoke<'a>(&'a self, transition: &'a Transition<S, T>) -> ActionFuture<'a, S, T> {
        (self.f)(transition)
    }
}

impl<S, T> Debug for Action<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Action(..)")
    }
}

/// An entry action optionally scoped to a single triggering trigger.
#[derive(Clone)]
pub struct EntryAction<S, T> {
    pub action: Action<S, T>,
    pub scope: Option<T>,
}

impl<S, T> Debug for EntryAction<S, T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryAction").field("scope", &self.scope).finish()
    }
}

impl<S: Debug + 'static, T: Debug + Clone + PartialEq + 'static> EntryAction<S, T> {
    pub fn unscoped(action: Action<S, T>) -> Self {
        EntryAction { action, scope: None }
    }

    pub fn scoped(trigger: T, action: Action<S, T>) -> Self {
        EntryAction {
            action,
            scope: Some(trigger),
        }
    }

    /// Whether this action should run for the given transition.
    pub fn applies_to(&self, transition: &Transition<S, T>) -> bool {
        match &self.scope {
            None => true,
            Some(t) => *t == transition.trigger,
        }
    }
}

/// An activate/deactivate callback. Unlike entry/exit, these run outside any
/// in-flight transition (`StateMachine::activate`/`deactivate` can be called
/// at any time, not just as part of a fire), so there is no `Transition` to
/// hand them — they are plain nullary callbacks rather than a specialisation
/// of [`Action`].
pub struct LifecycleAction<S, T> {
    f: Rc<dyn Fn() -> ActionFuture<'static, S, T>>,
}

impl<S, T> Clone for LifecycleAction<S, T> {
    fn clone(&self) -> Self {
        LifecycleAction { f: Rc::clone(&self.f) }
    }
}

impl<S: Debug + 'static, T: Debug + 'static> LifecycleAction<S, T> {
    pub fn sync(f: impl Fn() -> ActionResult<S, T> + 'static) -> Self {
        LifecycleAction {
            f: Rc::new(move || {
                let result = f();
                Box::pin(async move { result })
            }),
        }
    }

    pub fn suspending(f: impl Fn() -> ActionFuture<'static, S, T> + 'static) -> Self {
        LifecycleAction { f: Rc::new(f) }
    }

    pub fn invoke(&self) -> ActionFuture<'static, S, T> {
        (self.f)()
    }
}

impl<S, T> Debug for LifecycleAction<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LifecycleAction(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Args;
    use crate::transition::Transition;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum S {
        A,
        B,
    }
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum T {
        Go,
        Stop,
    }

    fn transition(trigger: T) -> Transition<S, T> {
        Transition::new(S::A, S::B, trigger, Rc::new(Args::new()), false)
    }

    #[test]
    fn sync_action_resolves_immediately() {
        let action: Action<S, T> = Action::sync(|_t| Ok(()));
        let t = transition(T::Go);
        let fut = action.invoke(&t);
        let result = pollster::block_on(fut);
        assert!(result.is_ok());
    }

    #[test]
    fn cloned_action_shares_the_same_callback() {
        let action: Action<S, T> = Action::sync(|_t| Ok(()));
        let clone = action.clone();
        let t = transition(T::Go);
        assert!(pollster::block_on(clone.invoke(&t)).is_ok());
    }

    #[test]
    fn entry_action_scope_filters_by_trigger() {
        let action: Action<S, T> = Action::sync(|_t| Ok(()));
        let entry = EntryAction::scoped(T::Go, action);
        let matching = transition(T::Go);
        let other = transition(T::Stop);
        assert!(entry.applies_to(&matching));
        assert!(!entry.applies_to(&other));
    }

    #[test]
    fn lifecycle_action_takes_no_transition() {
        let action: LifecycleAction<S, T> = LifecycleAction::sync(|| Ok(()));
        assert!(pollster::block_on(action.invoke()).is_ok());
    }

    /// A future that returns `Pending` exactly once, waking itself
    /// immediately, before resolving on the next poll. Stands in for a
    /// genuinely suspending callback (e.g. one awaiting I/O) without
    /// pulling in an async runtime just for the test.
    struct YieldOnce(std::cell::Cell<bool>);

    impl std::future::Future for YieldOnce {
        type Output = ();

        fn poll(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<()> {
            if self.0.get() {
                std::task::Poll::Ready(())
            } else {
                self.0.set(true);
                cx.waker().wake_by_ref();
                std::task::Poll::Pending
            }
        }
    }

    #[test]
    fn suspending_action_genuinely_suspends_before_resolving() {
        let reached_end = Rc::new(std::cell::Cell::new(false));
        let action: Action<S, T> = {
            let reached_end = Rc::clone(&reached_end);
            Action::suspending(move |_t| {
                let reached_end = Rc::clone(&reached_end);
                Box::pin(async move {
                    YieldOnce(std::cell::Cell::new(false)).await;
                    reached_end.set(true);
                    Ok(())
                })
            })
        };
        let t = transition(T::Go);
        let result = pollster::block_on(action.invoke(&t));
        assert!(result.is_ok());
        assert!(reached_end.get());
    }

    #[test]
    fn suspending_lifecycle_action_genuinely_suspends_before_resolving() {
        let reached_end = Rc::new(std::cell::Cell::new(false));
        let action: LifecycleAction<S, T> = {
            let reached_end = Rc::clone(&reached_end);
            LifecycleAction::suspending(move || {
                let reached_end = Rc::clone(&reached_end);
                Box::pin(async move {
                    YieldOnce(std::cell::Cell::new(false)).await;
                    reached_end.set(true);
                    Ok(())
                })
            })
        };
        assert!(pollster::block_on(action.invoke()).is_ok());
        assert!(reached_end.get());
    }
}
