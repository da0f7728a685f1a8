//! Trigger behaviours: what a given `(state, trigger)` pair does when fired.

use crate::action::Action;
use crate::guard::Guard;
use crate::param::Args;
use std::fmt::Debug;

/// The destination and whether a state change happens, without actually
/// performing it.
pub struct Resolution<S> {
    pub transitions: bool,
    pub destination: S,
}

/// One registered behaviour for a trigger on a particular state.
pub enum TriggerBehaviour<S, T> {
    /// Moves to `destination`, running the normal exit/entry walk.
    Transitioning { destination: S, guard: Guard },
    /// Moves to `destination`, forcing a local exit+entry even when
    /// `destination == source`.
    Reentry { destination: S, guard: Guard },
    /// Runs `action` without leaving or entering any state.
    Internal { action: Action<S, T>, guard: Guard },
    /// No-op: consumes the trigger silently.
    Ignored { guard: Guard },
    /// Computes its destination from the fire's arguments.
    Dynamic {
        resolver: Box<dyn Fn(&Args) -> S>,
        guard: Guard,
    },
}

impl<S: Clone, T> TriggerBehaviour<S, T> {
    pub fn guard(&self) -> &Guard {
        match self {
            TriggerBehaviour::Transitioning { guard, .. } => guard,
            TriggerBehaviour::Reentry { guard, .. } => guard,
            TriggerBehaviour::Internal { guard, .. } => guard,
            TriggerBehaviour::Ignored { guard } => guard,
            TriggerBehaviour::Dynamic { guard, .. } => guard,
        }
    }

    /// Resolve this behaviour's effect for a concrete argument vector,
    /// without actually moving anything.
    pub fn resolve(&self, source: &S, args: &Args) -> Resolution<S> {
        match self {
            TriggerBehaviour::Transitioning { destination, .. } => Resolution {
                transitions: true,
                destination: destination.clone(),
            },
            TriggerBehaviour::Reentry { destination, .. } => Resolution {
                transitions: true,
                destination: destination.clone(),
            },
            TriggerBehaviour::Internal { .. } => Resolution {
                transitions: false,
                destination: source.clone(),
            },
            TriggerBehaviour::Ignored { .. } => Resolution {
                transitions: false,
                destination: source.clone(),
            },
            TriggerBehaviour::Dynamic { resolver, .. } => Resolution {
                transitions: true,
                destination: resolver(args),
            },
        }
    }

    pub fn is_reentry(&self) -> bool {
        matches!(self, TriggerBehaviour::Reentry { .. })
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, TriggerBehaviour::Internal { .. })
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, TriggerBehaviour::Ignored { .. })
    }

    pub fn internal_action(&self) -> Option<&Action<S, T>> {
        match self {
            TriggerBehaviour::Internal { action, .. } => Some(action),
            _ => None,
        }
    }
}

impl<S: Debug, T> Debug for TriggerBehaviour<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerBehaviour::Transitioning { destination, .. } => {
                f.debug_struct("Transitioning").field("destination", destination).finish()
            }
            TriggerBehaviour::Reentry { destination, .. } => {
                f.debug_struct("Reentry").field("destination", destination).finish()
            }
            TriggerBehaviour::Internal { .. } => f.write_str("Internal(..)"),
            TriggerBehaviour::Ignored { .. } => f.write_str("Ignored"),
            TriggerBehaviour::Dynamic { .. } => f.write_str("Dynamic(..)"),
        }
    }
}
