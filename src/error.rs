//! Error types returned by the state machine engine.

use std::fmt::Debug;
use thiserror::Error;

/// Why an actual argument tuple failed to validate against a registered
/// [`crate::param::TriggerParameters`] descriptor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArgumentErrorKind {
    #[error("expected {expected} argument(s), got {actual}")]
    WrongArity { expected: usize, actual: usize },
    #[error("argument {index} has the wrong type")]
    WrongType { index: usize },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error<S: Debug, T: Debug> {
    /// Raised when more than one trigger behaviour on the same state/trigger
    /// pair has all of its guards satisfied for the same fire.
    #[error("state '{state:?}' permits more than one transition for trigger '{trigger:?}' with the given arguments")]
    MultipleTransitionsPermitted { state: S, trigger: T },

    /// The initial-transition target configured on a state is not one of its substates.
    #[error("state '{state:?}' has an initial transition into '{target:?}', which is not a substate of it")]
    InvalidInitialTransition { state: S, target: S },

    /// Dispatch resolved to an `Internal` trigger behaviour but the walk up the
    /// hierarchy never found the handler that produced that resolution.
    #[error("state '{state:?}' has no internal handler for trigger '{trigger:?}' (configuration is inconsistent)")]
    MissingInternalHandler { state: S, trigger: T },

    /// `substate_of` was asked to create a cycle in the superstate chain.
    #[error("making '{state:?}' a substate here would create a cycle in the state hierarchy")]
    CyclicHierarchy { state: S },

    /// Actual arguments passed to `fire` did not match the registered
    /// [`crate::param::TriggerParameters`] for this trigger.
    #[error("invalid arguments for trigger '{trigger:?}': {reason}")]
    InvalidArgument {
        trigger: T,
        reason: ArgumentErrorKind,
    },

    /// No permitted transition exists for this trigger in the current state,
    /// either because none is configured or because all configured guards
    /// were unmet. `unmet_guards` is empty in the former case.
    #[error("trigger '{trigger:?}' is not valid in state '{state:?}' (unmet guards: {unmet_guards:?})")]
    Unhandled {
        state: S,
        trigger: T,
        unmet_guards: Vec<&'static str>,
    },
}

pub type Result<T, S, Tg> = std::result::Result<T, Error<S, Tg>>;
