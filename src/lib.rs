//! A hierarchical, in-process finite state machine.
//!
//! Configure states and their trigger behaviours with
//! [`StateMachine::configure`], then drive transitions with
//! [`StateMachine::fire`] (or `fire_async`, for actions that genuinely
//! suspend).

mod access;
mod action;
mod config;
mod engine;
mod error;
mod guard;
mod info;
mod machine;
mod param;
mod state;
mod transition;
mod trigger;

pub use access::{DirectStateAccess, StateAccess};
pub use action::{Action, ActionFuture, ActionResult, LifecycleAction};
pub use config::StateConfig;
pub use error::{ArgumentErrorKind, Error, Result};
pub use guard::Guard;
pub use info::{MachineInfo, StateInfo};
pub use machine::{FiringMode, StateMachine};
pub use param::{Args, TriggerParameters};
pub use transition::Transition;
