//! Transition records: the immutable value passed to listeners and actions
//! for the duration of a single fire.

use crate::param::Args;
use std::fmt::Debug;
use std::rc::Rc;

/// A single source-to-destination move, carried through the exit walk, the
/// state commit, the transition listeners and the entry walk.
///
/// `args` is shared via `Rc` rather than owned outright: initial-transition
/// expansion (4.6 Step D) builds one or more further `Transition`s carrying
/// the *same* argument vector as the fire that triggered them, and `Args` is
/// a bag of `Box<dyn Any>` which cannot itself be `Clone`.
#[derive(Debug)]
pub struct Transition<S, T> {
    pub source: S,
    pub destination: S,
    pub trigger: T,
    pub args: Rc<Args>,
    /// Set for any same-state move, whether declared via a dedicated
    /// `Reentry` trigger behaviour or an ordinary `Transitioning`/`Dynamic`
    /// one whose destination happens to equal the source (see DESIGN.md,
    /// "is_reentry scope").
    pub is_reentry: bool,
    /// Set for the synthetic transitions generated by initial-transition
    /// expansion; these never exit anything and never notify listeners.
    pub is_initial: bool,
}

impl<S: Clone + PartialEq, T: Clone> Transition<S, T> {
    /// Build an ordinary (non-initial) transition. `is_reentry` is the
    /// logical OR of "the resolved behaviour was `Reentry`" and
    /// "`destination == source`".
    pub fn new(source: S, destination: S, trigger: T, args: Rc<Args>, from_reentry_behaviour: bool) -> Self {
        let is_reentry = from_reentry_behaviour || destination == source;
        Transition {
            source,
            destination,
            trigger,
            args,
            is_reentry,
            is_initial: false,
        }
    }

    /// An initial-transition move. `source` is the original pre-fire state,
    /// carried through unchanged across however many expansion steps follow.
    pub fn initial(source: S, destination: S, trigger: T, args: Rc<Args>) -> Self {
        Transition {
            source,
            destination,
            trigger,
            args,
            is_reentry: false,
            is_initial: true,
        }
    }
}
