//! External-state storage contract.
//!
//! The machine never assumes it owns the "current state" cell itself: it
//! goes through this trait so an embedder can back it with a field on their
//! own object, a database row, or whatever else makes sense for them.

/// Gets and sets the current state id. Implementations are touched only
/// from the firing thread; the engine makes no attempt to synchronize
/// access to them.
pub trait StateAccess<S> {
    fn current(&self) -> S;
    fn set(&mut self, state: S);
}

/// The default in-process implementation: the state id lives directly on
/// this struct.
#[derive(Debug, Clone)]
pub struct DirectStateAccess<S>(S);

impl<S> DirectStateAccess<S> {
    pub fn new(initial: S) -> Self {
        DirectStateAccess(initial)
    }
}

impl<S: Clone> StateAccess<S> for DirectStateAccess<S> {
    fn current(&self) -> S {
        self.0.clone()
    }

    fn set(&mut self, state: S) {
        self.0 = state;
    }
}
