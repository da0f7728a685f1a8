//! Guards: ordered, named predicates that gate a trigger behaviour.

use crate::param::Args;

type Predicate = Box<dyn Fn(&Args) -> bool>;

/// An ordered list of `(predicate, description)` pairs. All must return
/// `true` for the guard to be considered met.
///
/// Predicates are evaluated up to twice per fire: once while resolving a
/// handler, and again (on failure) to collect descriptions for diagnostics.
/// They are not memoized, so they must be pure and side-effect-free.
pub struct Guard {
    predicates: Vec<(Predicate, &'static str)>,
}

impl Guard {
    pub fn new() -> Self {
        Guard {
            predicates: Vec::new(),
        }
    }

    pub fn with(mut self, description: &'static str, predicate: impl Fn(&Args) -> bool + 'static) -> Self {
        self.predicates.push((Box::new(predicate), description));
        self
    }

    pub fn all_met(&self, args: &Args) -> bool {
        self.predicates.iter().all(|(p, _)| p(args))
    }

    /// Descriptions of predicates that returned `false` for `args`, in
    /// declaration order.
    pub fn unmet(&self, args: &Args) -> Vec<&'static str> {
        self.predicates
            .iter()
            .filter(|(p, _)| !p(args))
            .map(|(_, desc)| *desc)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard")
            .field(
                "descriptions",
                &self.predicates.iter().map(|(_, d)| *d).collect::<Vec<_>>(),
            )
            .finish()
    }
}
