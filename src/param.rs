//! Typed trigger-parameter descriptors.
//!
//! A trigger can optionally be associated with an expected argument shape.
//! Registering a [`TriggerParameters`] for a trigger lets `fire` validate the
//! actual argument tuple before any state is touched.

use crate::error::ArgumentErrorKind;
use std::any::{Any, TypeId};

/// Type-erased argument bundle passed through a single fire.
///
/// Actions, guards and dynamic-destination resolvers all receive a `&Args`
/// and downcast the slots they care about.
#[derive(Default)]
pub struct Args(Vec<Box<dyn Any>>);

impl Args {
    pub fn new() -> Self {
        Args(Vec::new())
    }

    pub fn with(mut self, value: impl Any) -> Self {
        self.0.push(Box::new(value));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get<V: Any>(&self, index: usize) -> Option<&V> {
        self.0.get(index).and_then(|b| b.downcast_ref::<V>())
    }

    fn type_id_at(&self, index: usize) -> Option<TypeId> {
        self.0.get(index).map(|b| (**b).type_id())
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Args({} value(s))", self.0.len())
    }
}

/// Describes the expected shape of the arguments a trigger is fired with.
pub struct TriggerParameters {
    type_ids: Vec<TypeId>,
    type_names: Vec<&'static str>,
}

impl TriggerParameters {
    pub fn new() -> Self {
        TriggerParameters {
            type_ids: Vec::new(),
            type_names: Vec::new(),
        }
    }

    /// Append an expected slot of type `V`.
    pub fn slot<V: Any>(mut self) -> Self {
        self.type_ids.push(TypeId::of::<V>());
        self.type_names.push(std::any::type_name::<V>());
        self
    }

    pub fn arity(&self) -> usize {
        self.type_ids.len()
    }

    /// Validate `args` against this descriptor: arity first, then per-slot
    /// type assignability.
    pub fn validate(&self, args: &Args) -> Result<(), ArgumentErrorKind> {
        if args.len() != self.type_ids.len() {
            return Err(ArgumentErrorKind::WrongArity {
                expected: self.type_ids.len(),
                actual: args.len(),
            });
        }
        for (index, expected) in self.type_ids.iter().enumerate() {
            match args.type_id_at(index) {
                Some(actual) if actual == *expected => {}
                _ => return Err(ArgumentErrorKind::WrongType { index }),
            }
        }
        Ok(())
    }
}

impl Default for TriggerParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TriggerParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerParameters")
            .field("types", &self.type_names)
            .finish()
    }
}
