//! The keyed output table vertices publish into and descendants read from.
//!
//! Open Question #2 ("cluster-config lazy resolution", DESIGN.md) commits to
//! a *typed, checked* getter rather than an unchecked downcast: a parent
//! output of the wrong type returns `GraphError::TypeMismatch` instead of
//! panicking, which is the class of bug this sidesteps by construction.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::GraphError;

#[derive(Default)]
pub struct OutputTable {
    values: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl OutputTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a vertex's output. Writes are atomic with respect to the
    /// publish point: a reader either sees the old state or the fully
    /// written new value, never a partial one.
    pub fn publish<T: Any + Send + Sync>(&self, id: &str, value: T) {
        self.values
            .write()
            .expect("output table lock")
            .insert(id.to_string(), Arc::new(value));
    }

    /// Typed lookup of a published output. Descendants call this lazily, at
    /// the moment they run, rather than eagerly threading values through the
    /// graph construction.
    pub fn get<T: Any + Send + Sync + Clone>(&self, id: &str) -> Result<T, GraphError> {
        let values = self.values.read().expect("output table lock");
        let boxed = values
            .get(id)
            .ok_or_else(|| GraphError::MissingOutput(id.to_string()))?;
        boxed
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| GraphError::TypeMismatch(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.read().expect("output table lock").contains_key(id)
    }
}
