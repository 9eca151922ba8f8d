//! Ambient environment handed to thunks
//!
//! An [`Env`] is the read-only, string-keyed map of values a thunk receives
//! when forced. It is cheaply cloneable (the map lives behind an `Arc`) so
//! combinators can hand the same environment to every nested thunk.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

/// Immutable environment map passed into every thunk
#[derive(Debug, Clone, Default)]
pub struct Env {
    values: Arc<BTreeMap<String, Value>>,
}

impl Env {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, returning the extended environment
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into());
        self
    }

    /// Look up an entry
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Check if the environment has any entries
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Serialize to a JSON object
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self.values.as_ref()).unwrap_or(Value::Null)
    }
}

impl FromIterator<(String, Value)> for Env {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: Arc::new(iter.into_iter().collect()),
        }
    }
}
