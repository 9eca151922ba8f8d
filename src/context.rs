//! Tracing context propagated through effect composition
//!
//! A [`Context`] is an immutable propagation record: trace identifiers, a
//! span name, a timeout budget, caller baggage, and engine metadata. Every
//! transformation (`merge`, `override_with`, `promote`) returns a new value;
//! contexts are copied into the effects they configure and never mutated in
//! place.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::config::DEFAULT_SPAN_NAME;

/// Generate a fresh opaque trace identifier
fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Immutable propagation record attached to every effect
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    /// Opaque identifier, always present and unique per execution node
    pub trace_id: String,

    /// Trace id of the context this one was promoted from
    pub parent_trace_id: Option<String>,

    /// Human-readable span name; falls back to the configured default
    pub span_name: Option<String>,

    /// Timeout budget; falls back to the configured default at run time
    pub timeout: Option<Duration>,

    /// Caller-defined propagated key/values
    pub baggage: BTreeMap<String, Value>,

    /// Implementation-defined annotations
    pub metadata: BTreeMap<String, Value>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Explicit field replacements for [`Context::override_with`].
///
/// Unset fields leave the context untouched; the map-valued fields are
/// merged key-by-key with the patch winning on conflict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    pub trace_id: Option<String>,
    pub parent_trace_id: Option<String>,
    pub span_name: Option<String>,
    pub timeout: Option<Duration>,
    pub baggage: BTreeMap<String, Value>,
    pub metadata: BTreeMap<String, Value>,
}

impl Context {
    /// Create a context with a fresh trace id and everything else unset
    pub fn new() -> Self {
        Self {
            trace_id: new_trace_id(),
            parent_trace_id: None,
            span_name: None,
            timeout: None,
            baggage: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the span name
    pub fn with_span_name(mut self, name: impl Into<String>) -> Self {
        self.span_name = Some(name.into());
        self
    }

    /// Set the timeout budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a baggage entry
    pub fn with_baggage(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.baggage.insert(key.into(), value.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The span name with the library default applied
    pub fn effective_span_name(&self, default: &str) -> String {
        self.span_name
            .clone()
            .unwrap_or_else(|| default.to_string())
    }

    /// Merge two contexts, preferring every field of `self` when present.
    ///
    /// Scalar fields fall back to `other`; `baggage` and `metadata` are
    /// merged key-by-key with `self`'s keys winning on conflict. The trace
    /// id is always taken from `self`.
    pub fn merge(&self, other: &Context) -> Context {
        let mut baggage = other.baggage.clone();
        baggage.extend(self.baggage.clone());
        let mut metadata = other.metadata.clone();
        metadata.extend(self.metadata.clone());

        Context {
            trace_id: self.trace_id.clone(),
            parent_trace_id: self
                .parent_trace_id
                .clone()
                .or_else(|| other.parent_trace_id.clone()),
            span_name: self.span_name.clone().or_else(|| other.span_name.clone()),
            timeout: self.timeout.or(other.timeout),
            baggage,
            metadata,
        }
    }

    /// Apply explicit field replacements.
    ///
    /// Map-valued fields are merged (patch wins per key) rather than
    /// replaced wholesale.
    pub fn override_with(&self, patch: &ContextPatch) -> Context {
        let mut baggage = self.baggage.clone();
        baggage.extend(patch.baggage.clone());
        let mut metadata = self.metadata.clone();
        metadata.extend(patch.metadata.clone());

        Context {
            trace_id: patch.trace_id.clone().unwrap_or_else(|| self.trace_id.clone()),
            parent_trace_id: patch
                .parent_trace_id
                .clone()
                .or_else(|| self.parent_trace_id.clone()),
            span_name: patch.span_name.clone().or_else(|| self.span_name.clone()),
            timeout: patch.timeout.or(self.timeout),
            baggage,
            metadata,
        }
    }

    /// Derive the context for a composed step.
    ///
    /// The promoted context carries a fresh trace id, parents it to this
    /// one, and chains the span name as `"{step_label} -> {span_name}"`.
    /// Timeout, baggage, and metadata carry over unchanged; the operand
    /// context itself is untouched.
    pub fn promote(&self, step_label: &str) -> Context {
        Context {
            trace_id: new_trace_id(),
            parent_trace_id: Some(self.trace_id.clone()),
            span_name: Some(format!(
                "{} -> {}",
                step_label,
                self.effective_span_name(DEFAULT_SPAN_NAME)
            )),
            timeout: self.timeout,
            baggage: self.baggage.clone(),
            metadata: self.metadata.clone(),
        }
    }
}
