//! Stage-tagged failure taxonomy
//!
//! Every failure that originates inside the engine is a [`StageTaggedError`]:
//! a `stage` naming where in the composition chain the failure was captured,
//! and a `reason` describing what went wrong. A tag is assigned only at the
//! innermost point of capture; enclosing combinators pass tagged failures
//! through untouched.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The combinator stage at which a failure was captured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Map,
    Bind,
    Apply,
    Run,
    LiftFunction,
    LiftOutcome,
}

impl Stage {
    /// Stage name as it appears in telemetry metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Map => "map",
            Stage::Bind => "bind",
            Stage::Apply => "apply",
            Stage::Run => "run",
            Stage::LiftFunction => "lift_function",
            Stage::LiftOutcome => "lift_outcome",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong at the tagged stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reason {
    /// A user-supplied function returned an error or panicked
    Caught { error: Value },
    /// The run timeout budget expired
    Timeout,
    /// A thunk resolved to a value that is not a recognized outcome.
    /// Carries a bounded summary of the offending value, never the raw value.
    InvalidResult { summary: Value },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Caught { error } => write!(f, "caught: {}", error),
            Reason::Timeout => f.write_str("timeout"),
            Reason::InvalidResult { summary } => write!(f, "invalid result: {}", summary),
        }
    }
}

/// A failure annotated with the combinator stage that produced it
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("effect failed at {stage}: {reason}")]
pub struct StageTaggedError {
    pub stage: Stage,
    pub reason: Reason,
}

impl StageTaggedError {
    /// A captured error value (or panic payload) at the given stage
    pub fn caught(stage: Stage, error: impl Into<Value>) -> Self {
        Self {
            stage,
            reason: Reason::Caught { error: error.into() },
        }
    }

    /// A run timeout expiry
    pub fn timeout() -> Self {
        Self {
            stage: Stage::Run,
            reason: Reason::Timeout,
        }
    }

    /// An unrecognized thunk return shape, described by a bounded summary
    pub fn invalid_result(summary: Value) -> Self {
        Self {
            stage: Stage::Run,
            reason: Reason::InvalidResult { summary },
        }
    }

    /// Check if this failure is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self.reason, Reason::Timeout)
    }
}

/// Extract a printable value from a panic payload.
///
/// `catch_unwind` yields `Box<dyn Any>`; panics raised via `panic!("...")`
/// carry a `&str` or `String` payload, anything else is opaque.
pub(crate) fn panic_value(payload: Box<dyn Any + Send>) -> Value {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Value::String((*s).to_string())
    } else if let Some(s) = payload.downcast_ref::<String>() {
        Value::String(s.clone())
    } else {
        Value::String("panic with non-string payload".to_string())
    }
}
