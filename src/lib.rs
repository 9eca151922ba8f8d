//! Tarry - deferred-effect execution engine

pub mod combine;
pub mod config;
pub mod context;
pub mod effect;
pub mod env;
pub mod error;
pub mod outcome;
pub mod runtime;
pub mod sequence;
pub mod summary;
pub mod supervisor;
pub mod telemetry;

pub use combine::{apply, ApplyFn};
pub use config::Config;
pub use context::{Context, ContextPatch};
pub use effect::{
    fail, fail_with, from_env, from_env_with, from_outcome_thunk, from_outcome_thunk_with,
    succeed, succeed_with, Effect, Thunk,
};
pub use env::Env;
pub use error::{Reason, Stage, StageTaggedError};
pub use outcome::{Cause, Outcome, Resolved};
pub use runtime::{run, RunOptions};
pub use sequence::{apply_fn, sequence, sequence_a, traverse, traverse_a, validate, ValidatorFn};
pub use summary::summarize;
pub use supervisor::Supervisor;
pub use telemetry::{MemorySink, TelemetryEvent, TelemetrySink, TracingSink};
