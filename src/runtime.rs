//! The executor: the single point where thunks actually run
//!
//! [`run`] spawns an effect's thunk (optionally under a supervisor), awaits
//! it under the effective timeout, normalizes whatever it yields into a
//! canonical outcome, and emits a start/stop telemetry pair. Every failure
//! path yields a normal failure outcome — `run` never raises for business
//! failures.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::{self, Config};
use crate::effect::{normalize, Effect};
use crate::env::Env;
use crate::error::StageTaggedError;
use crate::outcome::Outcome;
use crate::summary::summarize_any;
use crate::supervisor::Supervisor;
use crate::telemetry::{self, EffectType, RunStatus, TelemetryEvent, TelemetrySink};

/// Per-run knobs; everything unset falls back to the effect's context and
/// then the process-wide config
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Explicit timeout budget; wins over the context's timeout
    pub timeout: Option<std::time::Duration>,

    /// Spawn the thunk under this supervisor instead of detached
    pub supervisor: Option<Supervisor>,

    /// Explicit config; wins over the process-wide snapshot
    pub config: Option<Config>,

    /// Explicit telemetry sink; wins over the installed one
    pub sink: Option<Arc<dyn TelemetrySink>>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit timeout budget
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Spawn under the given supervisor
    pub fn with_supervisor(mut self, supervisor: Supervisor) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Use an explicit config instead of the process-wide one
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Emit telemetry to the given sink
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("timeout", &self.timeout)
            .field("supervisor", &self.supervisor)
            .field("has_config", &self.config.is_some())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Force an effect to completion and return its outcome.
///
/// Timeout resolution: `options.timeout` > context timeout > configured
/// default. On expiry the spawned handle is abandoned, not awaited further;
/// pass a [`Supervisor`] to retain the ability to abort orphans.
#[instrument(
    name = "tarry_run",
    skip(effect, env, options),
    fields(trace_id = %effect.context().trace_id)
)]
pub async fn run<T>(effect: Effect<T>, env: Env, options: RunOptions) -> Outcome<T>
where
    T: Serialize + Send + Sync + 'static,
{
    let config = options.config.clone().unwrap_or_else(config::snapshot);
    let timeout = options
        .timeout
        .or(effect.context().timeout)
        .unwrap_or(config.default_timeout);

    let context = effect.context().clone();
    let span_name = context.effective_span_name(&config.default_span_name);
    let effect_type = if effect.is_success_track() {
        EffectType::Success
    } else {
        EffectType::Failure
    };

    // when telemetry is disabled, no events are constructed at all
    let sink = if config.telemetry_enabled {
        options.sink.clone().or_else(telemetry::installed)
    } else {
        None
    };

    let started = Instant::now();
    if let Some(sink) = &sink {
        sink.emit(TelemetryEvent {
            name: format!("{}.run.start", config.telemetry_prefix),
            duration_ms: None,
            trace_id: context.trace_id.clone(),
            parent_trace_id: context.parent_trace_id.clone(),
            span_name: span_name.clone(),
            effect_type,
            status: None,
            summary: None,
        });
    }

    // invoke the thunk on the spawned task, never the caller's thread
    let thunk = effect.thunk_clone();
    let fut = async move { thunk(env).await };
    let handle = match &options.supervisor {
        Some(supervisor) => supervisor.spawn(fut),
        None => tokio::spawn(fut),
    };

    let outcome = match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(resolved)) => normalize(resolved),
        Ok(Err(join_err)) => {
            warn!(trace_id = %context.trace_id, error = %join_err, "spawned thunk failed");
            Outcome::failure(StageTaggedError::caught(
                crate::error::Stage::Run,
                Value::String(join_err.to_string()),
            ))
        }
        Err(_elapsed) => {
            // the orphaned handle keeps running; only a supervisor can abort it
            warn!(trace_id = %context.trace_id, timeout_ms = timeout.as_millis() as u64, "run timed out");
            Outcome::failure(StageTaggedError::timeout())
        }
    };

    if let Some(sink) = &sink {
        let (status, summary) = match &outcome {
            Outcome::Success(value) => (RunStatus::Ok, summarize_any(value)),
            Outcome::Failure(cause) => (RunStatus::Error, summarize_any(cause)),
        };
        sink.emit(TelemetryEvent {
            name: format!("{}.run.stop", config.telemetry_prefix),
            duration_ms: Some(started.elapsed().as_millis() as u64),
            trace_id: context.trace_id.clone(),
            parent_trace_id: context.parent_trace_id.clone(),
            span_name,
            effect_type,
            status: Some(status),
            summary: Some(summary),
        });
    }

    debug!(
        trace_id = %context.trace_id,
        success = outcome.is_success(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run resolved"
    );

    outcome
}
