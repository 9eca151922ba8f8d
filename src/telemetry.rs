//! Telemetry events and pluggable sinks
//!
//! The executor emits one start/stop event pair per `run` invocation to a
//! [`TelemetrySink`]. Emission is fire-and-forget: the absence of a sink
//! never changes control flow, and with telemetry disabled in the config no
//! event values are constructed at all.
//!
//! Shipped sinks:
//! - [`TracingSink`] logs events through `tracing` (the ambient default
//!   choice for applications already on the tracing stack)
//! - [`MemorySink`] records events in memory, for tests and inspection

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Which track the observed effect was on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Success,
    Failure,
}

impl EffectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectType::Success => "success",
            EffectType::Failure => "failure",
        }
    }
}

/// How the run resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Error => "error",
        }
    }
}

/// One telemetry event; emitted in start/stop pairs per `run` invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    /// `{prefix}.run.start` or `{prefix}.run.stop`
    pub name: String,

    /// Elapsed run time; stop events only
    pub duration_ms: Option<u64>,

    pub trace_id: String,
    pub parent_trace_id: Option<String>,
    pub span_name: String,

    /// The effect's variant tag at the time of observation
    pub effect_type: EffectType,

    /// Resolution status; stop events only
    pub status: Option<RunStatus>,

    /// Bounded summary of the resolved value; stop events only.
    /// Never the raw value.
    pub summary: Option<Value>,
}

impl TelemetryEvent {
    /// Check if this is a start event
    pub fn is_start(&self) -> bool {
        self.name.ends_with(".start")
    }

    /// Check if this is a stop event
    pub fn is_stop(&self) -> bool {
        self.name.ends_with(".stop")
    }
}

/// Receiver for telemetry events
pub trait TelemetrySink: Send + Sync {
    /// Handle one event. Must not block the caller for long; emission is
    /// fire-and-forget and failures here must stay invisible to run callers.
    fn emit(&self, event: TelemetryEvent);
}

/// Sink that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, event: TelemetryEvent) {
        debug!(
            target: "tarry::telemetry",
            name = %event.name,
            trace_id = %event.trace_id,
            parent_trace_id = event.parent_trace_id.as_deref().unwrap_or(""),
            span_name = %event.span_name,
            effect_type = event.effect_type.as_str(),
            status = event.status.map(|s| s.as_str()).unwrap_or(""),
            duration_ms = event.duration_ms,
            "telemetry event"
        );
    }
}

/// Recording sink for tests and local inspection
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<RwLock<Vec<TelemetryEvent>>>,
}

impl MemorySink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events (cloned)
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.read().clone()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if no events were recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TelemetrySink for MemorySink {
    fn emit(&self, event: TelemetryEvent) {
        self.events.write().push(event);
    }
}

static INSTALLED: Lazy<RwLock<Option<Arc<dyn TelemetrySink>>>> = Lazy::new(|| RwLock::new(None));

/// Install a process-wide sink, used by runs that do not pass one explicitly
pub fn install(sink: Arc<dyn TelemetrySink>) {
    *INSTALLED.write() = Some(sink);
}

/// Remove the process-wide sink
pub fn uninstall() {
    *INSTALLED.write() = None;
}

/// The currently installed process-wide sink, if any
pub fn installed() -> Option<Arc<dyn TelemetrySink>> {
    INSTALLED.read().clone()
}
