//! Process-wide execution defaults
//!
//! Provides the configurable defaults consulted at `run` time:
//! - timeout budget
//! - span name for contexts that never set one
//! - telemetry on/off switch and event-name prefix
//!
//! The global value is read per `run` call, so reconfiguring at runtime takes
//! effect immediately. Callers who want isolation thread an explicit
//! [`Config`] through `RunOptions` instead of touching the global.

use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Span name used when a context never set one
pub const DEFAULT_SPAN_NAME: &str = "effect";

/// Timeout applied when neither options nor context carry one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Prefix for telemetry event names (`{prefix}.run.start` / `.stop`)
pub const DEFAULT_TELEMETRY_PREFIX: &str = "tarry";

/// Execution defaults consulted by the executor
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Timeout applied to `run` when no explicit budget is given
    pub default_timeout: Duration,

    /// Span name for contexts without one
    pub default_span_name: String,

    /// When false, no telemetry events are constructed at all
    pub telemetry_enabled: bool,

    /// Event-name prefix for emitted telemetry
    pub telemetry_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            default_span_name: DEFAULT_SPAN_NAME.to_string(),
            telemetry_enabled: true,
            telemetry_prefix: DEFAULT_TELEMETRY_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Create config suitable for tests (short timeout)
    pub fn testing() -> Self {
        Self {
            default_timeout: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Set the default timeout
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the default span name
    pub fn with_default_span_name(mut self, name: impl Into<String>) -> Self {
        self.default_span_name = name.into();
        self
    }

    /// Enable or disable telemetry emission
    pub fn with_telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = enabled;
        self
    }

    /// Set the telemetry event-name prefix
    pub fn with_telemetry_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.telemetry_prefix = prefix.into();
        self
    }
}

static GLOBAL: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Current process-wide config (cloned snapshot)
pub fn snapshot() -> Config {
    GLOBAL.read().clone()
}

/// Replace the process-wide config wholesale
pub fn replace(config: Config) {
    *GLOBAL.write() = config;
}

/// Apply a targeted change to the process-wide config
pub fn update(f: impl FnOnce(&mut Config)) {
    f(&mut GLOBAL.write());
}
