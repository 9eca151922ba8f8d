//! Optional lifecycle manager for spawned work
//!
//! The executor abandons work that outlives its timeout budget; a
//! [`Supervisor`] is the one mechanism for reclaiming those orphans. Runs
//! that pass a supervisor get their handles registered with it, and
//! `shutdown()` aborts everything still in flight (e.g. on process
//! shutdown). The engine only ever adds work to a supervisor.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};

#[derive(Default)]
struct Registry {
    handles: Mutex<Vec<AbortHandle>>,
}

/// Tracks spawned handles so orphaned work can be aborted externally
#[derive(Clone, Default)]
pub struct Supervisor {
    registry: Arc<Registry>,
}

impl Supervisor {
    /// Create an empty supervisor
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a future and register its abort handle
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut handles = self.registry.handles.lock();
        // drop bookkeeping for work that already finished
        handles.retain(|h| !h.is_finished());
        handles.push(handle.abort_handle());
        handle
    }

    /// Number of registered, still-running units of work
    pub fn len(&self) -> usize {
        self.registry
            .handles
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Check if nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort every registered unit of work still in flight
    pub fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.registry.handles.lock());
        for handle in handles {
            handle.abort();
        }
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("in_flight", &self.len())
            .finish()
    }
}
