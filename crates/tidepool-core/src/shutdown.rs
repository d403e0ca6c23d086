//! Shutdown coordination.
//!
//! The coordinator pairs a one-shot "stop" signal with a tracker counting
//! live connection handlers. The accept loop and every handler consult the
//! signal; the process waits on [`ShutdownCoordinator::await_drain`] before
//! exiting.
//!
//! Stopping is cooperative: a handler blocked on a client read only notices
//! the stop signal once the read returns. A second signal, force-close, is
//! raised after the drain grace period and interrupts blocked reads.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Result of waiting for handlers to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every handler finished on its own.
    Drained,
    /// The grace period elapsed and the remaining handlers were force-closed.
    ForceClosed {
        /// Handlers still running when force-close was raised.
        remaining: usize,
    },
}

/// Broadcast stop signal plus a count of outstanding handlers.
///
/// Cloning yields another handle to the same coordinator.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    requested: Arc<AtomicBool>,
    shutdown: CancellationToken,
    force_close: CancellationToken,
    tracker: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.
    ///
    /// Idempotent: only the first call sets the signal. Returns `true` if this
    /// call was the one that set it.
    pub fn request_shutdown(&self) -> bool {
        if self.requested.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already requested");
            return false;
        }

        info!(outstanding = self.tracker.len(), "Shutdown requested");
        self.tracker.close();
        self.shutdown.cancel();
        true
    }

    /// Check whether shutdown has been requested, without blocking.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Wait until shutdown is requested.
    pub async fn cancelled(&self) {
        self.shutdown.cancelled().await;
    }

    /// Raise the force-close signal, interrupting handlers blocked on reads.
    pub fn force_close(&self) {
        self.force_close.cancel();
    }

    /// Check whether force-close has been raised.
    #[must_use]
    pub fn is_force_closed(&self) -> bool {
        self.force_close.is_cancelled()
    }

    /// Wait until force-close is raised.
    pub async fn force_closed(&self) {
        self.force_close.cancelled().await;
    }

    /// Spawn a handler task and count it as outstanding until it finishes.
    pub fn track<F>(&self, handler: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(handler)
    }

    /// Get the number of handlers still running.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// Block until shutdown has been requested and every tracked handler has
    /// finished.
    pub async fn await_drain(&self) {
        self.tracker.wait().await;
        debug!("All handlers drained");
    }

    /// Wait for handlers to drain, force-closing whatever is left once
    /// `grace` elapses. `None` waits indefinitely.
    pub async fn await_drain_with_grace(&self, grace: Option<Duration>) -> DrainOutcome {
        let Some(grace) = grace else {
            self.await_drain().await;
            return DrainOutcome::Drained;
        };

        if tokio::time::timeout(grace, self.await_drain()).await.is_ok() {
            return DrainOutcome::Drained;
        }

        let remaining = self.outstanding();
        warn!(
            remaining,
            grace_ms = grace.as_millis() as u64,
            "Drain grace period elapsed, force-closing connections"
        );
        self.force_close();
        self.await_drain().await;
        DrainOutcome::ForceClosed { remaining }
    }
}
