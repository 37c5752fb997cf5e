//! Handle to a running server.

use std::net::SocketAddr;

use tokio::sync::watch;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::WorkerState;

/// Owns the shutdown signal and the worker barrier of a started server.
///
/// [`shutdown`](Self::shutdown) consumes the handle, so the signal fires at
/// most once. Dropping the handle without calling it still signals the
/// worker to stop, but nothing waits for the endpoint to close.
#[derive(Debug)]
pub struct ServerHandle {
    shutdown: CancellationToken,
    tracker: TaskTracker,
    state: watch::Receiver<WorkerState>,
    local_addr: Option<SocketAddr>,
}

impl ServerHandle {
    pub(super) fn new(
        shutdown: CancellationToken,
        tracker: TaskTracker,
        state: watch::Receiver<WorkerState>,
        local_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            shutdown,
            tracker,
            state,
            local_addr,
        }
    }

    /// Signal the worker to stop and wait until it has exited.
    ///
    /// When this returns the endpoint is closed and no further ticks run.
    /// The worker notices the signal between ticks, so this may wait for an
    /// in-flight request to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.tracker.wait().await;
    }

    /// Current state of the worker loop.
    #[must_use]
    pub fn state(&self) -> WorkerState { *self.state.borrow() }

    /// Subscribe to worker state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> { self.state.clone() }

    /// Address the endpoint was bound to at startup.
    ///
    /// A recreated endpoint binds the configured address again, which may
    /// differ when the configured port is `0`.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { self.local_addr }
}

impl Drop for ServerHandle {
    fn drop(&mut self) { self.shutdown.cancel(); }
}
