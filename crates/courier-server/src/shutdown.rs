//! Server-wide stop signal.
//!
//! The listener and every connection hold a clone of one
//! `CancellationToken`. Triggering it stops accepting, ends each
//! connection loop (releasing its sessions) and lets `axum::serve` return.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long [`Shutdown::drain`] waits by default.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Stop signal shared by the listener and all connections.
#[derive(Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// A signal that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to watch. Connections derive child tokens from it.
    pub fn signal(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Whether [`trigger`](Self::trigger) has been called.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fire the signal and wait up to `timeout` for `tasks`.
    ///
    /// Returns `false` if some task was still running when time ran out.
    pub async fn drain(&self, tasks: Vec<JoinHandle<()>>, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.trigger();
        info!(tasks = tasks.len(), timeout_secs = timeout.as_secs(), "draining");

        let finished = tokio::time::timeout(timeout, futures::future::join_all(tasks))
            .await
            .is_ok();
        if !finished {
            warn!(timeout_secs = timeout.as_secs(), "tasks still running after drain timeout");
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_reaches_every_signal() {
        let shutdown = Shutdown::new();
        let listener = shutdown.signal();
        let connection = shutdown.signal().child_token();
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        assert!(listener.is_cancelled());
        assert!(connection.is_cancelled());
    }

    #[tokio::test]
    async fn drain_waits_for_watchers() {
        let shutdown = Shutdown::new();
        let signal = shutdown.signal();
        let task = tokio::spawn(async move { signal.cancelled().await });

        assert!(shutdown.drain(vec![task], None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_on_stuck_tasks() {
        let shutdown = Shutdown::new();
        let stuck = tokio::spawn(tokio::time::sleep(Duration::from_secs(300)));

        assert!(!shutdown.drain(vec![stuck], Some(Duration::from_millis(100))).await);
        assert!(shutdown.is_triggered());
    }
}
