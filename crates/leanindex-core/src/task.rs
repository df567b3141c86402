//! Cancellable periodic background task.
//!
//! Every background loop in the indexer (head polling, health checks) is a
//! [`PeriodicTask`]: a Tokio task that calls a tick closure once per period
//! until its [`CancellationToken`] fires. The token is a child of a caller
//! supplied parent, so a single shutdown signal stops every loop.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to a running periodic task. Dropping it cancels the task.
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `tick` to run every `period`, starting one period from now.
    ///
    /// Ticks never overlap: a tick that overruns the period causes the
    /// missed deadlines to be skipped, not queued. Cancelling `parent` or
    /// this handle stops the loop and abandons any in-flight tick at its
    /// next await point.
    pub fn spawn<F, Fut>(
        name: impl Into<String>,
        period: Duration,
        parent: &CancellationToken,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let token = parent.child_token();
        let loop_token = token.clone();
        let loop_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(task = %loop_name, period_ms = period.as_millis() as u64, "periodic task started");

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tick() => {}
                }
            }

            debug!(task = %loop_name, "periodic task stopped");
        });

        info!(task = %name, "started periodic task");
        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the task. Safe to call repeatedly and from any task.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token observed by the loop; clones may be handed to work the tick spawns.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel and wait for the loop to exit.
    pub async fn join(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            // A panicking tick surfaces as a JoinError; the loop is gone either way.
            let _ = handle.await;
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
