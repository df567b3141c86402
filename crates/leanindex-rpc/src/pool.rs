//! Multi-endpoint client pool with primary preference and health checks.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use futures::future::join_all;
use leanindex_core::{IndexerConfig, IndexerError, PeriodicTask};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{ClientStatus, RemoteClient};

/// Owns the endpoint clients and picks one for each operation.
///
/// The first client is the primary and is preferred whenever it is healthy.
/// Other clients are used as fallbacks in pool order.
pub struct ClientPool {
    clients: Vec<Arc<RemoteClient>>,
    health_interval: Duration,
    health_task: Mutex<Option<HealthLoop>>,
}

/// The running health loop plus the token shared by the checks it spawns.
struct HealthLoop {
    task: PeriodicTask,
    checks: CancellationToken,
}

impl ClientPool {
    pub fn new(clients: Vec<Arc<RemoteClient>>) -> Self {
        Self {
            clients,
            health_interval: IndexerConfig::default().health_check_interval(),
            health_task: Mutex::new(None),
        }
    }

    /// Build HTTP clients for every configured endpoint.
    pub fn from_config(config: &IndexerConfig) -> Result<Self, IndexerError> {
        if config.endpoints.is_empty() {
            return Err(IndexerError::NoEndpoints);
        }
        let clients = config
            .endpoints
            .iter()
            .map(|ep| {
                RemoteClient::from_endpoint(ep, config)
                    .map(Arc::new)
                    .map_err(|e| IndexerError::Config(format!("endpoint '{}': {e}", ep.name)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(clients).with_health_interval(config.health_check_interval()))
    }

    pub fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    // ── Selection ───────────────────────────────────────────────────────────

    /// The primary if healthy, else the first healthy client in pool order.
    pub fn get_healthy_client(&self) -> Option<Arc<RemoteClient>> {
        let found = self.first_healthy(|_| true);
        if found.is_none() {
            warn!("No healthy clients available");
        }
        found
    }

    /// Like [`get_healthy_client`](Self::get_healthy_client) but never
    /// returns `exclude`. Used to fail over after a fetch error.
    pub fn healthy_client_excluding(&self, exclude: &RemoteClient) -> Option<Arc<RemoteClient>> {
        self.first_healthy(|c| !std::ptr::eq(Arc::as_ptr(c), exclude))
    }

    fn first_healthy(&self, allow: impl Fn(&Arc<RemoteClient>) -> bool) -> Option<Arc<RemoteClient>> {
        // clients[0] is the primary, so pool order already prefers it.
        self.clients
            .iter()
            .find(|c| allow(c) && c.is_healthy())
            .cloned()
    }

    /// The primary client regardless of health.
    pub fn primary(&self) -> Option<&Arc<RemoteClient>> {
        self.clients.first()
    }

    pub fn clients(&self) -> &[Arc<RemoteClient>] {
        &self.clients
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn healthy_client_count(&self) -> usize {
        self.clients.iter().filter(|c| c.is_healthy()).count()
    }

    /// Per-client status in pool order.
    pub fn statuses(&self) -> Vec<ClientStatus> {
        self.clients.iter().map(|c| c.status()).collect()
    }

    // ── Health checking ─────────────────────────────────────────────────────

    /// Check every client concurrently and wait for all of them.
    /// Returns the number of healthy clients afterwards.
    pub async fn check_all(&self) -> usize {
        join_all(self.clients.iter().map(|c| c.health_check())).await;
        self.healthy_client_count()
    }

    /// Start the background health-check loop.
    ///
    /// Each tick fires one independent check per client, so a hung endpoint
    /// only delays its own status. Calling this while a loop is already
    /// active is a no-op.
    pub fn run_health_checks(self: &Arc<Self>, parent: &CancellationToken) {
        let mut slot = self.task_slot();
        if slot.as_ref().is_some_and(|l| !l.task.is_cancelled()) {
            warn!("Health checking already running");
            return;
        }

        let pool: Weak<Self> = Arc::downgrade(self);
        let checks = parent.child_token();
        let tick_checks = checks.clone();
        let task = PeriodicTask::spawn(
            "health-checks",
            self.health_interval,
            &checks,
            move || {
                let pool = pool.clone();
                let checks = tick_checks.clone();
                async move {
                    let Some(pool) = pool.upgrade() else { return };
                    pool.spawn_checks(&checks);
                }
            },
        );

        *slot = Some(HealthLoop { task, checks });
        info!(
            clients = self.clients.len(),
            interval_ms = self.health_interval.as_millis() as u64,
            "Health checking started"
        );
    }

    fn spawn_checks(&self, token: &CancellationToken) {
        for client in &self.clients {
            let client = Arc::clone(client);
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    res = client.health_check() => {
                        if let Err(e) = res {
                            warn!(endpoint = %client.name(), error = %e, "Client health check failed");
                        }
                    }
                }
            });
        }
    }

    /// Stop the background loop. Safe to call when it was never started.
    pub fn stop_health_checks(&self) {
        if let Some(running) = self.task_slot().take() {
            // Cancels the loop and any checks still in flight.
            running.checks.cancel();
            info!("Health checking stopped");
        }
    }

    pub fn is_health_checking(&self) -> bool {
        self.task_slot().as_ref().is_some_and(|l| !l.task.is_cancelled())
    }

    fn task_slot(&self) -> std::sync::MutexGuard<'_, Option<HealthLoop>> {
        self.health_task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
