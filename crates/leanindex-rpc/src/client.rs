//! A single remote endpoint and its health state.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use leanindex_core::{BlockId, EndpointConfig, Header, IndexerConfig};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::http::HttpHeaderSource;
use crate::source::HeaderSource;

/// Point-in-time view of one client, for the service layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    pub name: String,
    pub url: String,
    pub is_healthy: bool,
    pub last_error: Option<String>,
    pub last_checked: DateTime<Utc>,
    /// Last header returned by a successful head fetch.
    pub last_head: Option<Header>,
}

struct HealthState {
    is_healthy: bool,
    last_error: Option<String>,
    last_checked: DateTime<Utc>,
    last_head: Option<Header>,
}

/// One endpoint: header lookups plus liveness tracking.
///
/// Health starts optimistic and is changed only by [`health_check`]. Plain
/// fetch failures are reported to the caller and leave the flag alone.
///
/// [`health_check`]: RemoteClient::health_check
pub struct RemoteClient {
    name: String,
    source: Arc<dyn HeaderSource>,
    health_timeout: Duration,
    state: RwLock<HealthState>,
}

impl RemoteClient {
    pub fn new(name: impl Into<String>, source: Arc<dyn HeaderSource>) -> Self {
        Self {
            name: name.into(),
            source,
            health_timeout: Duration::from_millis(IndexerConfig::default().health_timeout_ms),
            state: RwLock::new(HealthState {
                is_healthy: true,
                last_error: None,
                last_checked: Utc::now(),
                last_head: None,
            }),
        }
    }

    /// Build an HTTP-backed client from an endpoint descriptor.
    pub fn from_endpoint(
        endpoint: &EndpointConfig,
        config: &IndexerConfig,
    ) -> Result<Self, FetchError> {
        let source = HttpHeaderSource::new(endpoint.url.clone(), config.request_timeout())?;
        Ok(Self::new(endpoint.name.clone(), Arc::new(source))
            .with_health_timeout(config.health_timeout()))
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        self.source.url()
    }

    // ── Header lookups ──────────────────────────────────────────────────────

    pub async fn fetch(&self, id: &BlockId) -> Result<Header, FetchError> {
        self.source.fetch_header(id).await
    }

    /// Fetch the current head and remember it for status reporting.
    pub async fn get_head(&self) -> Result<Header, FetchError> {
        let head = self.fetch(&BlockId::Head).await?;
        self.write().last_head = Some(head.clone());
        Ok(head)
    }

    pub async fn get_genesis(&self) -> Result<Header, FetchError> {
        self.fetch(&BlockId::Genesis).await
    }

    pub async fn get_justified(&self) -> Result<Header, FetchError> {
        self.fetch(&BlockId::Justified).await
    }

    pub async fn get_finalized(&self) -> Result<Header, FetchError> {
        self.fetch(&BlockId::Finalized).await
    }

    pub async fn get_by_slot(&self, slot: u64) -> Result<Header, FetchError> {
        self.fetch(&BlockId::Slot(slot)).await
    }

    pub async fn get_by_root(&self, root: &[u8]) -> Result<Header, FetchError> {
        self.fetch(&BlockId::Root(root.to_vec())).await
    }

    /// Fetch `start..=end` one slot at a time. The first failure aborts the
    /// whole range. An inverted range yields nothing.
    pub async fn get_range(&self, start: u64, end: u64) -> Result<Vec<Header>, FetchError> {
        let mut headers = Vec::new();
        for slot in start..=end {
            match self.get_by_slot(slot).await {
                Ok(h) => headers.push(h),
                Err(e) => {
                    debug!(endpoint = %self.name, slot, error = %e, "range fetch aborted");
                    return Err(e);
                }
            }
        }
        Ok(headers)
    }

    // ── Health ──────────────────────────────────────────────────────────────

    /// Probe the head endpoint with the health timeout and record the result.
    ///
    /// The state lock is only taken to record the outcome, so readers are
    /// never held up by a slow endpoint.
    pub async fn health_check(&self) -> Result<(), FetchError> {
        let timeout = self.health_timeout;
        let result = match tokio::time::timeout(timeout, self.fetch(&BlockId::Head)).await {
            Ok(r) => r,
            Err(_) => Err(FetchError::Timeout {
                ms: timeout.as_millis() as u64,
            }),
        };

        let mut state = self.write();
        state.last_checked = Utc::now();
        match result {
            Ok(head) => {
                state.is_healthy = true;
                state.last_error = None;
                state.last_head = Some(head);
                drop(state);
                debug!(endpoint = %self.name, "health check passed");
                Ok(())
            }
            Err(e) => {
                state.is_healthy = false;
                state.last_error = Some(e.to_string());
                drop(state);
                warn!(endpoint = %self.name, error = %e, "health check failed");
                Err(e)
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.read().is_healthy
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn last_checked(&self) -> DateTime<Utc> {
        self.read().last_checked
    }

    pub fn last_head(&self) -> Option<Header> {
        self.read().last_head.clone()
    }

    pub fn status(&self) -> ClientStatus {
        let state = self.read();
        ClientStatus {
            name: self.name.clone(),
            url: self.url().to_string(),
            is_healthy: state.is_healthy,
            last_error: state.last_error.clone(),
            last_checked: state.last_checked,
            last_head: state.last_head.clone(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HealthState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HealthState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("name", &self.name)
            .field("url", &self.url())
            .field("is_healthy", &self.is_healthy())
            .finish()
    }
}
