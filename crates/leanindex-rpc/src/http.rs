//! HTTP header source backed by `reqwest`.
//!
//! Issues `GET {base_url}/lean/v0/headers/{block_id}` and decodes the JSON
//! body into a [`Header`]. Root lengths are not checked here.

use std::time::Duration;

use async_trait::async_trait;
use leanindex_core::{BlockId, Header};
use url::Url;

use crate::error::FetchError;
use crate::source::HeaderSource;

/// Header source talking to one Lean API endpoint over HTTP.
pub struct HttpHeaderSource {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpHeaderSource {
    /// Create a source for `base_url` with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let base_url = base_url.into();
        let parsed =
            Url::parse(&base_url).map_err(|e| FetchError::InvalidUrl(format!("{base_url} ({e})")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "{base_url} (unsupported scheme '{}')",
                parsed.scheme()
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    /// Full request URL for a block identifier.
    pub fn endpoint_url(&self, id: &BlockId) -> String {
        format!("{}/lean/v0/headers/{id}", self.base_url)
    }

    fn map_transport(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }
        } else {
            FetchError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl HeaderSource for HttpHeaderSource {
    async fn fetch_header(&self, id: &BlockId) -> Result<Header, FetchError> {
        let url = self.endpoint_url(id);
        tracing::trace!(%url, "fetching header");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                status: resp.status().as_u16(),
                block_id: id.to_string(),
            });
        }

        let body = resp.bytes().await.map_err(|e| self.map_transport(e))?;
        serde_json::from_slice::<Header>(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn url(&self) -> &str {
        &self.base_url
    }
}
