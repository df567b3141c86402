//! Application configuration: YAML file, environment overrides and
//! endpoint normalisation.

use std::path::Path;

use anyhow::{bail, Context, Result};
use leanindex_core::{EndpointConfig, IndexerConfig};
use serde::{Deserialize, Serialize};

use crate::logging::LogConfig;

/// Used when no config file is given.
pub const DEFAULT_CONFIG_YML: &str = r#"
leanapi:
  endpoint: "http://127.0.0.1:5052"

database:
  file: "./leanindex.db"

indexer:
  poll_interval_ms: 4000
  max_retries: 3
  retry_delay_ms: 2000
  backfill_batch_size: 20

logging:
  level: "info"
  json: false
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub leanapi: LeanApiConfig,
    pub database: DatabaseConfig,
    pub indexer: IndexerConfig,
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeanApiConfig {
    /// Single-endpoint shorthand, used only when `endpoints` is empty.
    pub endpoint: String,
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path.
    pub file: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: "./leanindex.db".into(),
        }
    }
}

impl AppConfig {
    /// Read `path` (or the embedded default), apply environment overrides
    /// and normalise the endpoint list.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("error opening config file {}", path.display()))?;
                Self::from_yaml(&raw)
                    .with_context(|| format!("error decoding config file {}", path.display()))?
            }
            None => Self::from_yaml(DEFAULT_CONFIG_YML).context("error decoding default config")?,
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.normalize()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// `LEANAPI_ENDPOINT` replaces the shorthand endpoint, `DATABASE_FILE`
    /// the database path. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("LEANAPI_ENDPOINT").filter(|v| !v.is_empty()) {
            self.leanapi.endpoint = endpoint;
        }
        if let Some(file) = lookup("DATABASE_FILE").filter(|v| !v.is_empty()) {
            self.database.file = file;
        }
    }

    /// Resolve the final endpoint list and copy it into the indexer config.
    ///
    /// An empty list with a shorthand endpoint becomes one endpoint named
    /// `default`. Unnamed endpoints take their URL host, or `endpoint-<n>`
    /// when the URL does not parse.
    pub fn normalize(&mut self) -> Result<()> {
        let api = &mut self.leanapi;
        if api.endpoints.is_empty() && !api.endpoint.is_empty() {
            api.endpoints = vec![EndpointConfig::new("default", api.endpoint.clone())];
        }

        for (idx, endpoint) in api.endpoints.iter_mut().enumerate() {
            if endpoint.name.is_empty() {
                endpoint.name = url::Url::parse(&endpoint.url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_else(|| format!("endpoint-{}", idx + 1));
            }
        }

        if api.endpoints.is_empty() {
            bail!("missing lean node endpoints (need at least 1 endpoint to run the indexer)");
        }

        self.indexer.endpoints = api.endpoints.clone();
        Ok(())
    }
}
