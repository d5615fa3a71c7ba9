// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Remote host-config and artifact fetching
//!
//! One attempt per request. A failure ends the remote tier; the orchestrator
//! moves on to the local cache.

use crate::config::RunConfig;
use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use std::time::Duration;

const USER_AGENT: &str = concat!("aq-boss-updater/", env!("CARGO_PKG_VERSION"));

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Raw `KEY=VALUE` text for `hostname`
    async fn fetch_config(&self, hostname: &str) -> Result<String>;

    /// Binary artifact bytes for `name`
    async fn fetch_artifact(&self, name: &str) -> Result<Vec<u8>>;
}

/// Artifact name by convention: `<prefix>_<arch>-<version>`
pub fn artifact_name(prefix: &str, arch: &str, version: &str) -> String {
    format!("{prefix}_{arch}-{version}")
}

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    config_base_url: String,
    artifact_base_url: String,
    config_timeout: Duration,
    artifact_timeout: Duration,
}

impl HttpRemote {
    pub fn new(config: &RunConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UpdaterError::Fetch(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config_base_url: config.config_base_url.trim_end_matches('/').to_owned(),
            artifact_base_url: config.artifact_base_url.trim_end_matches('/').to_owned(),
            config_timeout: Duration::from_secs(config.config_timeout_secs),
            artifact_timeout: Duration::from_secs(config.artifact_timeout_secs),
        })
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| UpdaterError::Fetch(format!("GET {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(UpdaterError::Fetch(format!(
                "GET {url} returned status {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl RemoteSource for HttpRemote {
    async fn fetch_config(&self, hostname: &str) -> Result<String> {
        let url = format!("{}/{hostname}.conf", self.config_base_url);
        tracing::debug!("Fetching {url}");
        self.get(&url, self.config_timeout)
            .await?
            .text()
            .await
            .map_err(|e| UpdaterError::Fetch(format!("Failed to read config body: {e}")))
    }

    async fn fetch_artifact(&self, name: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{name}", self.artifact_base_url);
        tracing::debug!("Fetching {url}");
        let bytes = self
            .get(&url, self.artifact_timeout)
            .await?
            .bytes()
            .await
            .map_err(|e| UpdaterError::Fetch(format!("Failed to download bytes: {e}")))?;
        Ok(bytes.to_vec())
    }
}
