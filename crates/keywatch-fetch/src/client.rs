//! HTTP client for the key server.

use crate::{parse_index, url::archive_url};
use async_trait::async_trait;
use bytes::Bytes;
use keywatch_detect::{ArchiveDownloader, ConfigurationSource, RemoteIndexSource};
use keywatch_types::{DownloadedPackage, ExposureConfiguration, FetchError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the key server client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URL of the newline-separated archive index.
    pub index_url: String,
    /// Host that relative index entries are resolved against.
    pub archive_base_url: String,
    /// URL of the matching configuration JSON.
    pub configuration_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Retry attempts for server errors and transient transport failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds).
    pub max_delay_ms: u64,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            index_url: "http://localhost:8080/exposureKeyExport/index.txt".to_string(),
            archive_base_url: "http://localhost:8080".to_string(),
            configuration_url: "http://localhost:8080/exposureConfiguration.json".to_string(),
            timeout_secs: 30,
            // Failed runs are retried by the next scheduled run
            max_retries: 0,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
            user_agent: format!("keywatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP client for the index, key archives and matching configuration.
#[derive(Debug, Clone)]
pub struct KeyServerClient {
    client: Client,
    config: ClientConfig,
}

impl KeyServerClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Creates a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(ClientConfig::default())
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches a URL, retrying server errors, rate limiting and transient
    /// transport failures.
    async fn get_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        let mut attempts = 0;

        loop {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let retryable = status.is_server_error()
                        || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
                    if retryable && attempts < self.config.max_retries {
                        attempts += 1;
                        warn!(url, status = status.as_u16(), attempts, "retrying request");
                        tokio::time::sleep(self.backoff_delay(attempts)).await;
                        continue;
                    }
                    if !status.is_success() {
                        return Err(FetchError::ServerError {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    return response
                        .bytes()
                        .await
                        .map_err(|e| FetchError::Http(e.to_string()));
                }
                Err(e) if is_retryable(&e) && attempts < self.config.max_retries => {
                    attempts += 1;
                    warn!(url, error = %e, attempts, "retrying request");
                    tokio::time::sleep(self.backoff_delay(attempts)).await;
                }
                Err(e) => return Err(FetchError::Http(e.to_string())),
            }
        }
    }

    /// Exponential backoff capped at the configured maximum.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(10))
            .min(self.config.max_delay_ms);
        Duration::from_millis(delay)
    }
}

fn is_retryable(error: &reqwest::Error) -> bool {
    if error.is_builder() {
        return false;
    }
    error.is_timeout() || error.is_connect() || error.is_request()
}

#[async_trait]
impl RemoteIndexSource for KeyServerClient {
    async fn fetch_index(&self) -> Result<Vec<String>, FetchError> {
        let url = &self.config.index_url;
        let body = self.get_bytes(url).await?;
        let text = std::str::from_utf8(&body).map_err(|e| FetchError::InvalidBody {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let paths = parse_index(text);
        debug!(url = %url, archives = paths.len(), "fetched archive index");
        Ok(paths)
    }
}

#[async_trait]
impl ArchiveDownloader for KeyServerClient {
    async fn download(&self, path: &str) -> Result<DownloadedPackage, FetchError> {
        let url = archive_url(&self.config.archive_base_url, path)?;
        let bytes = self.get_bytes(&url).await?;
        debug!(url = %url, bytes = bytes.len(), "downloaded key archive");
        Ok(DownloadedPackage::new(path.to_string(), bytes))
    }
}

#[async_trait]
impl ConfigurationSource for KeyServerClient {
    async fn fetch_configuration(&self) -> Result<ExposureConfiguration, FetchError> {
        let url = &self.config.configuration_url;
        let body = self.get_bytes(url).await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::InvalidBody {
            url: url.clone(),
            reason: e.to_string(),
        })
    }
}
