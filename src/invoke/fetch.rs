//! Idempotent HTTP fetches with bounded retry.
//!
//! Only GETs go through here: install script bodies, GitHub release
//! metadata and release assets. Running what was fetched is never retried.

use crate::error::ProvisionError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("workstation-provision/", env!("CARGO_PKG_VERSION"));
const GITHUB_API: &str = "https://api.github.com";

/// Bounded retry for idempotent requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    /// Delay before the second attempt; doubled after each failure.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt number `attempt` (1-based; the first has none).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.backoff.saturating_mul(1 << (attempt - 2).min(16))
    }
}

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl Release {
    /// Tag without a leading `v`.
    pub fn version(&self) -> &str {
        self.tag_name.strip_prefix('v').unwrap_or(&self.tag_name)
    }

    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// Source of remote content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, ProvisionError>;
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProvisionError>;
    async fn latest_release(&self, repo: &str) -> Result<Release, ProvisionError>;
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
    api_base: String,
}

/// Why a single attempt failed.
enum AttemptError {
    Retryable(String),
    Fatal(String),
}

impl HttpFetcher {
    pub fn new(retry: RetryPolicy) -> Result<Self, ProvisionError> {
        Self::with_api_base(retry, GITHUB_API)
    }

    pub fn with_api_base(retry: RetryPolicy, api_base: &str) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProvisionError::Config {
                message: format!("Cannot build HTTP client: {}", e),
                path: None,
                fix: "Check the system TLS configuration".to_string(),
            })?;
        Ok(Self {
            client,
            retry,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn attempt(&self, url: &str) -> Result<reqwest::Response, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(AttemptError::Retryable(format!("HTTP {}", status)))
        } else {
            Err(AttemptError::Fatal(format!("HTTP {}", status)))
        }
    }

    /// GET with retry, handing the successful response to `read`.
    async fn get_with_retry<T, F, Fut>(&self, url: &str, read: F) -> Result<T, ProvisionError>
    where
        F: Fn(reqwest::Response) -> Fut + Send + Sync,
        Fut: std::future::Future<Output = reqwest::Result<T>> + Send,
        T: Send,
    {
        let attempts = self.retry.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tracing::debug!("Retrying {} in {:?} (attempt {}/{})", url, delay, attempt, attempts);
                tokio::time::sleep(delay).await;
            }

            match self.attempt(url).await {
                Ok(response) => match read(response).await {
                    Ok(value) => return Ok(value),
                    Err(e) => last_error = e.to_string(),
                },
                Err(AttemptError::Retryable(message)) => last_error = message,
                Err(AttemptError::Fatal(message)) => {
                    return Err(network_failure(url, attempt, message));
                }
            }
            tracing::warn!("Fetch of {} failed (attempt {}/{}): {}", url, attempt, attempts, last_error);
        }

        Err(network_failure(url, attempts, last_error))
    }
}

fn network_failure(url: &str, attempts: u32, message: String) -> ProvisionError {
    ProvisionError::NetworkFetchFailure {
        url: url.to_string(),
        attempts,
        message,
        fix: "Check your internet connection and re-run provision; completed steps will be skipped"
            .to_string(),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, ProvisionError> {
        self.get_with_retry(url, |r| r.text()).await
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProvisionError> {
        self.get_with_retry(url, |r| async move { r.bytes().await.map(|b| b.to_vec()) })
            .await
    }

    async fn latest_release(&self, repo: &str) -> Result<Release, ProvisionError> {
        let url = format!("{}/repos/{}/releases/latest", self.api_base, repo);
        self.get_with_retry(&url, |r| r.json::<Release>()).await
    }
}
