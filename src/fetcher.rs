use chrono::{DateTime, Utc};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::retry::{self, Policy, Retryable};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect(),
            FetchError::Status(status) => *status == 429 || (500..=599).contains(status),
        }
    }
}

/// Raw HTML for a fetched page. Consumed by the cleaner and discarded.
#[derive(Debug, Clone)]
pub struct PageDocument {
    pub url: String,
    pub raw_html: String,
    pub fetched_at: DateTime<Utc>,
}

/// Fetches raw HTML over a shared connection pool, retrying transient
/// failures with linear backoff.
pub struct Fetcher {
    http: Client,
    policy: Policy,
}

impl Fetcher {
    pub fn new(cfg: &PipelineConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(cfg.fetch_timeout)
            .build()?;
        Ok(Self {
            http,
            policy: Policy::linear(cfg.fetch_retries, cfg.fetch_backoff),
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<PageDocument, FetchError> {
        retry::run(self.policy, "fetch", || self.fetch_once(url)).await
    }

    async fn fetch_once(&self, url: &str) -> Result<PageDocument, FetchError> {
        debug!("Fetching {}", url);
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let raw_html = response.text().await?;
        Ok(PageDocument {
            url: url.to_string(),
            raw_html,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(FetchError::Status(429).is_retryable());
        assert!(FetchError::Status(500).is_retryable());
        assert!(FetchError::Status(503).is_retryable());
    }

    #[test]
    fn client_errors_are_terminal() {
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::Status(403).is_retryable());
        assert!(!FetchError::Status(400).is_retryable());
    }
}
