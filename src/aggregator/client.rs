//! Authenticated HTTP transport for the upstream provider
//!
//! Translates raw responses into [`FetchOutcome`] values; retry and
//! rate-limit handling stay in the aggregator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::provider::{FetchOutcome, ProviderTransport};

/// Retry schedule shared by the aggregator's fetch loop
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay_secs: u64) -> Self {
        Self {
            max_retries,
            retry_delay: Duration::from_secs(retry_delay_secs),
        }
    }

    /// Exponential backoff applied after an upstream rate-limit reply
    pub fn rate_limit_backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(1u64 << attempt.min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1)
    }
}

/// reqwest-backed transport with API-key authentication
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Provider(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn get(&self, endpoint: &str, params: &[(String, String)]) -> FetchOutcome {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = match self
            .client
            .get(&url)
            .header("API-Key", &self.api_key)
            .query(params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchOutcome::TransportError(e.to_string()),
        };

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(endpoint, "Upstream returned 404");
                FetchOutcome::NotFound
            }
            StatusCode::TOO_MANY_REQUESTS => FetchOutcome::RateLimited,
            status if status.is_success() => match response.json::<Value>().await {
                Ok(payload) => FetchOutcome::Ok(payload),
                Err(e) => FetchOutcome::TransportError(format!("Invalid JSON body: {e}")),
            },
            status => FetchOutcome::TransportError(format!("HTTP {status} from {endpoint}")),
        }
    }
}
