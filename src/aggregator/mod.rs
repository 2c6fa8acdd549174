//! Rate-limited, cached, concurrent endpoint aggregation
//!
//! Wraps any [`ProviderTransport`] with:
//! - per-class sliding-window rate limiting
//! - a TTL disk cache keyed on endpoint plus sorted parameters
//! - a retry loop distinguishing rate limits, missing resources and
//!   transport failures
//! - bounded-concurrency batch fetches with positional results

pub mod cache;
pub mod client;
pub mod rate_limit;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{AggregatorConfig, ProviderConfig};
use crate::error::Result;
use crate::provider::payloads::WalletSnapshot;
use crate::provider::{EndpointKind, FetchOutcome, ProviderTransport, RateClass};

pub use cache::{CachePolicy, DiskCache};
pub use client::{HttpTransport, RetryPolicy};
pub use rate_limit::SlidingWindowLimiter;

/// Cached, rate-limited front to the upstream provider
pub struct RateLimitedAggregator {
    transport: Arc<dyn ProviderTransport>,
    limiter: SlidingWindowLimiter,
    cache: DiskCache,
    retry: RetryPolicy,
    max_workers: usize,
}

impl RateLimitedAggregator {
    /// Build the production aggregator from configuration
    pub fn from_config(provider: &ProviderConfig, aggregator: &AggregatorConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(provider)?);
        Self::with_transport(transport, aggregator)
    }

    /// Build around an arbitrary transport
    pub fn with_transport(
        transport: Arc<dyn ProviderTransport>,
        config: &AggregatorConfig,
    ) -> Result<Self> {
        let cache = DiskCache::open(
            &config.cache_dir,
            CachePolicy::with_ttl_hours(config.cache_ttl_hours),
        )?;

        Ok(Self {
            transport,
            limiter: SlidingWindowLimiter::new(),
            cache,
            retry: RetryPolicy::new(config.max_retries, config.retry_delay_secs),
            max_workers: config.max_workers.max(1),
        })
    }

    /// Fetch one endpoint, consulting the cache first. Returns `None`
    /// when the resource does not exist or retries were exhausted;
    /// absence is data, not an error.
    pub async fn call(&self, endpoint: &str, params: &[(String, String)]) -> Option<Value> {
        if let Some(payload) = self.cache.get(endpoint, params).await {
            return Some(payload);
        }

        let class = RateClass::of(endpoint);
        let attempts = self.retry.max_retries.max(1);

        for attempt in 0..attempts {
            self.limiter.acquire(class).await;

            match self.transport.get(endpoint, params).await {
                FetchOutcome::Ok(payload) => {
                    self.cache.put(endpoint, params, &payload).await;
                    return Some(payload);
                }
                FetchOutcome::NotFound => return None,
                FetchOutcome::RateLimited => {
                    let backoff = self.retry.rate_limit_backoff(attempt);
                    warn!(endpoint, attempt, backoff_secs = backoff.as_secs(), "Rate limited upstream, backing off");
                    tokio::time::sleep(backoff).await;
                }
                FetchOutcome::TransportError(reason) => {
                    if attempt + 1 >= attempts {
                        warn!(endpoint, reason, "Giving up after transport errors");
                        return None;
                    }
                    debug!(endpoint, reason, attempt, "Transport error, retrying");
                    tokio::time::sleep(self.retry.retry_delay).await;
                }
            }
        }

        None
    }

    /// Run many calls with bounded concurrency. The result vector is
    /// positional: `results[i]` always belongs to `requests[i]`.
    pub async fn batch_call(
        &self,
        requests: Vec<(String, Vec<(String, String)>)>,
    ) -> Vec<Option<Value>> {
        stream::iter(requests)
            .map(|(endpoint, params)| async move { self.call(&endpoint, &params).await })
            .buffered(self.max_workers)
            .collect()
            .await
    }

    /// Fetch the configured endpoints for every wallet, folding each
    /// wallet's replies into one [`WalletSnapshot`]. Snapshot order
    /// matches wallet order.
    pub async fn fetch_wallet_snapshots(
        &self,
        wallets: &[String],
        endpoints: &[EndpointKind],
        time_window: &str,
    ) -> Vec<WalletSnapshot> {
        let mut requests = Vec::with_capacity(wallets.len() * endpoints.len());
        for wallet in wallets {
            for kind in endpoints {
                requests.push((kind.path(wallet), kind.params(wallet, time_window)));
            }
        }

        info!(
            wallets = wallets.len(),
            endpoints = endpoints.len(),
            requests = requests.len(),
            "Fetching wallet snapshots"
        );

        let results = self.batch_call(requests).await;

        let mut snapshots = Vec::with_capacity(wallets.len());
        let mut cursor = results.into_iter();
        for wallet in wallets {
            let mut snapshot = WalletSnapshot::new(wallet.clone());
            for kind in endpoints {
                if let Some(Some(raw)) = cursor.next() {
                    snapshot.ingest(*kind, raw);
                }
            }
            debug!(
                wallet = %snapshot.wallet,
                available = snapshot.available_endpoints(),
                "Snapshot assembled"
            );
            snapshots.push(snapshot);
        }
        snapshots
    }
}
