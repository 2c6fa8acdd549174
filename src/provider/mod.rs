//! External collaborator seams
//!
//! The core consumes three upstream interfaces:
//! - a transfer source delivering raw multi-hop transfer batches
//! - a per-wallet multi-endpoint source (`fetch -> JSON | absent`)
//! - a holder-snapshot source delivering the ranked holder list
//!
//! Transport and authentication details live behind these traits; the
//! aggregator wraps any [`ProviderTransport`] with rate limiting,
//! caching and retries.

pub mod payloads;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::flow::TransferHop;
use crate::holders::HolderRecord;

/// The six per-wallet endpoint kinds exposed by the data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Transfers,
    Counterparties,
    Intelligence,
    Balances,
    Portfolio,
    Flow,
}

impl EndpointKind {
    /// Endpoint path for one wallet
    pub fn path(&self, wallet: &str) -> String {
        match self {
            EndpointKind::Transfers => "/transfers".to_string(),
            EndpointKind::Counterparties => format!("/counterparties/address/{wallet}"),
            EndpointKind::Intelligence => {
                format!("/intelligence/address_enriched/{wallet}/all")
            }
            EndpointKind::Balances => format!("/balances/address/{wallet}"),
            EndpointKind::Portfolio => format!("/portfolio/address/{wallet}"),
            EndpointKind::Flow => format!("/flow/address/{wallet}"),
        }
    }

    /// Query parameters for one wallet. Null-valued parameters are
    /// never emitted, keeping cache keys deterministic.
    pub fn params(&self, wallet: &str, time_window: &str) -> Vec<(String, String)> {
        match self {
            EndpointKind::Transfers => vec![
                ("base".to_string(), wallet.to_string()),
                ("timeLast".to_string(), time_window.to_string()),
                ("limit".to_string(), "100".to_string()),
            ],
            EndpointKind::Counterparties => vec![
                ("flow".to_string(), "either".to_string()),
                ("timeLast".to_string(), time_window.to_string()),
                ("limit".to_string(), "50".to_string()),
            ],
            EndpointKind::Intelligence => vec![
                ("includeTags".to_string(), "true".to_string()),
                ("includeEntityPredictions".to_string(), "true".to_string()),
                ("includeClusterIds".to_string(), "true".to_string()),
            ],
            _ => Vec::new(),
        }
    }

    pub const ALL: [EndpointKind; 6] = [
        EndpointKind::Transfers,
        EndpointKind::Counterparties,
        EndpointKind::Intelligence,
        EndpointKind::Balances,
        EndpointKind::Portfolio,
        EndpointKind::Flow,
    ];
}

/// Endpoint path prefixes with the strict 1 req/s budget
const HEAVY_ENDPOINTS: [&str; 6] = [
    "/transfers",
    "/counterparties/address/",
    "/counterparties/entity/",
    "/token/top_flow/",
    "/token/volume/",
    "/transfers/histogram",
];

/// Rate-limit class for a given endpoint path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    /// 1 request per second
    Heavy,
    /// 20 requests per second
    Standard,
}

impl RateClass {
    pub fn of(endpoint: &str) -> Self {
        if HEAVY_ENDPOINTS.iter().any(|heavy| endpoint.starts_with(heavy)) {
            RateClass::Heavy
        } else {
            RateClass::Standard
        }
    }

    /// Requests allowed per one-second window
    pub fn requests_per_second(&self) -> usize {
        match self {
            RateClass::Heavy => 1,
            RateClass::Standard => 20,
        }
    }
}

/// Outcome of one raw upstream call, before retry handling
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Ok(Value),
    /// HTTP 404: the resource legitimately does not exist
    NotFound,
    /// HTTP 429: over the provider's budget, backoff applies
    RateLimited,
    /// Connection failure, timeout, non-JSON body, 5xx
    TransportError(String),
}

/// Raw transport to the multi-endpoint provider. Implementations carry
/// their own authentication; no retry or rate limiting here.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn get(&self, endpoint: &str, params: &[(String, String)]) -> FetchOutcome;
}

/// Supplies raw transfer hop batches for one token
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// Partial or empty results mean "no analyzable flows", never a
    /// fatal error.
    async fn token_transfers(
        &self,
        token_address: &str,
        chain: &str,
        time_window: &str,
    ) -> Result<Vec<TransferHop>>;
}

/// Supplies the ranked holder snapshot for one token
#[async_trait]
pub trait HolderSource: Send + Sync {
    async fn token_holders(&self, token_address: &str, chain: &str) -> Result<Vec<HolderRecord>>;
}
