//! Typed endpoint payloads
//!
//! Raw JSON from the provider is validated and coerced here, at the
//! ingestion boundary, so feature extraction never probes dynamic
//! shapes. Every field the provider may omit is an `Option`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::provider::EndpointKind;

/// `/transfers` payload: the wallet's recent transfer history
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransfersPayload {
    #[serde(default)]
    pub transfers: Vec<TransferRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRecord {
    #[serde(rename = "historicalUSD")]
    pub historical_usd: Option<f64>,
    #[serde(rename = "blockTimestamp")]
    pub block_timestamp: Option<DateTime<Utc>>,
}

/// `/counterparties` payload, ordered by volume descending
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CounterpartiesPayload {
    #[serde(default)]
    pub counterparties: Vec<CounterpartyRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CounterpartyRecord {
    #[serde(rename = "totalVolumeUSD")]
    pub total_volume_usd: Option<f64>,
    #[serde(rename = "arkhamEntity")]
    pub entity: Option<EntityRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub name: Option<String>,
}

/// `/intelligence` payload: one record per chain the address is known on
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntelligencePayload(pub Vec<ChainIntelligence>);

#[derive(Debug, Clone, Deserialize)]
pub struct ChainIntelligence {
    #[serde(default)]
    pub tags: Vec<TagRecord>,
    #[serde(rename = "entityPredictions", default)]
    pub entity_predictions: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagRecord {
    pub name: Option<String>,
}

impl IntelligencePayload {
    /// Distinct tag names across all chains
    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .0
            .iter()
            .flat_map(|chain| chain.tags.iter())
            .filter_map(|tag| tag.name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn has_entity_prediction(&self) -> bool {
        self.0.iter().any(|chain| !chain.entity_predictions.is_empty())
    }
}

/// `/balances` payload: the wallet's token holdings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalancesPayload {
    #[serde(default)]
    pub balances: Vec<BalanceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceRecord {
    #[serde(rename = "balanceUSD")]
    pub balance_usd: Option<f64>,
}

/// `/flow` payload: inflow/outflow aggregates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowPayload {
    #[serde(default)]
    pub flows: Vec<FlowRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowRecord {
    #[serde(rename = "inflowUSD")]
    pub inflow_usd: Option<f64>,
    #[serde(rename = "outflowUSD")]
    pub outflow_usd: Option<f64>,
}

/// Everything fetched for one wallet. Absent endpoints stay `None`;
/// that is a valid state, not an error.
#[derive(Debug, Clone, Default)]
pub struct WalletSnapshot {
    pub wallet: String,
    pub transfers: Option<TransfersPayload>,
    pub counterparties: Option<CounterpartiesPayload>,
    pub intelligence: Option<IntelligencePayload>,
    pub balances: Option<BalancesPayload>,
    /// Fetched for report completeness; no features derive from it
    pub portfolio: Option<Value>,
    pub flow: Option<FlowPayload>,
}

impl WalletSnapshot {
    pub fn new(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            ..Default::default()
        }
    }

    /// Coerce one raw endpoint payload into its typed slot. Payloads
    /// that fail validation are treated as absent.
    pub fn ingest(&mut self, kind: EndpointKind, raw: Value) {
        match kind {
            EndpointKind::Transfers => self.transfers = coerce(&self.wallet, kind, raw),
            EndpointKind::Counterparties => self.counterparties = coerce(&self.wallet, kind, raw),
            EndpointKind::Intelligence => self.intelligence = coerce(&self.wallet, kind, raw),
            EndpointKind::Balances => self.balances = coerce(&self.wallet, kind, raw),
            EndpointKind::Portfolio => self.portfolio = Some(raw),
            EndpointKind::Flow => self.flow = coerce(&self.wallet, kind, raw),
        }
    }

    /// Number of endpoints that returned data
    pub fn available_endpoints(&self) -> usize {
        [
            self.transfers.is_some(),
            self.counterparties.is_some(),
            self.intelligence.is_some(),
            self.balances.is_some(),
            self.portfolio.is_some(),
            self.flow.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

fn coerce<T: serde::de::DeserializeOwned>(
    wallet: &str,
    kind: EndpointKind,
    raw: Value,
) -> Option<T> {
    match serde_json::from_value(raw) {
        Ok(payload) => Some(payload),
        Err(e) => {
            debug!(wallet, ?kind, error = %e, "Discarding malformed endpoint payload");
            None
        }
    }
}
