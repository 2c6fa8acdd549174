//! Shared data structures for flow extraction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity types treated as routing intermediaries.
///
/// Addresses of these types never count as flow endpoints.
pub const INTERMEDIARY_TYPES: [&str; 5] = ["dex", "cex", "dex_aggregator", "bridge", "mixer"];

/// One ledger movement within a transaction. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferHop {
    pub tx_hash: String,
    pub log_index: u64,
    pub from_address: String,
    pub to_address: String,
    /// Provider-assigned entity type of the sender, if known
    pub from_entity_type: Option<String>,
    /// Provider-assigned entity type of the receiver, if known
    pub to_entity_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub block_number: u64,
    pub usd_value: Option<f64>,
    pub token_symbol: Option<String>,
}

impl TransferHop {
    /// Whether the sender is a routing intermediary
    pub fn from_is_intermediary(&self) -> bool {
        is_intermediary(self.from_entity_type.as_deref())
    }

    /// Whether the receiver is a routing intermediary
    pub fn to_is_intermediary(&self) -> bool {
        is_intermediary(self.to_entity_type.as_deref())
    }

    /// Hops without identity cannot be attributed and are dropped up front
    pub fn has_identity(&self) -> bool {
        !self.tx_hash.is_empty() && !self.from_address.is_empty() && !self.to_address.is_empty()
    }
}

fn is_intermediary(entity_type: Option<&str>) -> bool {
    entity_type
        .map(|t| INTERMEDIARY_TYPES.contains(&t))
        .unwrap_or(false)
}

/// The start-to-end non-intermediary wallet pair attributed to one
/// transaction, after stripping intermediary hops.
///
/// Created once by the extractor; read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFlow {
    pub tx_hash: String,
    pub start_wallet: String,
    pub end_wallet: String,
    pub start_entity_type: Option<String>,
    pub end_entity_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub block_number: u64,
    /// Sum of USD values over every hop in the transaction
    pub usd_value: f64,
    pub token_symbol: Option<String>,
    /// Number of transfers in the transaction
    pub hop_count: usize,
    pub is_self_transfer: bool,
}

impl UserFlow {
    /// Canonical unordered wallet pair for pair-level detectors
    pub fn wallet_pair(&self) -> (String, String) {
        if self.start_wallet <= self.end_wallet {
            (self.start_wallet.clone(), self.end_wallet.clone())
        } else {
            (self.end_wallet.clone(), self.start_wallet.clone())
        }
    }

    /// Whether the given wallet appears on either end of the flow
    pub fn involves(&self, wallet: &str) -> bool {
        self.start_wallet == wallet || self.end_wallet == wallet
    }
}
