//! Volume concentration: how much of the flow volume the busiest
//! wallets account for. Informational, never feeds the suspicious set.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::flow::UserFlow;

/// One ranked row of the concentration table
#[derive(Debug, Clone, Serialize)]
pub struct ConcentrationRow {
    pub rank: usize,
    pub wallet: String,
    pub total_volume_usd: f64,
    /// Share of total flow volume, in percent
    pub volume_percentage: f64,
    /// Running sum of shares down the ranking, in percent
    pub cumulative_percentage: f64,
    pub transaction_count: usize,
}

/// Rank wallets by combined inbound + outbound USD volume.
/// `top_n = usize::MAX` ranks the full wallet list.
pub fn analyze(flows: &[UserFlow], top_n: usize) -> Vec<ConcentrationRow> {
    let mut volume_by_wallet: BTreeMap<&str, f64> = BTreeMap::new();
    let mut tx_by_wallet: BTreeMap<&str, usize> = BTreeMap::new();

    // A self-transfer credits its wallet on both sides: it is inbound
    // and outbound volume at once.
    for flow in flows {
        *volume_by_wallet.entry(flow.start_wallet.as_str()).or_default() += flow.usd_value;
        *volume_by_wallet.entry(flow.end_wallet.as_str()).or_default() += flow.usd_value;
        *tx_by_wallet.entry(flow.start_wallet.as_str()).or_default() += 1;
        if !flow.is_self_transfer {
            *tx_by_wallet.entry(flow.end_wallet.as_str()).or_default() += 1;
        }
    }

    let total: f64 = volume_by_wallet.values().sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut ranked: Vec<(&str, f64)> = volume_by_wallet.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumulative = 0.0;
    ranked
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (wallet, volume))| {
            let share = volume / total * 100.0;
            cumulative += share;
            ConcentrationRow {
                rank: i + 1,
                wallet: wallet.to_string(),
                total_volume_usd: volume,
                volume_percentage: share,
                cumulative_percentage: cumulative,
                transaction_count: tx_by_wallet.get(wallet).copied().unwrap_or(0),
            }
        })
        .collect()
}
