//! High-frequency pair detection: wallet pairs trading with each other
//! far more often than organic transfers would.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::flow::UserFlow;

/// A wallet pair flagged for high transfer frequency
#[derive(Debug, Clone, Serialize)]
pub struct HighFrequencyFinding {
    pub wallet_a: String,
    pub wallet_b: String,
    pub transaction_count: usize,
    pub total_volume_usd: f64,
    pub avg_volume_usd: f64,
    pub time_span_days: f64,
    pub transactions_per_day: f64,
    /// min(direction count) / max(direction count); 0 when one
    /// direction is empty
    pub bidirectional_ratio: f64,
}

/// Flag unordered pairs with at least `min_transactions` flows
pub fn detect(flows: &[UserFlow], min_transactions: usize) -> Vec<HighFrequencyFinding> {
    let mut by_pair: BTreeMap<(String, String), Vec<&UserFlow>> = BTreeMap::new();
    for flow in flows {
        by_pair.entry(flow.wallet_pair()).or_default().push(flow);
    }

    let mut findings = Vec::new();

    for ((wallet_a, wallet_b), group) in by_pair {
        if group.len() < min_transactions {
            continue;
        }

        let count = group.len();
        let total: f64 = group.iter().map(|f| f.usd_value).sum();

        let first = group.iter().map(|f| f.timestamp).min().expect("non-empty group");
        let last = group.iter().map(|f| f.timestamp).max().expect("non-empty group");
        let span_days = (last - first).num_seconds() as f64 / 86400.0;
        let per_day = count as f64 / if span_days > 0.0 { span_days } else { 1.0 };

        // Counted independently per direction; for the degenerate
        // self-pair (A, A) both counts cover every flow, ratio 1.
        let a_to_b = group.iter().filter(|f| f.start_wallet == wallet_a).count();
        let b_to_a = group.iter().filter(|f| f.start_wallet == wallet_b).count();
        let bidirectional_ratio = if a_to_b.max(b_to_a) == 0 {
            0.0
        } else {
            a_to_b.min(b_to_a) as f64 / a_to_b.max(b_to_a) as f64
        };

        findings.push(HighFrequencyFinding {
            wallet_a,
            wallet_b,
            transaction_count: count,
            total_volume_usd: total,
            avg_volume_usd: total / count as f64,
            time_span_days: span_days,
            transactions_per_day: per_day,
            bidirectional_ratio,
        });
    }

    findings.sort_by(|a, b| b.transaction_count.cmp(&a.transaction_count));
    findings
}
