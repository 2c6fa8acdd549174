//! Self-transfer detection: flows whose start and end wallet coincide

use std::collections::BTreeMap;

use serde::Serialize;

use crate::flow::UserFlow;

/// Per-wallet self-transfer summary
#[derive(Debug, Clone, Serialize)]
pub struct SelfTransferFinding {
    pub wallet: String,
    pub transfer_count: usize,
    pub total_volume_usd: f64,
    pub avg_volume_usd: f64,
    pub avg_hop_count: f64,
}

/// Group self-transfer flows by wallet and aggregate count and volume.
/// Sorted by transfer count descending.
pub fn detect(flows: &[UserFlow]) -> Vec<SelfTransferFinding> {
    let mut by_wallet: BTreeMap<&str, Vec<&UserFlow>> = BTreeMap::new();

    for flow in flows.iter().filter(|f| f.is_self_transfer) {
        by_wallet.entry(flow.start_wallet.as_str()).or_default().push(flow);
    }

    let mut findings: Vec<SelfTransferFinding> = by_wallet
        .into_iter()
        .map(|(wallet, group)| {
            let count = group.len();
            let total: f64 = group.iter().map(|f| f.usd_value).sum();
            let hops: usize = group.iter().map(|f| f.hop_count).sum();
            SelfTransferFinding {
                wallet: wallet.to_string(),
                transfer_count: count,
                total_volume_usd: total,
                avg_volume_usd: total / count as f64,
                avg_hop_count: hops as f64 / count as f64,
            }
        })
        .collect();

    findings.sort_by(|a, b| b.transfer_count.cmp(&a.transfer_count));
    findings
}
