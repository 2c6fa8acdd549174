//! Temporal clustering: bursts of flows landing in the same short
//! window, a coordination fingerprint. Informational only.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::flow::UserFlow;

const SAMPLE_WALLET_LIMIT: usize = 5;

/// A time window with an unusual burst of flows
#[derive(Debug, Clone, Serialize)]
pub struct TemporalCluster {
    /// Window start (timestamp floored to the window boundary)
    pub window_start: DateTime<Utc>,
    pub transaction_count: usize,
    pub unique_wallets: usize,
    pub total_volume_usd: f64,
    pub sample_wallets: Vec<String>,
}

/// Floor each flow's timestamp to a `window_minutes` boundary and flag
/// windows holding at least `min_flows` flows.
pub fn detect(flows: &[UserFlow], window_minutes: i64, min_flows: usize) -> Vec<TemporalCluster> {
    let window_secs = window_minutes * 60;

    let mut by_window: BTreeMap<i64, Vec<&UserFlow>> = BTreeMap::new();
    for flow in flows {
        let floored = flow.timestamp.timestamp().div_euclid(window_secs) * window_secs;
        by_window.entry(floored).or_default().push(flow);
    }

    let mut clusters: Vec<TemporalCluster> = by_window
        .into_iter()
        .filter(|(_, group)| group.len() >= min_flows)
        .map(|(window_start, group)| {
            let mut wallets: HashSet<&str> = HashSet::new();
            for flow in &group {
                wallets.insert(flow.start_wallet.as_str());
                wallets.insert(flow.end_wallet.as_str());
            }
            let mut sample: Vec<String> = wallets.iter().map(|w| w.to_string()).collect();
            sample.sort();
            sample.truncate(SAMPLE_WALLET_LIMIT);

            TemporalCluster {
                window_start: Utc.timestamp_opt(window_start, 0).single().expect("valid epoch"),
                transaction_count: group.len(),
                unique_wallets: wallets.len(),
                total_volume_usd: group.iter().map(|f| f.usd_value).sum(),
                sample_wallets: sample,
            }
        })
        .collect();

    clusters.sort_by(|a, b| b.transaction_count.cmp(&a.transaction_count));
    clusters
}
