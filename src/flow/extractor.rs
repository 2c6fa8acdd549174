//! Extracts start-to-end user wallet flows from each transaction,
//! discarding all intermediary hops (DEX, CEX, bridges, mixers).

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::flow::types::{TransferHop, UserFlow};

/// Converts raw multi-hop transfer batches into user-to-user flow records
pub struct FlowExtractor;

impl FlowExtractor {
    /// Extract one `UserFlow` per transaction that has an attributable
    /// non-intermediary wallet on both ends.
    ///
    /// Transactions routed entirely through intermediaries produce no
    /// flow. That is expected for fully internal AMM routing, not an
    /// error.
    pub fn extract(hops: &[TransferHop]) -> Vec<UserFlow> {
        let total = hops.len();
        let usable: Vec<&TransferHop> = hops.iter().filter(|h| h.has_identity()).collect();
        if usable.len() < total {
            debug!(
                dropped = total - usable.len(),
                "Dropped hops with missing tx hash or addresses"
            );
        }

        // BTreeMap keeps transaction order deterministic across runs
        let mut groups: BTreeMap<&str, Vec<&TransferHop>> = BTreeMap::new();
        for hop in &usable {
            groups.entry(hop.tx_hash.as_str()).or_default().push(hop);
        }
        let tx_count = groups.len();

        let mut flows = Vec::new();

        for (tx_hash, mut group) in groups {
            group.sort_by_key(|h| h.log_index);

            // First non-intermediary sender walking forward
            let start = group.iter().find(|h| !h.from_is_intermediary());
            // Last non-intermediary receiver walking backward
            let end = group.iter().rev().find(|h| !h.to_is_intermediary());

            let (start, end) = match (start, end) {
                (Some(s), Some(e)) => (s, e),
                // Pure intermediary routing, silently dropped
                _ => continue,
            };

            let usd_value: f64 = group.iter().filter_map(|h| h.usd_value).sum();
            let first = group[0];

            flows.push(UserFlow {
                tx_hash: tx_hash.to_string(),
                start_wallet: start.from_address.clone(),
                end_wallet: end.to_address.clone(),
                start_entity_type: start.from_entity_type.clone(),
                end_entity_type: end.to_entity_type.clone(),
                timestamp: first.timestamp,
                block_number: first.block_number,
                usd_value,
                token_symbol: first.token_symbol.clone(),
                hop_count: group.len(),
                is_self_transfer: start.from_address == end.to_address,
            });
        }

        info!(
            flows = flows.len(),
            transactions = tx_count,
            filtered = tx_count - flows.len(),
            "Extracted user-to-user flows"
        );

        flows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn hop(
        tx: &str,
        idx: u64,
        from: &str,
        from_type: Option<&str>,
        to: &str,
        to_type: Option<&str>,
        usd: f64,
    ) -> TransferHop {
        TransferHop {
            tx_hash: tx.to_string(),
            log_index: idx,
            from_address: from.to_string(),
            to_address: to.to_string(),
            from_entity_type: from_type.map(String::from),
            to_entity_type: to_type.map(String::from),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            block_number: 100,
            usd_value: Some(usd),
            token_symbol: Some("WIF".to_string()),
        }
    }

    #[test]
    fn test_multi_hop_strips_intermediaries() {
        // wallet1 -> dex -> dex -> wallet2
        let hops = vec![
            hop("0x1", 0, "wallet1", None, "amm_pool", Some("dex"), 100.0),
            hop("0x1", 1, "amm_pool", Some("dex"), "router", Some("dex_aggregator"), 100.0),
            hop("0x1", 2, "router", Some("dex_aggregator"), "wallet2", None, 100.0),
        ];

        let flows = FlowExtractor::extract(&hops);
        assert_eq!(flows.len(), 1);
        let flow = &flows[0];
        assert_eq!(flow.start_wallet, "wallet1");
        assert_eq!(flow.end_wallet, "wallet2");
        assert_eq!(flow.hop_count, 3);
        // usd_value sums every hop, not just the matched ones
        assert!((flow.usd_value - 300.0).abs() < 1e-9);
        assert!(!flow.is_self_transfer);
    }

    #[test]
    fn test_all_intermediary_transaction_is_dropped() {
        let hops = vec![
            hop("0x2", 0, "pool_a", Some("dex"), "pool_b", Some("dex"), 50.0),
            hop("0x2", 1, "pool_b", Some("dex"), "pool_c", Some("dex"), 50.0),
        ];
        assert!(FlowExtractor::extract(&hops).is_empty());
    }

    #[test]
    fn test_self_transfer_invariant() {
        // wallet1 routes through a DEX back to itself
        let hops = vec![
            hop("0x3", 0, "wallet1", None, "pool", Some("dex"), 10.0),
            hop("0x3", 1, "pool", Some("dex"), "wallet1", None, 10.0),
        ];
        let flows = FlowExtractor::extract(&hops);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].start_wallet, flows[0].end_wallet);
        assert!(flows[0].is_self_transfer);
    }

    #[test]
    fn test_null_identity_hops_are_dropped() {
        let mut bad = hop("0x4", 0, "wallet1", None, "wallet2", None, 5.0);
        bad.from_address = String::new();
        let good = hop("0x5", 0, "wallet3", None, "wallet4", None, 5.0);

        let flows = FlowExtractor::extract(&[bad, good]);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].tx_hash, "0x5");
    }

    #[test]
    fn test_log_index_order_decides_endpoints() {
        // Delivered out of order; sorted by log_index the sender of the
        // first hop and receiver of the last hop win.
        let hops = vec![
            hop("0x6", 2, "mid", None, "final_wallet", None, 1.0),
            hop("0x6", 0, "origin_wallet", None, "mid", None, 1.0),
            hop("0x6", 1, "mid", None, "mid2", None, 1.0),
        ];
        let flows = FlowExtractor::extract(&hops);
        assert_eq!(flows[0].start_wallet, "origin_wallet");
        assert_eq!(flows[0].end_wallet, "final_wallet");
    }
}
