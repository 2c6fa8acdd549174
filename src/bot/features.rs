//! Per-wallet feature extraction from endpoint payloads
//!
//! Every feature is optional: a missing payload, or a payload without
//! the columns a feature needs, leaves the feature unset. The scorer
//! never treats an unset feature as a signal.

use chrono::Timelike;

use crate::provider::payloads::{
    BalancesPayload, CounterpartiesPayload, FlowPayload, IntelligencePayload, TransfersPayload,
    WalletSnapshot,
};

const BOT_KEYWORDS: [&str; 6] = ["bot", "mev", "flashbot", "arbitrage", "automated", "sniper"];

/// Feature vector for one wallet. Unset means the source payload was
/// absent or lacked the data.
#[derive(Debug, Clone, Default)]
pub struct WalletFeatures {
    pub wallet: String,

    // Transfers endpoint
    pub transfer_count: Option<usize>,
    pub total_volume_usd: Option<f64>,
    pub txs_per_hour: Option<f64>,
    pub off_hours_ratio: Option<f64>,
    pub time_regularity_cv: Option<f64>,
    pub value_cv: Option<f64>,
    pub avg_decimal_places: Option<f64>,

    // Counterparties endpoint
    pub unique_counterparties: Option<usize>,
    pub top_counterparty_ratio: Option<f64>,
    pub dex_ratio: Option<f64>,
    pub cex_ratio: Option<f64>,

    // Intelligence endpoint
    pub tag_count: Option<usize>,
    pub has_bot_tag: Option<bool>,
    pub has_entity_prediction: Option<bool>,

    // Balances endpoint
    pub token_diversity: Option<usize>,
    pub total_balance_usd: Option<f64>,
    pub portfolio_concentration: Option<f64>,

    // Flow endpoint
    pub flow_balance_ratio: Option<f64>,

    // Local flow table
    pub local_tx_count: usize,
    pub local_volume_usd: f64,
}

/// Builds a [`WalletFeatures`] from one wallet's snapshot
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn extract(snapshot: &WalletSnapshot) -> WalletFeatures {
        let mut features = WalletFeatures {
            wallet: snapshot.wallet.clone(),
            ..Default::default()
        };

        if let Some(transfers) = &snapshot.transfers {
            Self::transfer_features(transfers, &mut features);
        }
        if let Some(counterparties) = &snapshot.counterparties {
            Self::counterparty_features(counterparties, &mut features);
        }
        if let Some(intelligence) = &snapshot.intelligence {
            Self::intelligence_features(intelligence, &mut features);
        }
        if let Some(balances) = &snapshot.balances {
            Self::balance_features(balances, &mut features);
        }
        if let Some(flow) = &snapshot.flow {
            Self::flow_features(flow, &mut features);
        }

        features
    }

    fn transfer_features(payload: &TransfersPayload, features: &mut WalletFeatures) {
        if payload.transfers.is_empty() {
            return;
        }

        features.transfer_count = Some(payload.transfers.len());
        features.total_volume_usd = Some(
            payload
                .transfers
                .iter()
                .filter_map(|t| t.historical_usd)
                .sum(),
        );

        let mut timestamps: Vec<_> = payload
            .transfers
            .iter()
            .filter_map(|t| t.block_timestamp)
            .collect();
        if !timestamps.is_empty() {
            timestamps.sort();
            let span_hours = (*timestamps.last().unwrap() - timestamps[0]).num_seconds() as f64
                / 3600.0;
            features.txs_per_hour = Some(payload.transfers.len() as f64 / span_hours.max(1.0));

            let off_hours = timestamps.iter().filter(|t| t.hour() <= 6).count();
            features.off_hours_ratio = Some(off_hours as f64 / payload.transfers.len() as f64);

            let gaps: Vec<f64> = timestamps
                .windows(2)
                .map(|pair| (pair[1] - pair[0]).num_seconds() as f64)
                .collect();
            if !gaps.is_empty() {
                let (mean, std) = mean_std(&gaps);
                features.time_regularity_cv = Some(std / (mean + 1.0));
            }
        }

        let values: Vec<f64> = payload
            .transfers
            .iter()
            .filter_map(|t| t.historical_usd)
            .collect();
        if !values.is_empty() {
            let (mean, std) = mean_std(&values);
            features.value_cv = Some(std / (mean + 1.0));

            let decimal_sum: usize = values.iter().map(|v| decimal_places(*v)).sum();
            features.avg_decimal_places = Some(decimal_sum as f64 / values.len() as f64);
        }
    }

    fn counterparty_features(payload: &CounterpartiesPayload, features: &mut WalletFeatures) {
        if payload.counterparties.is_empty() {
            return;
        }
        let total = payload.counterparties.len();
        features.unique_counterparties = Some(total);

        let total_volume: f64 = payload
            .counterparties
            .iter()
            .filter_map(|cp| cp.total_volume_usd)
            .sum();
        if total_volume > 0.0 {
            // The payload is volume-ranked, the first row is the top
            // counterparty.
            if let Some(top) = payload.counterparties[0].total_volume_usd {
                features.top_counterparty_ratio = Some(top / total_volume);
            }
        }

        let entity_type_count = |wanted: &str| {
            payload
                .counterparties
                .iter()
                .filter(|cp| {
                    cp.entity
                        .as_ref()
                        .and_then(|e| e.entity_type.as_deref())
                        .map(|t| t == wanted)
                        .unwrap_or(false)
                })
                .count()
        };
        features.dex_ratio = Some(entity_type_count("dex") as f64 / total as f64);
        features.cex_ratio = Some(entity_type_count("cex") as f64 / total as f64);
    }

    fn intelligence_features(payload: &IntelligencePayload, features: &mut WalletFeatures) {
        let tags = payload.tag_names();
        features.tag_count = Some(tags.len());
        features.has_entity_prediction = Some(payload.has_entity_prediction());
        features.has_bot_tag = Some(tags.iter().any(|tag| {
            let lower = tag.to_lowercase();
            BOT_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
        }));
    }

    fn balance_features(payload: &BalancesPayload, features: &mut WalletFeatures) {
        if payload.balances.is_empty() {
            return;
        }
        features.token_diversity = Some(payload.balances.len());

        let total: f64 = payload.balances.iter().filter_map(|b| b.balance_usd).sum();
        features.total_balance_usd = Some(total);
        if total > 0.0 {
            let max = payload
                .balances
                .iter()
                .filter_map(|b| b.balance_usd)
                .fold(0.0f64, f64::max);
            features.portfolio_concentration = Some(max / total);
        }
    }

    fn flow_features(payload: &FlowPayload, features: &mut WalletFeatures) {
        if payload.flows.is_empty() {
            return;
        }
        let inflow: f64 = payload.flows.iter().filter_map(|f| f.inflow_usd).sum();
        let outflow: f64 = payload.flows.iter().filter_map(|f| f.outflow_usd).sum();
        if inflow + outflow > 0.0 {
            features.flow_balance_ratio = Some((inflow - outflow) / (inflow + outflow));
        }
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    // Sample standard deviation, n-1 denominator
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

/// Count significant decimal places of a USD amount, capped at ten
fn decimal_places(value: f64) -> usize {
    if value == 0.0 || !value.is_finite() {
        return 0;
    }
    let rendered = format!("{value:.10}");
    let trimmed = rendered.trim_end_matches('0');
    match trimmed.split_once('.') {
        Some((_, fraction)) => fraction.len(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EndpointKind;
    use serde_json::json;

    #[test]
    fn test_decimal_places() {
        assert_eq!(decimal_places(100.0), 0);
        assert_eq!(decimal_places(0.5), 1);
        assert_eq!(decimal_places(12.3456), 4);
        assert_eq!(decimal_places(0.0), 0);
    }

    #[test]
    fn test_missing_payloads_leave_features_unset() {
        let snapshot = WalletSnapshot::new("0xabc");
        let features = FeatureExtractor::extract(&snapshot);

        assert!(features.txs_per_hour.is_none());
        assert!(features.unique_counterparties.is_none());
        assert!(features.has_bot_tag.is_none());
        assert!(features.flow_balance_ratio.is_none());
    }

    #[test]
    fn test_transfer_timing_features() {
        let mut snapshot = WalletSnapshot::new("0xabc");
        // Four transfers spaced one hour apart, all between 01:00 and
        // 04:00 UTC.
        snapshot.ingest(
            EndpointKind::Transfers,
            json!({
                "transfers": [
                    {"historicalUSD": 10.0, "blockTimestamp": "2024-01-01T01:00:00Z"},
                    {"historicalUSD": 10.0, "blockTimestamp": "2024-01-01T02:00:00Z"},
                    {"historicalUSD": 10.0, "blockTimestamp": "2024-01-01T03:00:00Z"},
                    {"historicalUSD": 10.0, "blockTimestamp": "2024-01-01T04:00:00Z"},
                ]
            }),
        );
        let features = FeatureExtractor::extract(&snapshot);

        assert_eq!(features.transfer_count, Some(4));
        assert_eq!(features.total_volume_usd, Some(40.0));
        // 4 transfers over a 3 hour span
        assert!((features.txs_per_hour.unwrap() - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(features.off_hours_ratio, Some(1.0));
        // Perfectly regular gaps give a near-zero CV
        assert!(features.time_regularity_cv.unwrap() < 0.01);
        assert!(features.value_cv.unwrap() < 0.01);
    }

    #[test]
    fn test_counterparty_concentration() {
        let mut snapshot = WalletSnapshot::new("0xabc");
        snapshot.ingest(
            EndpointKind::Counterparties,
            json!({
                "counterparties": [
                    {"totalVolumeUSD": 90.0, "arkhamEntity": {"type": "dex"}},
                    {"totalVolumeUSD": 10.0, "arkhamEntity": {"type": "cex"}},
                ]
            }),
        );
        let features = FeatureExtractor::extract(&snapshot);

        assert_eq!(features.unique_counterparties, Some(2));
        assert_eq!(features.top_counterparty_ratio, Some(0.9));
        assert_eq!(features.dex_ratio, Some(0.5));
        assert_eq!(features.cex_ratio, Some(0.5));
    }

    #[test]
    fn test_bot_tag_keyword_match() {
        let mut snapshot = WalletSnapshot::new("0xabc");
        snapshot.ingest(
            EndpointKind::Intelligence,
            json!([
                {"tags": [{"name": "MEV Searcher"}], "entityPredictions": []}
            ]),
        );
        let features = FeatureExtractor::extract(&snapshot);

        assert_eq!(features.has_bot_tag, Some(true));
        assert_eq!(features.has_entity_prediction, Some(false));
        assert_eq!(features.tag_count, Some(1));
    }

    #[test]
    fn test_flow_balance_ratio() {
        let mut snapshot = WalletSnapshot::new("0xabc");
        snapshot.ingest(
            EndpointKind::Flow,
            json!({
                "flows": [{"inflowUSD": 55.0, "outflowUSD": 45.0}]
            }),
        );
        let features = FeatureExtractor::extract(&snapshot);
        assert!((features.flow_balance_ratio.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_portfolio_concentration() {
        let mut snapshot = WalletSnapshot::new("0xabc");
        snapshot.ingest(
            EndpointKind::Balances,
            json!({
                "balances": [
                    {"balanceUSD": 950.0},
                    {"balanceUSD": 50.0},
                ]
            }),
        );
        let features = FeatureExtractor::extract(&snapshot);

        assert_eq!(features.token_diversity, Some(2));
        assert_eq!(features.total_balance_usd, Some(1000.0));
        assert_eq!(features.portfolio_concentration, Some(0.95));
    }
}
