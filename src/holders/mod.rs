//! Token holder concentration analysis
//!
//! Ranks the holder snapshot by holding percentage and derives the
//! concentration metrics the fusion layer consumes: top-3 and top-10
//! ratios, whale dominance and a Gini coefficient, plus the whale set
//! used for the risk multiplier.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::HolderConfig;

/// One holder from the provider's top-holders snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct HolderRecord {
    pub address: String,
    /// Entity or label name, "Wallet" when the address is unlabeled
    pub label: String,
    pub balance: f64,
    pub usd_value: f64,
    /// Share of the token's cap held, in [0,1]
    pub pct_of_cap: f64,
}

impl HolderRecord {
    /// Parse the provider's `addressTopHolders` payload for one chain.
    /// Rows without an address are skipped.
    pub fn from_top_holders_payload(raw: &Value, chain: &str) -> Vec<HolderRecord> {
        let Some(rows) = raw
            .get("addressTopHolders")
            .and_then(|h| h.get(chain))
            .and_then(|h| h.as_array())
        else {
            warn!(chain, "No holder list in snapshot payload");
            return Vec::new();
        };

        rows.iter()
            .filter_map(|entry| {
                let address_info = entry.get("address")?;
                let address = address_info.get("address")?.as_str()?.to_string();
                Some(HolderRecord {
                    address,
                    label: extract_label(address_info),
                    balance: entry.get("balance").and_then(Value::as_f64).unwrap_or(0.0),
                    usd_value: entry.get("usd").and_then(Value::as_f64).unwrap_or(0.0),
                    pct_of_cap: entry.get("pctOfCap").and_then(Value::as_f64).unwrap_or(0.0),
                })
            })
            .collect()
    }
}

fn extract_label(address_info: &Value) -> String {
    for key in ["arkhamEntity", "arkhamLabel"] {
        if let Some(name) = address_info
            .get(key)
            .and_then(|e| e.get("name"))
            .and_then(Value::as_str)
        {
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    "Wallet".to_string()
}

/// A holder after ranking, percentages in [0,100]
#[derive(Debug, Clone)]
pub struct RankedHolder {
    pub rank: usize,
    pub address: String,
    pub label: String,
    pub balance: f64,
    pub usd_value: f64,
    pub holding_pct: f64,
}

/// Concentration metrics over the full snapshot, percentages in [0,100]
#[derive(Debug, Clone, Default)]
pub struct ConcentrationMetrics {
    pub top_3_ratio: f64,
    pub top_10_ratio: f64,
    pub whale_dominance: f64,
    pub gini_coefficient: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HolderAnalysis {
    pub holders: Vec<RankedHolder>,
    pub metrics: ConcentrationMetrics,
    /// Top-N addresses by holding, consumed by the fusion whale rule
    pub whales: Vec<String>,
}

pub struct HolderConcentrationAnalyzer {
    config: HolderConfig,
}

impl HolderConcentrationAnalyzer {
    pub fn new(config: HolderConfig) -> Self {
        Self { config }
    }

    /// An empty snapshot yields zeroed metrics and an empty whale set,
    /// never an error.
    pub fn analyze(&self, records: &[HolderRecord]) -> HolderAnalysis {
        if records.is_empty() {
            return HolderAnalysis::default();
        }

        let mut holders: Vec<RankedHolder> = records
            .iter()
            .map(|r| RankedHolder {
                rank: 0,
                address: r.address.clone(),
                label: r.label.clone(),
                balance: r.balance,
                usd_value: r.usd_value,
                holding_pct: r.pct_of_cap * 100.0,
            })
            .collect();
        holders.sort_by(|a, b| {
            b.holding_pct
                .partial_cmp(&a.holding_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.address.cmp(&b.address))
        });
        for (i, holder) in holders.iter_mut().enumerate() {
            holder.rank = i + 1;
        }

        let metrics = ConcentrationMetrics {
            top_3_ratio: holders.iter().take(3).map(|h| h.holding_pct).sum(),
            top_10_ratio: holders.iter().take(10).map(|h| h.holding_pct).sum(),
            whale_dominance: holders[0].holding_pct,
            gini_coefficient: gini(&holders),
        };

        let whales: Vec<String> = holders
            .iter()
            .take(self.config.whale_top_n)
            .map(|h| h.address.clone())
            .collect();

        info!(
            holders = holders.len(),
            top_10_ratio = metrics.top_10_ratio,
            gini = metrics.gini_coefficient,
            whales = whales.len(),
            "Holder concentration computed"
        );

        HolderAnalysis {
            holders,
            metrics,
            whales,
        }
    }
}

/// Gini coefficient over holdings sorted ascending:
/// `(2·Σ i·xᵢ) / (n·Σ xᵢ) − (n+1)/n` with 1-based ranks.
fn gini(holders: &[RankedHolder]) -> f64 {
    let mut ascending: Vec<f64> = holders.iter().map(|h| h.holding_pct).collect();
    ascending.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = ascending.len() as f64;
    let total: f64 = ascending.iter().sum();
    if total == 0.0 {
        return 0.0;
    }

    let weighted: f64 = ascending
        .iter()
        .enumerate()
        .map(|(i, x)| (i as f64 + 1.0) * x)
        .sum();
    (2.0 * weighted) / (n * total) - (n + 1.0) / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(address: &str, pct: f64) -> HolderRecord {
        HolderRecord {
            address: address.to_string(),
            label: "Wallet".to_string(),
            balance: 0.0,
            usd_value: 0.0,
            pct_of_cap: pct,
        }
    }

    fn analyzer() -> HolderConcentrationAnalyzer {
        HolderConcentrationAnalyzer::new(HolderConfig::default())
    }

    #[test]
    fn test_empty_snapshot_is_zeroed() {
        let analysis = analyzer().analyze(&[]);
        assert!(analysis.holders.is_empty());
        assert!(analysis.whales.is_empty());
        assert_eq!(analysis.metrics.gini_coefficient, 0.0);
    }

    #[test]
    fn test_ranking_and_ratios() {
        let records = vec![
            record("0xsmall", 0.05),
            record("0xbig", 0.40),
            record("0xmid", 0.15),
        ];
        let analysis = analyzer().analyze(&records);

        assert_eq!(analysis.holders[0].address, "0xbig");
        assert_eq!(analysis.holders[0].rank, 1);
        assert_eq!(analysis.holders[2].address, "0xsmall");
        assert!((analysis.metrics.whale_dominance - 40.0).abs() < 1e-9);
        assert!((analysis.metrics.top_3_ratio - 60.0).abs() < 1e-9);
        assert!((analysis.metrics.top_10_ratio - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_gini_zero_for_equal_holdings() {
        let records: Vec<HolderRecord> = (0..10)
            .map(|i| record(&format!("0x{i}"), 0.1))
            .collect();
        let analysis = analyzer().analyze(&records);
        assert!(analysis.metrics.gini_coefficient.abs() < 1e-9);
    }

    #[test]
    fn test_gini_approaches_one_for_dominant_holder() {
        let mut records = vec![record("0xwhale", 0.99)];
        for i in 0..99 {
            records.push(record(&format!("0x{i}"), 0.0001));
        }
        let analysis = analyzer().analyze(&records);
        assert!(analysis.metrics.gini_coefficient > 0.9);
    }

    #[test]
    fn test_whale_set_respects_top_n() {
        let records: Vec<HolderRecord> = (0..60)
            .map(|i| record(&format!("0x{i:03}"), (60 - i) as f64 / 1000.0))
            .collect();
        let analysis = analyzer().analyze(&records);

        assert_eq!(analysis.whales.len(), 50);
        assert_eq!(analysis.whales[0], "0x000");
        assert!(!analysis.whales.contains(&"0x059".to_string()));
    }

    #[test]
    fn test_payload_parsing_with_label_fallback() {
        let raw = json!({
            "addressTopHolders": {
                "ethereum": [
                    {
                        "address": {
                            "address": "0xaaa",
                            "arkhamEntity": {"name": "Big Exchange"}
                        },
                        "balance": 1000.0,
                        "usd": 5000.0,
                        "pctOfCap": 0.25
                    },
                    {
                        "address": {"address": "0xbbb"},
                        "pctOfCap": 0.10
                    }
                ]
            }
        });
        let records = HolderRecord::from_top_holders_payload(&raw, "ethereum");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, "Big Exchange");
        assert_eq!(records[1].label, "Wallet");
        assert_eq!(records[1].balance, 0.0);
    }

    #[test]
    fn test_payload_missing_chain_is_empty() {
        let raw = json!({"addressTopHolders": {}});
        assert!(HolderRecord::from_top_holders_payload(&raw, "solana").is_empty());
    }
}
