//! Weighted heuristic bot scoring
//!
//! Six rule categories are scored independently, normalized to [0,1]
//! and combined with fixed weights. A rule only fires when its feature
//! was actually observed; an absent endpoint can never push a wallet
//! toward BOT.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bot::features::WalletFeatures;
use crate::config::BotConfig;
use crate::flow::UserFlow;

const WEIGHT_TIMING: f64 = 0.20;
const WEIGHT_PATTERNS: f64 = 0.20;
const WEIGHT_COUNTERPARTY: f64 = 0.20;
const WEIGHT_INTELLIGENCE: f64 = 0.25;
const WEIGHT_PORTFOLIO: f64 = 0.10;
const WEIGHT_FLOW: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotClassification {
    Bot,
    Uncertain,
    Human,
    /// No flows or data at all for this wallet
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    fn from_score(score: f64) -> Self {
        if score > 0.7 {
            Confidence::High
        } else if score > 0.4 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// One scored wallet
#[derive(Debug, Clone)]
pub struct WalletClassification {
    pub wallet: String,
    pub bot_score: f64,
    pub classification: BotClassification,
    pub confidence: Confidence,
    pub reasons: Vec<&'static str>,
    pub features: WalletFeatures,
}

pub struct BotScorer {
    config: BotConfig,
}

impl BotScorer {
    pub fn new(config: BotConfig) -> Self {
        Self { config }
    }

    /// Wallets with at least `min_wallet_transactions` flows on either
    /// side, ranked by flow count descending and truncated to the
    /// configured sample size. Ties break on wallet address so runs
    /// are reproducible.
    pub fn eligible_wallets(&self, flows: &[UserFlow]) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for flow in flows {
            *counts.entry(flow.start_wallet.as_str()).or_default() += 1;
            if !flow.is_self_transfer {
                *counts.entry(flow.end_wallet.as_str()).or_default() += 1;
            }
        }

        let mut ranked: Vec<(&str, usize)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= self.config.min_wallet_transactions)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut wallets: Vec<String> = ranked.into_iter().map(|(w, _)| w.to_string()).collect();
        if let Some(limit) = self.config.sample_size {
            wallets.truncate(limit);
        }

        info!(
            eligible = wallets.len(),
            min_transactions = self.config.min_wallet_transactions,
            "Selected wallets for classification"
        );
        wallets
    }

    /// Score one wallet's feature vector
    pub fn score(&self, features: WalletFeatures) -> WalletClassification {
        let mut reasons = Vec::new();

        // Timing: frequency, regularity, off-hours activity
        let mut timing = 0.0;
        if features
            .txs_per_hour
            .map(|v| v > self.config.high_frequency_txs_per_hour)
            .unwrap_or(false)
        {
            timing += 1.5;
            reasons.push("high_frequency");
        }
        if features.time_regularity_cv.map(|v| v < 0.5).unwrap_or(false) {
            timing += 1.5;
            reasons.push("regular_timing");
        }
        if features
            .off_hours_ratio
            .map(|v| v > self.config.off_hours_ratio)
            .unwrap_or(false)
        {
            timing += 2.0;
            reasons.push("off_hours_active");
        }

        // Value patterns: precision and consistency
        let mut patterns = 0.0;
        if features
            .avg_decimal_places
            .map(|v| v >= self.config.precision_decimals)
            .unwrap_or(false)
        {
            patterns += 1.5;
            reasons.push("precise_values");
        }
        if features.value_cv.map(|v| v < 0.3).unwrap_or(false) {
            patterns += 1.5;
            reasons.push("consistent_values");
        }

        // Counterparty structure
        let mut counterparty = 0.0;
        if features
            .unique_counterparties
            .map(|v| (v as f64) < self.config.counterparty_diversity)
            .unwrap_or(false)
        {
            counterparty += 2.0;
            reasons.push("limited_counterparties");
        }
        if features
            .top_counterparty_ratio
            .map(|v| v > 0.6)
            .unwrap_or(false)
        {
            counterparty += 2.0;
            reasons.push("concentrated_trading");
        }

        // Intelligence: an explicit bot tag dominates
        let mut intelligence = 0.0;
        if features.has_bot_tag.unwrap_or(false) {
            intelligence += 3.0;
            reasons.push("bot_tag_detected");
        } else if features.has_entity_prediction.unwrap_or(false) {
            intelligence += 1.0;
            reasons.push("known_entity");
        }

        // Portfolio shape
        let mut portfolio = 0.0;
        if features
            .portfolio_concentration
            .map(|v| v > 0.9)
            .unwrap_or(false)
        {
            portfolio += 1.0;
            reasons.push("concentrated_portfolio");
        }
        if features.token_diversity.map(|v| v < 3).unwrap_or(false) {
            portfolio += 1.0;
            reasons.push("low_diversity");
        }

        // Flow balance: near-equal in and out
        let mut flow = 0.0;
        if features
            .flow_balance_ratio
            .map(|v| v.abs() < 0.1)
            .unwrap_or(false)
        {
            flow += 1.0;
            reasons.push("balanced_flow");
        }

        let bot_score = (timing / 5.0) * WEIGHT_TIMING
            + (patterns / 3.0) * WEIGHT_PATTERNS
            + (counterparty / 4.0) * WEIGHT_COUNTERPARTY
            + (intelligence / 3.0) * WEIGHT_INTELLIGENCE
            + (portfolio / 2.0) * WEIGHT_PORTFOLIO
            + (flow / 1.0) * WEIGHT_FLOW;

        let classification = if bot_score > 0.6 {
            BotClassification::Bot
        } else if bot_score > 0.4 {
            BotClassification::Uncertain
        } else {
            BotClassification::Human
        };

        WalletClassification {
            wallet: features.wallet.clone(),
            bot_score,
            classification,
            confidence: Confidence::from_score(bot_score),
            reasons,
            features,
        }
    }

    /// Score a batch, sorted by bot score descending
    pub fn classify(&self, features: Vec<WalletFeatures>) -> Vec<WalletClassification> {
        let mut results: Vec<WalletClassification> =
            features.into_iter().map(|f| self.score(f)).collect();
        results.sort_by(|a, b| {
            b.bot_score
                .partial_cmp(&a.bot_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.wallet.cmp(&b.wallet))
        });

        let bots = results
            .iter()
            .filter(|r| r.classification == BotClassification::Bot)
            .count();
        info!(total = results.len(), bots, "Bot classification complete");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::test_util::flow;

    fn scorer() -> BotScorer {
        BotScorer::new(BotConfig::default())
    }

    fn empty_features(wallet: &str) -> WalletFeatures {
        WalletFeatures {
            wallet: wallet.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_features_scores_zero() {
        let result = scorer().score(empty_features("0xabc"));
        assert_eq!(result.bot_score, 0.0);
        assert_eq!(result.classification, BotClassification::Human);
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_all_rules_firing_scores_one() {
        let features = WalletFeatures {
            wallet: "0xbot".to_string(),
            txs_per_hour: Some(50.0),
            time_regularity_cv: Some(0.1),
            off_hours_ratio: Some(0.8),
            avg_decimal_places: Some(6.0),
            value_cv: Some(0.05),
            unique_counterparties: Some(2),
            top_counterparty_ratio: Some(0.95),
            has_bot_tag: Some(true),
            portfolio_concentration: Some(0.99),
            token_diversity: Some(1),
            flow_balance_ratio: Some(0.01),
            ..Default::default()
        };
        let result = scorer().score(features);

        assert!((result.bot_score - 1.0).abs() < 1e-9);
        assert_eq!(result.classification, BotClassification::Bot);
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.reasons.contains(&"bot_tag_detected"));
    }

    #[test]
    fn test_bot_tag_alone_contributes_quarter() {
        let features = WalletFeatures {
            wallet: "0xtag".to_string(),
            has_bot_tag: Some(true),
            ..Default::default()
        };
        let result = scorer().score(features);
        assert!((result.bot_score - 0.25).abs() < 1e-9);
        assert_eq!(result.classification, BotClassification::Human);
    }

    #[test]
    fn test_entity_prediction_without_bot_tag() {
        let features = WalletFeatures {
            wallet: "0xknown".to_string(),
            has_bot_tag: Some(false),
            has_entity_prediction: Some(true),
            ..Default::default()
        };
        let result = scorer().score(features);
        assert!(result.reasons.contains(&"known_entity"));
        assert!((result.bot_score - 0.25 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_flow_data_earns_no_flow_point() {
        // An unset balance ratio must not read as "perfectly balanced"
        let result = scorer().score(empty_features("0xquiet"));
        assert!(!result.reasons.contains(&"balanced_flow"));
    }

    #[test]
    fn test_eligibility_counts_both_sides() {
        let mut flows = Vec::new();
        for _ in 0..3 {
            flows.push(flow("0xaaa", "0xbbb", 100.0));
        }
        for _ in 0..2 {
            flows.push(flow("0xccc", "0xaaa", 100.0));
        }

        let config = BotConfig {
            min_wallet_transactions: 5,
            ..Default::default()
        };
        let eligible = BotScorer::new(config).eligible_wallets(&flows);
        // 0xaaa: 3 starts + 2 ends = 5; everyone else is below
        assert_eq!(eligible, vec!["0xaaa".to_string()]);
    }

    #[test]
    fn test_sample_size_truncates_ranking() {
        let mut flows = Vec::new();
        for _ in 0..4 {
            flows.push(flow("0xaaa", "0xbbb", 1.0));
        }
        for _ in 0..2 {
            flows.push(flow("0xccc", "0xddd", 1.0));
        }

        let config = BotConfig {
            min_wallet_transactions: 2,
            sample_size: Some(2),
            ..Default::default()
        };
        let eligible = BotScorer::new(config).eligible_wallets(&flows);
        // Both sides of the busy pair rank first
        assert_eq!(eligible, vec!["0xaaa".to_string(), "0xbbb".to_string()]);
    }
}
