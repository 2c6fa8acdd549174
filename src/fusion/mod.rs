//! Risk fusion
//!
//! Merges the three upstream signals into per-wallet risk profiles and
//! a token-level aggregate:
//! - bot score contributes up to 50 points
//! - wash-trading flags contribute 15 points each, capped at 50
//! - whale membership forces 100 for wash-flagged or BOT wallets and
//!   adds a flat 20 otherwise

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::bot::{BotClassification, Confidence, WalletClassification};
use crate::detect::WashFindings;
use crate::holders::ConcentrationMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            RiskLevel::Critical
        } else if score >= 50.0 {
            RiskLevel::High
        } else if score >= 25.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Cross-signal threat tier, independent of the numeric score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatTier {
    /// Classified BOT and wash-flagged
    Critical,
    /// Classified BOT or wash-flagged
    High,
    /// Classified UNCERTAIN
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletRiskProfile {
    pub wallet: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub bot_score: f64,
    pub bot_classification: BotClassification,
    /// Unset for wallets that were never bot-classified
    pub bot_confidence: Option<Confidence>,
    pub is_wash_trading: bool,
    pub wash_flags: Vec<&'static str>,
    pub wash_flag_count: usize,
    pub is_top_holder: bool,
    pub threat: ThreatTier,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenRiskSummary {
    pub token_risk_score: f64,
    pub concentration_risk: f64,
    pub bot_activity_risk: f64,
    pub wash_trading_risk: f64,
    pub bot_ratio: f64,
    pub wash_ratio: f64,
}

pub struct RiskFusionEngine;

impl RiskFusionEngine {
    /// Fuse the three signals into per-wallet profiles, sorted by risk
    /// score descending. The wallet universe is the union of the
    /// bot-classified wallets and the detectors' suspicious set.
    pub fn fuse(
        classifications: &[WalletClassification],
        findings: &WashFindings,
        whales: &[String],
    ) -> Vec<WalletRiskProfile> {
        let by_wallet: HashMap<&str, &WalletClassification> = classifications
            .iter()
            .map(|c| (c.wallet.as_str(), c))
            .collect();
        let suspicious = findings.suspicious_wallets();
        let whale_set: std::collections::HashSet<&str> =
            whales.iter().map(String::as_str).collect();

        let mut universe: Vec<String> = by_wallet.keys().map(|w| w.to_string()).collect();
        for wallet in &suspicious {
            if !by_wallet.contains_key(wallet.as_str()) {
                universe.push(wallet.clone());
            }
        }
        universe.sort();

        let mut profiles: Vec<WalletRiskProfile> = universe
            .into_iter()
            .map(|wallet| {
                let (bot_score, bot_classification, bot_confidence) =
                    match by_wallet.get(wallet.as_str()) {
                        Some(c) => (c.bot_score, c.classification, Some(c.confidence)),
                        None => (0.0, BotClassification::Unknown, None),
                    };

                let is_wash_trading = suspicious.contains(&wallet);
                let wash_flags = findings.wash_flags(&wallet);
                let is_top_holder = whale_set.contains(wallet.as_str());

                let risk_score = Self::wallet_risk_score(
                    bot_score,
                    bot_classification,
                    is_wash_trading,
                    wash_flags.len(),
                    is_top_holder,
                );

                let is_bot = bot_classification == BotClassification::Bot;
                let threat = if is_bot && is_wash_trading {
                    ThreatTier::Critical
                } else if is_bot || is_wash_trading {
                    ThreatTier::High
                } else if bot_classification == BotClassification::Uncertain {
                    ThreatTier::Medium
                } else {
                    ThreatTier::Low
                };

                WalletRiskProfile {
                    wallet,
                    risk_score,
                    risk_level: RiskLevel::from_score(risk_score),
                    bot_score,
                    bot_classification,
                    bot_confidence,
                    is_wash_trading,
                    wash_flag_count: wash_flags.len(),
                    wash_flags,
                    is_top_holder,
                    threat,
                }
            })
            .collect();

        profiles.sort_by(|a, b| {
            b.risk_score
                .partial_cmp(&a.risk_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.wallet.cmp(&b.wallet))
        });

        let whale_threats = profiles
            .iter()
            .filter(|p| {
                p.is_top_holder
                    && matches!(p.risk_level, RiskLevel::Critical | RiskLevel::High)
            })
            .count();
        if whale_threats > 0 {
            warn!(whale_threats, "Top holders flagged as high or critical risk");
        }
        info!(wallets = profiles.len(), "Risk fusion complete");

        profiles
    }

    fn wallet_risk_score(
        bot_score: f64,
        bot_classification: BotClassification,
        is_wash_trading: bool,
        wash_flag_count: usize,
        is_top_holder: bool,
    ) -> f64 {
        let mut score = bot_score * 50.0;

        if is_wash_trading {
            score += (wash_flag_count as f64 * 15.0).min(50.0);
        }

        if is_top_holder {
            if is_wash_trading || bot_classification == BotClassification::Bot {
                score = 100.0;
            } else {
                score += 20.0;
            }
        }

        score.min(100.0)
    }

    /// Token-level aggregate over the fused profiles. Saturation
    /// multipliers treat 10% top-holder concentration, 30% bot ratio
    /// and 20% wash ratio as maximal component risk.
    pub fn token_summary(
        profiles: &[WalletRiskProfile],
        metrics: &ConcentrationMetrics,
    ) -> TokenRiskSummary {
        let mut concentration_risk = (metrics.top_10_ratio * 1.25).min(100.0);
        if metrics.gini_coefficient > 0.9 {
            concentration_risk = concentration_risk.max(90.0);
        }

        let total = profiles.len();
        let (bot_ratio, wash_ratio) = if total > 0 {
            let bots = profiles
                .iter()
                .filter(|p| p.bot_classification == BotClassification::Bot)
                .count();
            let washers = profiles.iter().filter(|p| p.is_wash_trading).count();
            (bots as f64 / total as f64, washers as f64 / total as f64)
        } else {
            (0.0, 0.0)
        };

        let bot_activity_risk = (bot_ratio * 333.0).min(100.0);
        let wash_trading_risk = (wash_ratio * 500.0).min(100.0);

        let token_risk_score = concentration_risk * 0.40
            + bot_activity_risk * 0.30
            + wash_trading_risk * 0.30;

        info!(
            token_risk_score,
            concentration_risk, bot_activity_risk, wash_trading_risk, "Token risk computed"
        );

        TokenRiskSummary {
            token_risk_score,
            concentration_risk,
            bot_activity_risk,
            wash_trading_risk,
            bot_ratio,
            wash_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::WalletFeatures;
    use crate::detect::test_util::flow;
    use crate::detect::DetectorSuite;

    fn classification(wallet: &str, bot_score: f64) -> WalletClassification {
        let classification = if bot_score > 0.6 {
            BotClassification::Bot
        } else if bot_score > 0.4 {
            BotClassification::Uncertain
        } else {
            BotClassification::Human
        };
        WalletClassification {
            wallet: wallet.to_string(),
            bot_score,
            classification,
            confidence: Confidence::Low,
            reasons: Vec::new(),
            features: WalletFeatures::default(),
        }
    }

    #[test]
    fn test_pure_bot_scores_fifty() {
        let profiles = RiskFusionEngine::fuse(
            &[classification("0xbot", 1.0)],
            &WashFindings::default(),
            &[],
        );

        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].risk_score, 50.0);
        assert_eq!(profiles[0].risk_level, RiskLevel::High);
        assert_eq!(profiles[0].threat, ThreatTier::High);
    }

    #[test]
    fn test_wash_flags_saturate_at_fifty() {
        // Four flags would be 60 points unclamped
        let findings = DetectorSuite::new(Default::default()).run(&washy_flows());
        let flags = findings.wash_flags("0xwash");
        assert!(flags.len() >= 4, "expected at least four flags, got {flags:?}");

        let profiles = RiskFusionEngine::fuse(&[classification("0xwash", 0.0)], &findings, &[]);
        let profile = profiles.iter().find(|p| p.wallet == "0xwash").unwrap();
        assert_eq!(profile.risk_score, 50.0);
    }

    // A wallet hitting self-transfer, round-trip, high-frequency and
    // volume-concentration findings at once.
    fn washy_flows() -> Vec<crate::flow::UserFlow> {
        use crate::detect::test_util::flow_at;

        let mut flows = vec![flow("0xwash", "0xwash", 100.0)];
        for i in 0..12 {
            flows.push(flow_at("0xwash", "0xpeer", i * 2, 100.0));
            flows.push(flow_at("0xpeer", "0xwash", i * 2 + 1, 100.0));
        }
        flows
    }

    #[test]
    fn test_whale_bot_is_forced_to_hundred() {
        let profiles = RiskFusionEngine::fuse(
            &[classification("0xwhalebot", 0.7)],
            &WashFindings::default(),
            &["0xwhalebot".to_string()],
        );

        assert_eq!(profiles[0].risk_score, 100.0);
        assert_eq!(profiles[0].risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_clean_whale_gets_scrutiny_premium() {
        let profiles = RiskFusionEngine::fuse(
            &[classification("0xwhale", 0.0)],
            &WashFindings::default(),
            &["0xwhale".to_string()],
        );

        assert_eq!(profiles[0].risk_score, 20.0);
        assert_eq!(profiles[0].risk_level, RiskLevel::Low);
        assert!(profiles[0].is_top_holder);
    }

    #[test]
    fn test_suspicious_only_wallet_joins_universe_as_unknown() {
        let findings = DetectorSuite::new(Default::default())
            .run(&[flow("0xlooper", "0xlooper", 500.0)]);

        let profiles = RiskFusionEngine::fuse(&[], &findings, &[]);
        let profile = profiles.iter().find(|p| p.wallet == "0xlooper").unwrap();

        assert_eq!(profile.bot_classification, BotClassification::Unknown);
        assert!(profile.bot_confidence.is_none());
        assert!(profile.is_wash_trading);
        // self_transfers and volume_concentration both flag it
        assert_eq!(profile.wash_flag_count, 2);
        assert_eq!(profile.risk_score, 30.0);
    }

    #[test]
    fn test_profiles_sorted_by_risk_desc() {
        let profiles = RiskFusionEngine::fuse(
            &[
                classification("0xlow", 0.1),
                classification("0xhigh", 0.9),
                classification("0xmid", 0.5),
            ],
            &WashFindings::default(),
            &[],
        );

        assert_eq!(profiles[0].wallet, "0xhigh");
        assert_eq!(profiles[1].wallet, "0xmid");
        assert_eq!(profiles[2].wallet, "0xlow");
    }

    #[test]
    fn test_token_summary_saturation() {
        // 2 of 5 wallets BOT (40% -> saturated), 1 of 5 wash (20% -> saturated)
        let findings = DetectorSuite::new(Default::default())
            .run(&[flow("0xwash", "0xwash", 100.0)]);
        let profiles = RiskFusionEngine::fuse(
            &[
                classification("0xbot1", 0.9),
                classification("0xbot2", 0.8),
                classification("0xhuman1", 0.0),
                classification("0xhuman2", 0.0),
            ],
            &findings,
            &[],
        );
        assert_eq!(profiles.len(), 5);

        let metrics = ConcentrationMetrics {
            top_10_ratio: 40.0,
            gini_coefficient: 0.5,
            ..Default::default()
        };
        let summary = RiskFusionEngine::token_summary(&profiles, &metrics);

        assert_eq!(summary.bot_activity_risk, 100.0);
        assert_eq!(summary.wash_trading_risk, 100.0);
        assert_eq!(summary.concentration_risk, 50.0);
        assert!((summary.token_risk_score - (50.0 * 0.4 + 100.0 * 0.3 + 100.0 * 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_extreme_gini_floors_concentration() {
        let metrics = ConcentrationMetrics {
            top_10_ratio: 10.0,
            gini_coefficient: 0.95,
            ..Default::default()
        };
        let summary = RiskFusionEngine::token_summary(&[], &metrics);
        assert_eq!(summary.concentration_risk, 90.0);
    }
}
