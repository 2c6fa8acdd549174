//! Token analysis orchestration
//!
//! Ties the pipeline together for one token: transfer batch -> flow
//! extraction -> wash detection, eligible wallets -> endpoint
//! snapshots -> bot classification, holder snapshot -> concentration,
//! and finally risk fusion into the report.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregator::RateLimitedAggregator;
use crate::bot::{BotScorer, FeatureExtractor, WalletClassification, WalletFeatures};
use crate::config::Config;
use crate::detect::DetectorSuite;
use crate::error::{Error, Result};
use crate::flow::{FlowExtractor, UserFlow};
use crate::fusion::{RiskFusionEngine, RiskLevel, TokenRiskSummary, WalletRiskProfile};
use crate::holders::{HolderAnalysis, HolderConcentrationAnalyzer};
use crate::provider::{HolderSource, TransferSource};

/// Final output of one analysis run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub token_address: String,
    pub chain: String,
    pub flow_count: usize,
    pub profiles: Vec<WalletRiskProfile>,
    pub token_summary: TokenRiskSummary,
    /// Wallets at CRITICAL risk level
    pub flagged: Vec<String>,
}

/// Drives a full analysis run for one token
pub struct TokenAnalysis {
    config: Config,
    transfers: Arc<dyn TransferSource>,
    holders: Arc<dyn HolderSource>,
    aggregator: RateLimitedAggregator,
}

impl TokenAnalysis {
    pub fn new(
        config: Config,
        transfers: Arc<dyn TransferSource>,
        holders: Arc<dyn HolderSource>,
    ) -> Result<Self> {
        let aggregator =
            RateLimitedAggregator::from_config(&config.provider, &config.aggregator)?;
        Ok(Self {
            config,
            transfers,
            holders,
            aggregator,
        })
    }

    /// Build with an already-constructed aggregator, for callers that
    /// swap the transport.
    pub fn with_aggregator(
        config: Config,
        transfers: Arc<dyn TransferSource>,
        holders: Arc<dyn HolderSource>,
        aggregator: RateLimitedAggregator,
    ) -> Self {
        Self {
            config,
            transfers,
            holders,
            aggregator,
        }
    }

    pub async fn run(&self, token_address: &str, chain: &str) -> Result<AnalysisReport> {
        info!(token_address, chain, "Starting token analysis");

        let hops = self
            .transfers
            .token_transfers(token_address, chain, &self.config.provider.time_window)
            .await?;
        let flows = FlowExtractor::extract(&hops);
        if flows.is_empty() {
            return Err(Error::NoAnalyzableFlows);
        }

        let findings = DetectorSuite::new(self.config.detectors.clone()).run(&flows);
        let classifications = self.classify_wallets(&flows).await;
        let holder_analysis = self.analyze_holders(token_address, chain).await;

        let profiles =
            RiskFusionEngine::fuse(&classifications, &findings, &holder_analysis.whales);
        let token_summary = RiskFusionEngine::token_summary(&profiles, &holder_analysis.metrics);

        let flagged: Vec<String> = profiles
            .iter()
            .filter(|p| p.risk_level == RiskLevel::Critical)
            .map(|p| p.wallet.clone())
            .collect();

        info!(
            token_address,
            profiles = profiles.len(),
            flagged = flagged.len(),
            token_risk_score = token_summary.token_risk_score,
            "Token analysis complete"
        );

        Ok(AnalysisReport {
            token_address: token_address.to_string(),
            chain: chain.to_string(),
            flow_count: flows.len(),
            profiles,
            token_summary,
            flagged,
        })
    }

    async fn classify_wallets(&self, flows: &[UserFlow]) -> Vec<WalletClassification> {
        let scorer = BotScorer::new(self.config.bot.clone());
        let eligible = scorer.eligible_wallets(flows);
        if eligible.is_empty() {
            return Vec::new();
        }

        let snapshots = self
            .aggregator
            .fetch_wallet_snapshots(
                &eligible,
                &self.config.bot.endpoints,
                &self.config.provider.time_window,
            )
            .await;

        let features: Vec<WalletFeatures> = snapshots
            .iter()
            .map(|snapshot| {
                let mut features = FeatureExtractor::extract(snapshot);
                attach_local_activity(&mut features, flows);
                features
            })
            .collect();

        scorer.classify(features)
    }

    /// Holder fetch failure degrades to empty metrics; it never aborts
    /// the run.
    async fn analyze_holders(&self, token_address: &str, chain: &str) -> HolderAnalysis {
        let records = match self.holders.token_holders(token_address, chain).await {
            Ok(records) => records,
            Err(e) => {
                warn!(token_address, error = %e, "Holder snapshot unavailable, skipping concentration");
                Vec::new()
            }
        };
        HolderConcentrationAnalyzer::new(self.config.holders.clone()).analyze(&records)
    }
}

fn attach_local_activity(features: &mut WalletFeatures, flows: &[UserFlow]) {
    for flow in flows {
        if flow.involves(&features.wallet) {
            features.local_tx_count += 1;
            features.local_volume_usd += flow.usd_value;
        }
    }
}
