//! Wash-trading pattern detection
//!
//! Six independent detectors consume the extracted flow table:
//! - Self-transfers (same start and end wallet)
//! - Rapid round-trips between a wallet pair
//! - High-frequency trading pairs
//! - Circular flow patterns (A -> B -> C -> A)
//! - Volume concentration ranking
//! - Temporal clustering of flows
//!
//! Each detector is pure: flow table in, finding table out.

pub mod circular;
pub mod high_frequency;
pub mod round_trip;
pub mod self_transfer;
pub mod temporal;
pub mod volume;

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::config::DetectorConfig;
use crate::flow::UserFlow;

pub use circular::CycleFinding;
pub use high_frequency::HighFrequencyFinding;
pub use round_trip::RoundTripFinding;
pub use self_transfer::SelfTransferFinding;
pub use temporal::TemporalCluster;
pub use volume::ConcentrationRow;

/// Detector names as they appear in wash flags and reports
pub const SELF_TRANSFERS: &str = "self_transfers";
pub const RAPID_ROUNDTRIPS: &str = "rapid_roundtrips";
pub const HIGH_FREQUENCY_PAIRS: &str = "high_frequency_pairs";
pub const CIRCULAR_PATTERNS: &str = "circular_patterns";
pub const VOLUME_CONCENTRATION: &str = "volume_concentration";

/// Output of a full detector run
#[derive(Debug, Clone, Default, Serialize)]
pub struct WashFindings {
    pub self_transfers: Vec<SelfTransferFinding>,
    pub rapid_roundtrips: Vec<RoundTripFinding>,
    pub high_frequency_pairs: Vec<HighFrequencyFinding>,
    pub circular_patterns: Vec<CycleFinding>,
    pub volume_concentration: Vec<ConcentrationRow>,
    pub temporal_clusters: Vec<TemporalCluster>,
}

impl WashFindings {
    /// Wallets implicated by the four wash detectors.
    ///
    /// Volume concentration and temporal clustering are informational
    /// and never populate the suspicious set.
    pub fn suspicious_wallets(&self) -> HashSet<String> {
        let mut wallets = HashSet::new();

        for finding in &self.self_transfers {
            wallets.insert(finding.wallet.clone());
        }
        for finding in &self.rapid_roundtrips {
            wallets.insert(finding.wallet_a.clone());
            wallets.insert(finding.wallet_b.clone());
        }
        for finding in &self.high_frequency_pairs {
            wallets.insert(finding.wallet_a.clone());
            wallets.insert(finding.wallet_b.clone());
        }
        for finding in &self.circular_patterns {
            for wallet in &finding.wallets {
                wallets.insert(wallet.clone());
            }
        }

        wallets
    }

    /// Names of the detectors that flagged the given wallet
    pub fn wash_flags(&self, wallet: &str) -> Vec<&'static str> {
        let mut flags = Vec::new();

        if self.self_transfers.iter().any(|f| f.wallet == wallet) {
            flags.push(SELF_TRANSFERS);
        }
        if self
            .rapid_roundtrips
            .iter()
            .any(|f| f.wallet_a == wallet || f.wallet_b == wallet)
        {
            flags.push(RAPID_ROUNDTRIPS);
        }
        if self
            .high_frequency_pairs
            .iter()
            .any(|f| f.wallet_a == wallet || f.wallet_b == wallet)
        {
            flags.push(HIGH_FREQUENCY_PAIRS);
        }
        if self
            .circular_patterns
            .iter()
            .any(|f| f.wallets.iter().any(|w| w == wallet))
        {
            flags.push(CIRCULAR_PATTERNS);
        }
        // Informational for the suspicious set, but still a flag
        if self
            .volume_concentration
            .iter()
            .any(|row| row.wallet == wallet)
        {
            flags.push(VOLUME_CONCENTRATION);
        }

        flags
    }
}

/// Runs the six detectors over a flow table
pub struct DetectorSuite {
    config: DetectorConfig,
}

impl DetectorSuite {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Run every detector and collect the findings.
    ///
    /// A cycle-search failure aborts only the circular detector; the
    /// other findings are still produced.
    pub fn run(&self, flows: &[UserFlow]) -> WashFindings {
        let findings = WashFindings {
            self_transfers: self_transfer::detect(flows),
            rapid_roundtrips: round_trip::detect(flows, self.config.roundtrip_window_hours),
            high_frequency_pairs: high_frequency::detect(flows, self.config.min_pair_transactions),
            circular_patterns: circular::detect(
                flows,
                self.config.max_cycle_length,
                self.config.cycle_iteration_cap,
            ),
            volume_concentration: volume::analyze(flows, self.config.concentration_top_n),
            temporal_clusters: temporal::detect(
                flows,
                self.config.cluster_window_minutes,
                self.config.cluster_min_flows,
            ),
        };

        info!(
            self_transfers = findings.self_transfers.len(),
            roundtrip_pairs = findings.rapid_roundtrips.len(),
            high_frequency_pairs = findings.high_frequency_pairs.len(),
            cycles = findings.circular_patterns.len(),
            suspicious = findings.suspicious_wallets().len(),
            "Wash-trading detection complete"
        );

        findings
    }
}
