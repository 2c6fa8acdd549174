//! Riskscope - manipulation-risk scoring for wallets and tokens
//!
//! Fuses three independent signal streams into per-wallet and token-level
//! risk scores:
//! - Wash-trading pattern detection over user-to-user transaction flows
//! - Bot-behavior classification from multi-endpoint wallet data
//! - Holder-concentration analysis of the token's top-holder snapshot

pub mod aggregator;
pub mod analysis;
pub mod bot;
pub mod config;
pub mod detect;
pub mod error;
pub mod flow;
pub mod fusion;
pub mod holders;
pub mod provider;

// Re-export commonly used types
pub use analysis::{AnalysisReport, TokenAnalysis};
pub use config::Config;
pub use error::{Error, Result};

/// Initialize tracing with an env-filter, defaulting this crate to
/// info level. Call once from the hosting binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("riskscope=info".parse().expect("static directive")),
        )
        .with_target(true)
        .init();
}
