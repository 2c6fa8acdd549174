//! Heuristic bot classification
//!
//! - feature extraction from multi-endpoint wallet snapshots
//! - weighted rule scoring into a [0,1] bot probability
//! - BOT / UNCERTAIN / HUMAN classification with confidence bands

pub mod features;
pub mod scorer;

pub use features::{FeatureExtractor, WalletFeatures};
pub use scorer::{BotClassification, BotScorer, Confidence, WalletClassification};
