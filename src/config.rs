//! Configuration loading and validation
//!
//! All components receive their configuration section by value at
//! construction time. Nothing reads ambient or global state.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::provider::EndpointKind;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub detectors: DetectorConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub holders: HolderConfig,
}

/// Upstream data provider connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Lookback window passed to per-wallet endpoint queries (e.g. "7d")
    #[serde(default = "default_time_window")]
    pub time_window: String,
}

/// Rate-limited aggregator settings
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Bounded worker pool size for batch fetches
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// On-disk cache directory
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Cache entry TTL in hours
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,
    /// Retry budget per call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay between transport-error retries, in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

/// Wash-trading detector parameters
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Round-trip matching window in hours
    #[serde(default = "default_roundtrip_window_hours")]
    pub roundtrip_window_hours: i64,
    /// Minimum flow count for a high-frequency pair
    #[serde(default = "default_min_pair_transactions")]
    pub min_pair_transactions: usize,
    /// Maximum cycle length kept by the circular detector
    #[serde(default = "default_max_cycle_length")]
    pub max_cycle_length: usize,
    /// Hard cap on cycle-search iterations
    #[serde(default = "default_cycle_iteration_cap")]
    pub cycle_iteration_cap: usize,
    /// Number of wallets reported by volume concentration
    #[serde(default = "default_concentration_top_n")]
    pub concentration_top_n: usize,
    /// Temporal clustering window in minutes
    #[serde(default = "default_cluster_window_minutes")]
    pub cluster_window_minutes: i64,
    /// Minimum flows in one window to flag a cluster
    #[serde(default = "default_cluster_min_flows")]
    pub cluster_min_flows: usize,
}

/// Bot classification parameters
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Minimum combined flow count for a wallet to be classified
    #[serde(default = "default_min_wallet_transactions")]
    pub min_wallet_transactions: usize,
    /// Endpoint kinds fetched per wallet
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointKind>,
    /// Optional cap on the number of wallets classified per run
    #[serde(default)]
    pub sample_size: Option<usize>,
    /// Transactions-per-hour threshold for high frequency
    #[serde(default = "default_high_frequency_txs_per_hour")]
    pub high_frequency_txs_per_hour: f64,
    /// Decimal-place threshold for machine-precision values
    #[serde(default = "default_precision_decimals")]
    pub precision_decimals: f64,
    /// Counterparty count below which trading is considered narrow
    #[serde(default = "default_counterparty_diversity")]
    pub counterparty_diversity: f64,
    /// Off-hours activity ratio threshold
    #[serde(default = "default_off_hours_ratio")]
    pub off_hours_ratio: f64,
}

/// Holder concentration parameters
#[derive(Debug, Clone, Deserialize)]
pub struct HolderConfig {
    /// Number of top holders forming the whale set
    #[serde(default = "default_whale_top_n")]
    pub whale_top_n: usize,
}

fn default_base_url() -> String {
    "https://api.arkm.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_time_window() -> String {
    "7d".to_string()
}
fn default_max_workers() -> usize {
    3
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}
fn default_cache_ttl_hours() -> u64 {
    24
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    1
}
fn default_roundtrip_window_hours() -> i64 {
    24
}
fn default_min_pair_transactions() -> usize {
    10
}
fn default_max_cycle_length() -> usize {
    4
}
fn default_cycle_iteration_cap() -> usize {
    1000
}
fn default_concentration_top_n() -> usize {
    20
}
fn default_cluster_window_minutes() -> i64 {
    5
}
fn default_cluster_min_flows() -> usize {
    3
}
fn default_min_wallet_transactions() -> usize {
    5
}
fn default_endpoints() -> Vec<EndpointKind> {
    vec![
        EndpointKind::Transfers,
        EndpointKind::Counterparties,
        EndpointKind::Intelligence,
        EndpointKind::Balances,
        EndpointKind::Flow,
    ]
}
fn default_high_frequency_txs_per_hour() -> f64 {
    10.0
}
fn default_precision_decimals() -> f64 {
    4.0
}
fn default_counterparty_diversity() -> f64 {
    5.0
}
fn default_off_hours_ratio() -> f64 {
    0.4
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            time_window: default_time_window(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            cache_dir: default_cache_dir(),
            cache_ttl_hours: default_cache_ttl_hours(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            roundtrip_window_hours: default_roundtrip_window_hours(),
            min_pair_transactions: default_min_pair_transactions(),
            max_cycle_length: default_max_cycle_length(),
            cycle_iteration_cap: default_cycle_iteration_cap(),
            concentration_top_n: default_concentration_top_n(),
            cluster_window_minutes: default_cluster_window_minutes(),
            cluster_min_flows: default_cluster_min_flows(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            min_wallet_transactions: default_min_wallet_transactions(),
            endpoints: default_endpoints(),
            sample_size: None,
            high_frequency_txs_per_hour: default_high_frequency_txs_per_hour(),
            precision_decimals: default_precision_decimals(),
            counterparty_diversity: default_counterparty_diversity(),
            off_hours_ratio: default_off_hours_ratio(),
        }
    }
}

impl Default for HolderConfig {
    fn default() -> Self {
        Self {
            whale_top_n: default_whale_top_n(),
        }
    }
}

fn default_whale_top_n() -> usize {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            aggregator: AggregatorConfig::default(),
            detectors: DetectorConfig::default(),
            bot: BotConfig::default(),
            holders: HolderConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Pick up a .env file when present
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix RISKSCOPE_)
            .add_source(
                config::Environment::with_prefix("RISKSCOPE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.aggregator.max_workers == 0 {
            anyhow::bail!("aggregator.max_workers must be at least 1");
        }

        if self.detectors.max_cycle_length < 2 {
            anyhow::bail!(
                "detectors.max_cycle_length must be at least 2, got {}",
                self.detectors.max_cycle_length
            );
        }

        if self.detectors.cycle_iteration_cap == 0 {
            anyhow::bail!("detectors.cycle_iteration_cap must be positive");
        }

        if self.detectors.roundtrip_window_hours <= 0 {
            anyhow::bail!("detectors.roundtrip_window_hours must be positive");
        }

        if self.holders.whale_top_n == 0 {
            anyhow::bail!("holders.whale_top_n must be positive");
        }

        Ok(())
    }
}
