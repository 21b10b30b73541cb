//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (store and narrative API keys) are referenced by env-var
//! name in the config and resolved at runtime via `std::env::var`.
//!
//! Historical pipeline variants that differed only in retry counts,
//! delay ranges, or sample counts are collapsed here into named fields.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub pool: PoolConfig,
    pub fetch: FetchConfig,
    pub forecast: ForecastConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub narrative: NarrativeConfig,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
}

/// Operator-facing scan controls. Values are clamped again at the
/// orchestrator boundary, so out-of-range config never panics.
#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// Maximum instruments to process per run.
    pub limit: usize,
    /// How many ranked results to retain.
    pub top_n: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    /// Listing endpoint for main-board instruments.
    pub listed_url: String,
    /// Listing endpoint for OTC instruments.
    pub otc_url: String,
    /// Pool cache validity window.
    pub cache_ttl_secs: u64,
    /// Randomize scan order so repeated runs don't always hit the same
    /// leading block of the listing.
    pub shuffle: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Candidate lookback periods, tried in order.
    pub periods: Vec<String>,
    /// Bar interval passed to the price source.
    pub interval: String,
    /// Attempts per period before escalating to the next period.
    pub retries_per_period: u32,
    /// Randomized delay bounds between attempts, seconds.
    pub retry_delay_min_secs: f64,
    pub retry_delay_max_secs: f64,
    /// Randomized self-throttle between successive instruments, seconds.
    /// Deliberately generous — the price source blocks aggressive callers.
    pub instrument_delay_min_secs: f64,
    pub instrument_delay_max_secs: f64,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Minimum closes a series must exceed to be usable.
    pub min_series_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    /// Monte Carlo path count (K).
    pub simulations: u32,
    /// Forward horizon in trading days (H).
    pub horizon_days: u32,
    /// Assumed mean daily log-return.
    pub daily_drift: f64,
    /// Multiplier applied to historical volatility.
    pub volatility_multiplier: f64,
    /// Limit-entry discount below the last close.
    pub buy_discount: f64,
    /// Fixed RNG seed for reproducible runs. Unset in production.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub enabled: bool,
    /// Base URL of the key-value sheet gateway.
    pub base_url: String,
    /// Env var holding the gateway API key.
    pub api_key_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NarrativeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default = "default_narrative_tokens")]
    pub max_tokens: u32,
}

// Derived Default would zero max_tokens when the whole section is
// absent; keep it in step with the serde field default.
impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: String::new(),
            api_key_env: String::new(),
            max_tokens: default_narrative_tokens(),
        }
    }
}

fn default_narrative_tokens() -> u32 {
    512
}

/// Optional fixed monitored list. When non-empty, the scan runs over
/// these symbols instead of the full exchange pool.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WatchlistConfig {
    #[serde(default)]
    pub symbols: Vec<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
