//! Runtime configuration for the market impact tracker

use crate::{
    constants::{
        CRYPTO_MIN_INTERVAL_MS, DEFAULT_FIAT, DEFAULT_OUTLIER_THRESHOLD_PCT,
        INDEX_MIN_INTERVAL_MS, PROVIDER_TIMEOUT_SECS,
    },
    error::ConfigError,
    types::UrgencyProfile,
};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

const ENV_ENABLED: &str = "MARKET_IMPACT_ENABLED";
const ENV_CRYPTO_IDS: &str = "MARKET_IMPACT_CRYPTO_IDS";
const ENV_INDEX_IDS: &str = "MARKET_IMPACT_INDEX_IDS";
const ENV_INDEX_CURRENCIES: &str = "MARKET_IMPACT_INDEX_CURRENCIES";
const ENV_FIAT: &str = "MARKET_IMPACT_FIAT";
const ENV_OUTLIER_PCT: &str = "MARKET_IMPACT_OUTLIER_PCT";
const ENV_PROVIDER_TIMEOUT: &str = "MARKET_IMPACT_PROVIDER_TIMEOUT_SECS";
const ENV_JSONL_PATH: &str = "MARKET_IMPACT_JSONL_PATH";
const ENV_CRYPTO_FALLBACK_URLS: &str = "MARKET_IMPACT_CRYPTO_FALLBACK_URLS";
const ENV_INDEX_FALLBACK_URLS: &str = "MARKET_IMPACT_INDEX_FALLBACK_URLS";

/// Tracker settings
///
/// Defaults come from [`crate::constants`]. Symbol maps are keyed by the
/// lowercase symbol used in snapshots and reports.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// When false, every scheduling request is declined
    pub enabled: bool,
    /// Crypto symbol -> CoinGecko id (`btc` -> `bitcoin`)
    pub crypto_ids: BTreeMap<String, String>,
    /// Index symbol -> Stooq ticker (`spx` -> `^spx`)
    pub index_ids: BTreeMap<String, String>,
    /// Index symbol -> quote currency
    pub index_currencies: BTreeMap<String, String>,
    /// Quote currency for crypto prices
    pub fiat: String,
    /// Urgency label -> sampling policy
    pub urgency_profiles: HashMap<String, UrgencyProfile>,
    /// Fixed floor for outlier detection, in percent
    pub outlier_threshold_percent: f64,
    /// Upper bound on a single provider call made by the scheduler
    pub provider_timeout: Duration,
    pub crypto_min_interval: Duration,
    pub index_min_interval: Duration,
    /// Optional JSON-lines export of every snapshot and report
    pub jsonl_path: Option<PathBuf>,
    /// CoinGecko-compatible hosts tried in order when the primary fails
    pub crypto_fallback_urls: Vec<String>,
    /// Stooq-compatible quote URLs tried in order when the primary fails
    pub index_fallback_urls: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            crypto_ids: BTreeMap::new(),
            index_ids: BTreeMap::new(),
            index_currencies: BTreeMap::new(),
            fiat: DEFAULT_FIAT.to_string(),
            urgency_profiles: UrgencyProfile::defaults(),
            outlier_threshold_percent: DEFAULT_OUTLIER_THRESHOLD_PCT,
            provider_timeout: Duration::from_secs(PROVIDER_TIMEOUT_SECS),
            crypto_min_interval: Duration::from_millis(CRYPTO_MIN_INTERVAL_MS),
            index_min_interval: Duration::from_millis(INDEX_MIN_INTERVAL_MS),
            jsonl_path: None,
            crypto_fallback_urls: Vec::new(),
            index_fallback_urls: Vec::new(),
        }
    }
}

impl TrackerConfig {
    /// Loads configuration from `MARKET_IMPACT_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup
    ///
    /// Unset or blank keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(value) = get(ENV_ENABLED) {
            config.enabled = parse_bool(ENV_ENABLED, &value)?;
        }
        if let Some(value) = get(ENV_CRYPTO_IDS) {
            config.crypto_ids = parse_mapping(ENV_CRYPTO_IDS, &value)?;
        }
        if let Some(value) = get(ENV_INDEX_IDS) {
            config.index_ids = parse_mapping(ENV_INDEX_IDS, &value)?;
        }
        if let Some(value) = get(ENV_INDEX_CURRENCIES) {
            config.index_currencies = parse_mapping(ENV_INDEX_CURRENCIES, &value)?;
        }
        if let Some(value) = get(ENV_FIAT) {
            config.fiat = value.to_lowercase();
        }
        if let Some(value) = get(ENV_OUTLIER_PCT) {
            config.outlier_threshold_percent = value
                .parse::<f64>()
                .ok()
                .filter(|pct| pct.is_finite() && *pct >= 0.0)
                .ok_or_else(|| ConfigError::invalid_value(ENV_OUTLIER_PCT, &value))?;
        }
        if let Some(value) = get(ENV_PROVIDER_TIMEOUT) {
            let secs = value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::invalid_value(ENV_PROVIDER_TIMEOUT, &value))?;
            config.provider_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = get(ENV_JSONL_PATH) {
            config.jsonl_path = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_CRYPTO_FALLBACK_URLS) {
            config.crypto_fallback_urls = parse_list(&value);
        }
        if let Some(value) = get(ENV_INDEX_FALLBACK_URLS) {
            config.index_fallback_urls = parse_list(&value);
        }

        Ok(config)
    }

    /// Crypto symbols every new task captures
    pub fn crypto_symbols(&self) -> Vec<String> {
        self.crypto_ids.keys().cloned().collect()
    }

    /// Index symbols every new task captures
    pub fn index_symbols(&self) -> Vec<String> {
        self.index_ids.keys().cloned().collect()
    }

    /// Adds or replaces an urgency profile
    pub fn with_urgency_profile(mut self, urgency: &str, profile: UrgencyProfile) -> Self {
        self.urgency_profiles
            .insert(urgency.trim().to_lowercase(), profile);
        self
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(key, value)),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `sym:value,sym:value` into a map keyed by lowercase symbol
///
/// Only the first `:` separates, so values may contain colons.
fn parse_mapping(key: &str, value: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut map = BTreeMap::new();

    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (symbol, target) = entry
            .split_once(':')
            .map(|(s, t)| (s.trim(), t.trim()))
            .filter(|(s, t)| !s.is_empty() && !t.is_empty())
            .ok_or_else(|| ConfigError::invalid_mapping(key, entry))?;
        map.insert(symbol.to_lowercase(), target.to_string());
    }

    Ok(map)
}
