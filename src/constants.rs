//! Constants for the market impact tracker
//!
//! Defaults for every tunable live here. `TrackerConfig::default()` is built
//! from these values and `TrackerConfig::from_env()` only overrides them.

/// Urgency label for events that need close observation
pub const URGENCY_IMMEDIATE: &str = "immediate";

/// Urgency label for events expected to play out over hours
pub const URGENCY_HOURS: &str = "hours";

/// Sampling interval for `immediate` events (10 minutes)
pub const IMMEDIATE_INTERVAL_SECS: u64 = 600;

/// Observation window for `immediate` events (6 hours)
pub const IMMEDIATE_DURATION_SECS: u64 = 6 * 3600;

/// Sampling interval for `hours` events (20 minutes)
pub const HOURS_INTERVAL_SECS: u64 = 1200;

/// Observation window for `hours` events (24 hours)
pub const HOURS_DURATION_SECS: u64 = 24 * 3600;

/// Fixed outlier threshold used when volatility is too low to be informative (percent)
pub const DEFAULT_OUTLIER_THRESHOLD_PCT: f64 = 2.5;

/// Multiple of step volatility at which a move counts as an outlier
pub const OUTLIER_VOLATILITY_MULTIPLIER: f64 = 3.0;

/// Timeout applied to every provider call made by the scheduler (in seconds)
pub const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// HTTP request timeout inside the concrete providers (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Minimum spacing between CoinGecko calls (in milliseconds)
pub const CRYPTO_MIN_INTERVAL_MS: u64 = 2000;

/// Minimum spacing between Stooq calls (in milliseconds)
pub const INDEX_MIN_INTERVAL_MS: u64 = 1000;

/// Quote currency for crypto prices
pub const DEFAULT_FIAT: &str = "usd";

/// Capacity of the tracker event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko API endpoint for simple price queries
pub const COINGECKO_SIMPLE_PRICE_ENDPOINT: &str = "/simple/price";

/// Stooq CSV quote endpoint
pub const STOOQ_QUOTE_URL: &str = "https://stooq.com/q/l/";

/// Stooq field selector: symbol, date, time, open, high, low, close, volume
pub const STOOQ_FIELDS: &str = "sd2t2ohlcv";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "market-impact-tracker/0.1.0";
