//! Error types for the market impact tracker

use thiserror::Error;

/// Errors that can occur when fetching prices from a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Timeout waiting for response
    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),
}

/// Errors raised while persisting snapshots or reports
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Writing to the backing file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused the write
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while turning snapshots into an impact report
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    /// A snapshot belonging to another event was passed in
    #[error("Snapshot for event {found} passed to analysis of {expected}")]
    EventMismatch { expected: String, found: String },

    /// A statistic came out as NaN or infinite
    #[error("Non-finite {metric} for {symbol}")]
    NonFinite { symbol: String, metric: &'static str },

    /// The analysis engine panicked
    #[error("Analysis engine panicked: {0}")]
    Panicked(String),
}

impl AnalysisError {
    /// Creates a NonFinite error
    pub fn non_finite(symbol: &str, metric: &'static str) -> Self {
        Self::NonFinite {
            symbol: symbol.to_string(),
            metric,
        }
    }
}

/// Error returned by optional collaborators (report consumers, failure notifiers)
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A variable held a value that could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// A `symbol:id` pair list was malformed
    #[error("Invalid mapping entry in {key}: {entry}")]
    InvalidMapping { key: String, entry: String },
}

impl ConfigError {
    /// Creates an InvalidValue error
    pub fn invalid_value(key: &str, value: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Creates an InvalidMapping error
    pub fn invalid_mapping(key: &str, entry: &str) -> Self {
        Self::InvalidMapping {
            key: key.to_string(),
            entry: entry.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ProviderError::Timeout(Duration::from_secs(10)).to_string(),
            "Request timeout after 10s"
        );
        assert_eq!(
            AnalysisError::non_finite("btc", "volatility").to_string(),
            "Non-finite volatility for btc"
        );
        assert_eq!(
            ConfigError::invalid_mapping("MARKET_IMPACT_CRYPTO_IDS", "btc").to_string(),
            "Invalid mapping entry in MARKET_IMPACT_CRYPTO_IDS: btc"
        );
    }
}
