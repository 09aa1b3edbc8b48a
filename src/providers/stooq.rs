//! Stooq index provider implementation

use crate::{
    constants::{REQUEST_TIMEOUT_SECS, STOOQ_FIELDS, STOOQ_QUOTE_URL, USER_AGENT},
    error::ProviderError,
    provider::PriceProvider,
    rate_limiter::RateLimiter,
    types::{PriceMap, PricePoint},
};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// One CSV quote row keyed by column header
type QuoteRow = BTreeMap<String, String>;

/// Stooq quote provider for stock indices
///
/// Stooq answers one symbol per request with a two-line CSV document
/// (`Symbol,Date,Time,Open,High,Low,Close,Volume`).
pub struct StooqProvider {
    client: Client,
    quote_url: String,
    /// Lowercase symbol -> Stooq ticker (`spx` -> `^spx`)
    symbol_map: BTreeMap<String, String>,
    /// Lowercase symbol -> quote currency
    currency_map: BTreeMap<String, String>,
    rate_limiter: Arc<RateLimiter>,
}

impl StooqProvider {
    /// Creates a new Stooq provider
    pub fn new(
        symbol_map: BTreeMap<String, String>,
        currency_map: BTreeMap<String, String>,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            quote_url: STOOQ_QUOTE_URL.to_string(),
            symbol_map: symbol_map
                .into_iter()
                .filter(|(_, ticker)| !ticker.is_empty())
                .map(|(symbol, ticker)| (symbol.to_lowercase(), ticker))
                .collect(),
            currency_map: currency_map
                .into_iter()
                .map(|(symbol, currency)| (symbol.to_lowercase(), currency))
                .collect(),
            rate_limiter,
        })
    }

    pub fn with_quote_url(mut self, quote_url: impl Into<String>) -> Self {
        self.quote_url = quote_url.into();
        self
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<String, ProviderError> {
        self.rate_limiter.wait().await;
        tracing::debug!(ticker = %ticker, "Fetching quote from Stooq");

        let response = self
            .client
            .get(&self.quote_url)
            .query(&[
                ("s", ticker.to_lowercase().as_str()),
                ("f", STOOQ_FIELDS),
                ("h", ""),
                ("e", "csv"),
            ])
            .send()
            .await
            .map_err(ProviderError::NetworkError)?;

        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response.text().await.map_err(ProviderError::NetworkError)
    }

    /// Turns a quote row into a price point
    fn to_price_point(&self, symbol: &str, row: QuoteRow) -> PricePoint {
        let price = row.get("Close").and_then(|v| parse_number(v));
        let volume = row.get("Volume").and_then(|v| parse_number(v));
        let raw = serde_json::to_value(&row).unwrap_or_default();

        PricePoint::new(price, self.currency_map.get(symbol).cloned(), self.provider_name())
            .with_volume(volume)
            .with_raw(raw)
    }
}

/// Parses the first data row of a Stooq CSV quote
fn parse_quote_csv(text: &str) -> Result<Option<QuoteRow>, ProviderError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    match reader.deserialize::<QuoteRow>().next() {
        None => Ok(None),
        Some(row) => row.map(Some).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse Stooq CSV: {}. Response: {}",
                e, text
            ))
        }),
    }
}

/// Stooq uses `N/D` for missing values
fn parse_number(value: &str) -> Option<f64> {
    value.replace(',', "").parse::<f64>().ok()
}

#[async_trait]
impl PriceProvider for StooqProvider {
    async fn fetch_prices(&self, symbols: &[String]) -> Result<PriceMap, ProviderError> {
        let mut result = PriceMap::new();

        for symbol in symbols {
            let key = symbol.to_lowercase();
            let Some(ticker) = self.symbol_map.get(&key) else {
                tracing::debug!(symbol = %key, "No Stooq mapping for symbol");
                continue;
            };

            let body = self.fetch_quote(ticker).await?;
            let Some(row) = parse_quote_csv(&body)? else {
                continue;
            };

            let point = self.to_price_point(&key, row);
            result.insert(key, point);
        }

        tracing::debug!(count = result.len(), "Fetched quotes from Stooq");

        Ok(result)
    }

    fn provider_name(&self) -> &'static str {
        "stooq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StooqProvider {
        StooqProvider::new(
            BTreeMap::from([
                ("SPX".to_string(), "^SPX".to_string()),
                ("dax".to_string(), "^dax".to_string()),
                ("empty".to_string(), String::new()),
            ]),
            BTreeMap::from([("spx".to_string(), "USD".to_string())]),
            Arc::new(RateLimiter::unlimited()),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_quote_csv() {
        let text = "Symbol,Date,Time,Open,High,Low,Close,Volume\n\
                    ^SPX,2025-01-02,22:00:00,5903.26,5949.34,5853.32,5868.55,2950000000\n";
        let row = parse_quote_csv(text).unwrap().unwrap();
        assert_eq!(row["Symbol"], "^SPX");
        assert_eq!(row["Close"], "5868.55");
    }

    #[test]
    fn test_parse_quote_csv_without_rows() {
        let text = "Symbol,Date,Time,Open,High,Low,Close,Volume\n";
        assert!(parse_quote_csv(text).unwrap().is_none());
    }

    #[test]
    fn test_price_point_from_row() {
        let provider = provider();
        let row = parse_quote_csv(
            "Symbol,Date,Time,Open,High,Low,Close,Volume\n\
             ^SPX,2025-01-02,22:00:00,5903.26,5949.34,5853.32,5868.55,2950000000\n",
        )
        .unwrap()
        .unwrap();

        let point = provider.to_price_point("spx", row);
        assert_eq!(point.price, Some(5868.55));
        assert_eq!(point.volume, Some(2_950_000_000.0));
        assert_eq!(point.currency.as_deref(), Some("USD"));
        assert_eq!(point.provider, "stooq");
        assert_eq!(point.raw["Symbol"], "^SPX");
    }

    #[test]
    fn test_missing_values_are_absent() {
        let provider = provider();
        let row = parse_quote_csv(
            "Symbol,Date,Time,Open,High,Low,Close,Volume\n^DAX,N/D,N/D,N/D,N/D,N/D,N/D,N/D\n",
        )
        .unwrap()
        .unwrap();

        let point = provider.to_price_point("dax", row);
        assert_eq!(point.price, None);
        assert_eq!(point.volume, None);
        assert_eq!(point.currency, None);
    }

    #[tokio::test]
    async fn test_unmapped_symbols_are_skipped() {
        let provider = provider().with_quote_url("http://127.0.0.1:1/q/l/");
        let prices = provider
            .fetch_prices(&["ftse".to_string(), "empty".to_string()])
            .await
            .unwrap();
        assert!(prices.is_empty());
    }
}
