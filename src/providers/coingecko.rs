//! CoinGecko price provider implementation

use crate::{
    constants::{
        COINGECKO_API_URL, COINGECKO_SIMPLE_PRICE_ENDPOINT, REQUEST_TIMEOUT_SECS, USER_AGENT,
    },
    error::ProviderError,
    provider::PriceProvider,
    rate_limiter::RateLimiter,
    types::{PriceMap, PricePoint},
};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// CoinGecko API response for simple price queries: coin id -> quote fields
type CoinGeckoResponse = HashMap<String, serde_json::Value>;

/// CoinGecko price provider for crypto assets
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    /// Lowercase symbol -> CoinGecko coin id
    id_map: BTreeMap<String, String>,
    vs_currency: String,
    rate_limiter: Arc<RateLimiter>,
}

impl CoinGeckoProvider {
    /// Creates a new CoinGecko provider
    ///
    /// # Arguments
    /// * `id_map` - Symbol to CoinGecko id (`btc` -> `bitcoin`)
    /// * `vs_currency` - Quote currency (`usd`)
    /// * `rate_limiter` - Limiter shared by every caller of the CoinGecko API
    pub fn new(
        id_map: BTreeMap<String, String>,
        vs_currency: &str,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            base_url: COINGECKO_API_URL.to_string(),
            id_map: id_map
                .into_iter()
                .map(|(symbol, id)| (symbol.to_lowercase(), id))
                .collect(),
            vs_currency: vs_currency.to_lowercase(),
            rate_limiter,
        })
    }

    /// Points the provider at another API host (pro endpoint, proxy)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Maps requested symbols to unique coin ids
    ///
    /// Returns the ids in request order and the id -> symbol alias map.
    /// Symbols without a mapping are skipped.
    fn resolve_ids(&self, symbols: &[String]) -> (Vec<String>, HashMap<String, String>) {
        let mut ids = Vec::new();
        let mut aliases = HashMap::new();

        for symbol in symbols {
            let symbol = symbol.to_lowercase();
            let Some(id) = self.id_map.get(&symbol) else {
                tracing::debug!(symbol = %symbol, "No CoinGecko mapping for symbol");
                continue;
            };
            if !aliases.contains_key(id) {
                ids.push(id.clone());
                aliases.insert(id.clone(), symbol);
            }
        }

        (ids, aliases)
    }

    /// Builds the CoinGecko API URL for fetching prices
    fn build_url(&self, ids: &[String]) -> String {
        format!(
            "{}{}?ids={}&vs_currencies={}&include_24hr_vol=true&include_last_updated_at=true",
            self.base_url,
            COINGECKO_SIMPLE_PRICE_ENDPOINT,
            ids.join(","),
            self.vs_currency
        )
    }

    /// Parses the CoinGecko response into price points keyed by symbol
    fn parse_response(
        &self,
        response: CoinGeckoResponse,
        aliases: &HashMap<String, String>,
    ) -> PriceMap {
        let volume_key = format!("{}_24h_vol", self.vs_currency);
        let mut result = PriceMap::new();

        for (id, data) in response {
            let Some(symbol) = aliases.get(&id) else {
                continue;
            };

            let price = data.get(&self.vs_currency).and_then(|v| v.as_f64());
            let volume = data.get(&volume_key).and_then(|v| v.as_f64());

            result.insert(
                symbol.clone(),
                PricePoint::new(price, Some(self.vs_currency.clone()), self.provider_name())
                    .with_volume(volume)
                    .with_raw(data),
            );
        }

        result
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    async fn fetch_prices(&self, symbols: &[String]) -> Result<PriceMap, ProviderError> {
        let (ids, aliases) = self.resolve_ids(symbols);
        if ids.is_empty() {
            return Ok(PriceMap::new());
        }

        let url = self.build_url(&ids);
        self.rate_limiter.wait().await;
        tracing::debug!(url = %url, "Fetching prices from CoinGecko");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ProviderError::NetworkError)?;

        // Check for rate limiting
        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        // Check for other errors
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let response_text = response.text().await.map_err(ProviderError::NetworkError)?;

        let coingecko_response: CoinGeckoResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                ProviderError::InvalidResponse(format!(
                    "Failed to parse CoinGecko response: {}. Response: {}",
                    e, response_text
                ))
            })?;

        let prices = self.parse_response(coingecko_response, &aliases);

        tracing::debug!(count = prices.len(), "Fetched prices from CoinGecko");

        Ok(prices)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}
