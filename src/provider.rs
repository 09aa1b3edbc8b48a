//! Provider abstraction for fetching asset prices from external APIs

use crate::{error::ProviderError, types::PriceMap, types::PricePoint};
use async_trait::async_trait;

/// Trait for price providers
///
/// Implementations fetch prices for one asset family (crypto via CoinGecko,
/// indices via Stooq, ...). Symbols the provider has no mapping or quote for
/// are simply left out of the result; an `Err` means the whole call failed.
/// Implementations pace themselves through a shared [`RateLimiter`] before
/// every outbound request.
///
/// [`RateLimiter`]: crate::rate_limiter::RateLimiter
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Fetches prices for multiple symbols in a single call
    ///
    /// # Arguments
    /// * `symbols` - Lowercase symbols as configured on the tracking task
    ///
    /// # Returns
    /// Map of symbol to price point, or an error if the fetch fails
    async fn fetch_prices(&self, symbols: &[String]) -> Result<PriceMap, ProviderError>;

    /// Fetches the price for a single symbol
    ///
    /// Returns `Ok(None)` when the provider does not know the symbol.
    async fn fetch_price(&self, symbol: &str) -> Result<Option<PricePoint>, ProviderError> {
        let mut prices = self.fetch_prices(&[symbol.to_string()]).await?;
        Ok(prices.remove(symbol))
    }

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}
