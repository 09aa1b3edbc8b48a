//! Failover price provider implementation

use crate::{error::ProviderError, provider::PriceProvider, types::PriceMap};
use async_trait::async_trait;
use std::sync::Arc;

/// Price provider that attempts to fetch from multiple providers in order
/// until one succeeds.
///
/// All wrapped providers should serve the same asset family and understand
/// the same symbols.
pub struct FailoverProvider {
    providers: Vec<Arc<dyn PriceProvider>>,
}

impl FailoverProvider {
    /// Creates a new failover provider with a list of providers
    ///
    /// The providers are tried in the order they are provided.
    pub fn new(providers: Vec<Arc<dyn PriceProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl PriceProvider for FailoverProvider {
    async fn fetch_prices(&self, symbols: &[String]) -> Result<PriceMap, ProviderError> {
        let mut last_error = None;

        for provider in &self.providers {
            match provider.fetch_prices(symbols).await {
                Ok(prices) => return Ok(prices),
                Err(e) => {
                    tracing::warn!(
                        provider = provider.provider_name(),
                        error = %e,
                        "Provider failed to fetch prices, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::InvalidResponse("No providers configured for failover".to_string())
        }))
    }

    fn provider_name(&self) -> &'static str {
        "failover"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::MockProvider;

    #[tokio::test]
    async fn test_falls_back_to_second_provider() {
        let primary = Arc::new(MockProvider::with_prices(&["btc"], 1.0));
        primary.set_error("primary down");
        let backup = Arc::new(MockProvider::with_prices(&["btc"], 2.0));

        let failover = FailoverProvider::new(vec![
            primary.clone() as Arc<dyn PriceProvider>,
            backup.clone(),
        ]);
        let prices = failover.fetch_prices(&["btc".to_string()]).await.unwrap();

        assert_eq!(prices["btc"].price, Some(2.0));
        assert_eq!(primary.call_count(), 1);
        assert_eq!(backup.call_count(), 1);
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let primary = Arc::new(MockProvider::with_prices(&["btc"], 1.0));
        let backup = Arc::new(MockProvider::with_prices(&["btc"], 2.0));

        let failover =
            FailoverProvider::new(vec![primary as Arc<dyn PriceProvider>, backup.clone()]);
        let prices = failover.fetch_prices(&["btc".to_string()]).await.unwrap();

        assert_eq!(prices["btc"].price, Some(1.0));
        assert_eq!(backup.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reports_last_error() {
        let primary = Arc::new(MockProvider::new());
        primary.set_error("first");
        let backup = Arc::new(MockProvider::new());
        backup.set_error("second");

        let failover = FailoverProvider::new(vec![primary as Arc<dyn PriceProvider>, backup]);
        let result = failover.fetch_prices(&["btc".to_string()]).await;
        assert!(matches!(result, Err(ProviderError::ApiError(msg)) if msg == "second"));

        let empty = FailoverProvider::new(vec![]);
        assert!(matches!(
            empty.fetch_prices(&[]).await,
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
