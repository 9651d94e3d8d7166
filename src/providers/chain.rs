use crate::core::market::{MarketProvider, NormalizedCoin};
use anyhow::{Result, anyhow};
use tracing::{debug, warn};

/// An ordered list of market providers, tried in turn until one returns a
/// non-empty page.
pub struct ProviderChain {
    providers: Vec<Box<dyn MarketProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn MarketProvider>>) -> Self {
        Self { providers }
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Returns the coins and the name of the provider that served them.
    pub async fn fetch_top_coins(&self, limit: usize) -> Result<(String, Vec<NormalizedCoin>)> {
        for provider in &self.providers {
            debug!(provider = provider.name(), "Attempting market fetch");
            match provider.fetch_top_coins(limit).await {
                Ok(coins) if !coins.is_empty() => {
                    return Ok((provider.name().to_string(), coins));
                }
                Ok(_) => warn!(provider = provider.name(), "Provider returned no coins"),
                Err(e) => warn!(provider = provider.name(), error = %e, "Market provider failed"),
            }
        }

        Err(anyhow!(
            "Failed to fetch market data from {}. Please try again later.",
            self.describe()
        ))
    }

    fn describe(&self) -> String {
        match self.names().as_slice() {
            [] => "any provider".to_string(),
            [only] => only.to_string(),
            [first, second] => format!("both {first} and {second}"),
            names => format!("all providers ({})", names.join(", ")),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::market::tests::coin;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct MockMarketProvider {
        pub name: &'static str,
        pub coins: Option<Vec<NormalizedCoin>>,
        pub call_count: Arc<AtomicUsize>,
    }

    impl MockMarketProvider {
        pub fn ok(name: &'static str, symbols: &[&str]) -> Self {
            Self {
                name,
                coins: Some(symbols.iter().map(|s| coin(s, 100.0, Some(1.0))).collect()),
                call_count: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing(name: &'static str) -> Self {
            Self {
                name,
                coins: None,
                call_count: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl MarketProvider for MockMarketProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_top_coins(&self, limit: usize) -> Result<Vec<NormalizedCoin>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match &self.coins {
                Some(coins) => Ok(coins.iter().take(limit).cloned().collect()),
                None => Err(anyhow!("{} unavailable", self.name)),
            }
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let fallback = MockMarketProvider::ok("second", &["ETH"]);
        let fallback_calls = Arc::clone(&fallback.call_count);
        let chain = ProviderChain::new(vec![
            Box::new(MockMarketProvider::ok("first", &["BTC"])),
            Box::new(fallback),
        ]);

        let (source, coins) = chain.fetch_top_coins(100).await.unwrap();
        assert_eq!(source, "first");
        assert_eq!(coins[0].symbol, "BTC");
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_on_failure_and_empty() {
        let chain = ProviderChain::new(vec![
            Box::new(MockMarketProvider::failing("first")),
            Box::new(MockMarketProvider::ok("empty", &[])),
            Box::new(MockMarketProvider::ok("third", &["ETH", "BTC"])),
        ]);

        let (source, coins) = chain.fetch_top_coins(1).await.unwrap();
        assert_eq!(source, "third");
        assert_eq!(coins.len(), 1);
    }

    #[tokio::test]
    async fn test_all_fail() {
        let chain = ProviderChain::new(vec![
            Box::new(MockMarketProvider::failing("CoinGecko")),
            Box::new(MockMarketProvider::failing("CoinPaprika")),
        ]);

        let err = chain.fetch_top_coins(100).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to fetch market data from both CoinGecko and CoinPaprika. Please try again later."
        );

        let empty = ProviderChain::new(Vec::new());
        assert!(empty.fetch_top_coins(10).await.is_err());
    }
}
