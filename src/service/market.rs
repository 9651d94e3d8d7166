use super::scheduler::PeriodicTask;
use super::state::{AggregatorState, StateCell};
use crate::core::market::MarketSnapshot;
use crate::providers::ProviderChain;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, instrument};

/// Keeps the latest market snapshot, fetched through a provider chain.
pub struct MarketAggregator {
    chain: ProviderChain,
    top_n: usize,
    state: StateCell<MarketSnapshot>,
}

impl MarketAggregator {
    pub fn new(chain: ProviderChain, top_n: usize) -> Self {
        Self {
            chain,
            top_n,
            state: StateCell::new(MarketSnapshot::empty()),
        }
    }

    /// Fetches the top coins and publishes a fresh snapshot. When every
    /// provider fails the published snapshot is empty and carries the error.
    #[instrument(name = "MarketRefresh", skip(self))]
    pub async fn refresh(&self) -> Result<MarketSnapshot> {
        self.state
            .run(MarketSnapshot::empty, || async {
                let (source, coins) = self.chain.fetch_top_coins(self.top_n).await?;
                let snapshot = MarketSnapshot::from_coins(coins, &source, Utc::now());
                info!(
                    source = %source,
                    coins = snapshot.coins.len(),
                    sentiment = %snapshot.sentiment,
                    "Market snapshot updated"
                );
                Ok(snapshot)
            })
            .await
    }

    pub fn state(&self) -> AggregatorState<MarketSnapshot> {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<AggregatorState<MarketSnapshot>> {
        self.state.subscribe()
    }

    /// Refreshes now and then every `period` until the returned task is dropped.
    pub fn start(self: &Arc<Self>, period: Duration) -> PeriodicTask {
        let aggregator = Arc::clone(self);
        PeriodicTask::spawn("market", period, move || {
            let aggregator = Arc::clone(&aggregator);
            async move {
                // Failures are already published to the state
                let _ = aggregator.refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::market::Sentiment;
    use crate::providers::chain::tests::MockMarketProvider;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_refresh_uses_fallback_when_primary_fails() {
        let primary = MockMarketProvider::failing("CoinGecko");
        let primary_calls = Arc::clone(&primary.call_count);
        let aggregator = MarketAggregator::new(
            ProviderChain::new(vec![
                Box::new(primary),
                Box::new(MockMarketProvider::ok("CoinPaprika", &["BTC", "ETH"])),
            ]),
            100,
        );

        let snapshot = aggregator.refresh().await.unwrap();
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(snapshot.source.as_deref(), Some("CoinPaprika"));
        assert_eq!(snapshot.coins.len(), 2);
        assert_eq!(snapshot.rising_count, 2);
        assert_eq!(snapshot.sentiment, Sentiment::Rise);

        let state = aggregator.state();
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.data, snapshot);
    }

    #[tokio::test]
    async fn test_refresh_publishes_empty_snapshot_when_all_fail() {
        let aggregator = MarketAggregator::new(
            ProviderChain::new(vec![
                Box::new(MockMarketProvider::failing("CoinGecko")),
                Box::new(MockMarketProvider::failing("CoinPaprika")),
            ]),
            100,
        );

        assert!(aggregator.refresh().await.is_err());
        let state = aggregator.state();
        assert!(!state.loading);
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to fetch market data from both CoinGecko and CoinPaprika. Please try again later.")
        );
        assert!(state.data.coins.is_empty());
        assert_eq!(state.data.sentiment, Sentiment::Neutral);
        assert_eq!(state.data.stats.total_market_cap, 0.0);
    }

    #[tokio::test]
    async fn test_start_refreshes_immediately() {
        let aggregator = Arc::new(MarketAggregator::new(
            ProviderChain::new(vec![Box::new(MockMarketProvider::ok("CoinGecko", &["BTC"]))]),
            10,
        ));
        let mut rx = aggregator.subscribe();

        let _task = aggregator.start(Duration::from_secs(60));
        let state = rx
            .wait_for(|s| s.updated_at.is_some())
            .await
            .unwrap()
            .clone();
        assert_eq!(state.data.coins.len(), 1);
    }
}
