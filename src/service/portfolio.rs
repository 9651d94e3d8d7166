use super::scheduler::PeriodicTask;
use super::state::{AggregatorState, StateCell};
use crate::core::portfolio::{PortfolioHolding, PortfolioSnapshot, TickerProvider, calculate_portfolio};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, instrument};

/// Keeps the latest valuation of a fixed basket.
pub struct PortfolioAggregator {
    provider: Box<dyn TickerProvider>,
    basket: Vec<PortfolioHolding>,
    state: StateCell<PortfolioSnapshot>,
}

impl PortfolioAggregator {
    pub fn new(provider: Box<dyn TickerProvider>, basket: Vec<PortfolioHolding>) -> Self {
        Self {
            provider,
            basket,
            state: StateCell::new(PortfolioSnapshot::empty()),
        }
    }

    pub fn basket(&self) -> &[PortfolioHolding] {
        &self.basket
    }

    /// Values the basket against the provider's full ticker list. On failure
    /// the published snapshot is zeroed rather than left stale.
    #[instrument(name = "PortfolioRefresh", skip(self), fields(holdings = self.basket.len()))]
    pub async fn refresh(&self) -> Result<PortfolioSnapshot> {
        self.state
            .run(PortfolioSnapshot::empty, || async {
                let tickers = self
                    .provider
                    .fetch_tickers()
                    .await
                    .context("Failed to fetch portfolio data.")?;
                if tickers.is_empty() {
                    bail!("Failed to fetch portfolio data. No tickers returned.");
                }

                let snapshot = calculate_portfolio(&self.basket, &tickers, Utc::now());
                info!(
                    total_value_usd = snapshot.total_value_usd,
                    tickers = tickers.len(),
                    "Portfolio snapshot updated"
                );
                Ok(snapshot)
            })
            .await
    }

    pub fn state(&self) -> AggregatorState<PortfolioSnapshot> {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<AggregatorState<PortfolioSnapshot>> {
        self.state.subscribe()
    }

    pub fn start(self: &Arc<Self>, period: Duration) -> PeriodicTask {
        let aggregator = Arc::clone(self);
        PeriodicTask::spawn("portfolio", period, move || {
            let aggregator = Arc::clone(&aggregator);
            async move {
                let _ = aggregator.refresh().await;
            }
        })
    }
}
