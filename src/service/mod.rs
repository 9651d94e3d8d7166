//! Stateful components that keep market, portfolio and chart data fresh.

pub mod market;
pub mod portfolio;
pub mod scheduler;
pub mod series;
pub mod state;

pub use market::MarketAggregator;
pub use portfolio::PortfolioAggregator;
pub use scheduler::PeriodicTask;
pub use series::SeriesFetcher;
pub use state::{AggregatorState, StateCell};

use crate::core::config::AppConfig;
use crate::core::series::{CoinOption, coin_options};
use crate::providers::coingecko::CoinGeckoProvider;
use crate::providers::coinpaprika::CoinPaprikaProvider;
use crate::providers::cryptocompare::CryptoCompareProvider;
use crate::providers::{HttpSettings, ProviderChain};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// The three data components wired to their configured providers.
pub struct Dashboard {
    pub market: Arc<MarketAggregator>,
    pub portfolio: Arc<PortfolioAggregator>,
    pub series: Arc<SeriesFetcher>,
    config: AppConfig,
}

impl Dashboard {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = HttpSettings::from(&config.http);
        let providers = &config.providers;

        let chain = ProviderChain::new(vec![
            Box::new(CoinGeckoProvider::new(
                &providers.coingecko.base_url,
                http.clone(),
            )?),
            Box::new(CoinPaprikaProvider::new(
                &providers.coinpaprika.base_url,
                http.clone(),
            )?),
        ]);
        debug!(providers = ?chain.names(), "Market provider chain");

        let tickers = CoinPaprikaProvider::new(&providers.coinpaprika.base_url, http.clone())?;
        let history = CryptoCompareProvider::new(
            &providers.cryptocompare.base_url,
            providers.cryptocompare.api_key.clone(),
            http,
        )?;

        Ok(Self {
            market: Arc::new(MarketAggregator::new(chain, config.top_n())),
            portfolio: Arc::new(PortfolioAggregator::new(
                Box::new(tickers),
                config.basket.clone(),
            )),
            series: Arc::new(SeriesFetcher::new(Box::new(history))),
            config: config.clone(),
        })
    }

    /// Starts the market and portfolio refresh timers. Both stop when the
    /// returned tasks are dropped.
    pub fn start(&self) -> Vec<PeriodicTask> {
        vec![
            self.market.start(self.config.refresh.market_interval()),
            self.portfolio.start(self.config.refresh.portfolio_interval()),
        ]
    }

    /// Chart picker options from the current market and portfolio state.
    pub fn coin_options(&self) -> Vec<CoinOption> {
        let market = self.market.state();
        let portfolio = self.portfolio.state();
        coin_options(
            &market.data.coins,
            &portfolio.data.holdings,
            self.config.market.selection_top_n,
        )
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
