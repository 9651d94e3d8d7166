//! Core business logic abstractions

pub mod config;
pub mod format;
pub mod log;
pub mod market;
pub mod portfolio;
pub mod series;

// Re-export main types for cleaner imports
pub use market::{MarketProvider, MarketSnapshot, NormalizedCoin, Sentiment};
pub use portfolio::{EnrichedHolding, Horizon, PortfolioHolding, PortfolioSnapshot, TickerProvider};
pub use series::{ChartSeries, SeriesError, SeriesProvider, Timeframe};
