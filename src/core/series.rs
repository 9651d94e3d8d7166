//! Historical price series for charting, and the coin picker options that
//! decide which symbol a chart shows.

use crate::core::market::NormalizedCoin;
use crate::core::portfolio::EnrichedHolding;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Hourly,
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    OneDay,
    SevenDays,
    ThirtyDays,
}

impl Timeframe {
    /// Resolution and number of points covering the timeframe.
    pub fn resolution(&self) -> (Resolution, u32) {
        match self {
            Timeframe::OneDay => (Resolution::Hourly, 24),
            Timeframe::SevenDays => (Resolution::Daily, 7),
            Timeframe::ThirtyDays => (Resolution::Daily, 30),
        }
    }

    pub fn label(&self, at: &DateTime<Utc>) -> String {
        match self.resolution().0 {
            Resolution::Hourly => at.format("%H:%M").to_string(),
            Resolution::Daily => at.format("%b %-d").to_string(),
        }
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Timeframe::OneDay => "24h",
                Timeframe::SevenDays => "7d",
                Timeframe::ThirtyDays => "30d",
            }
        )
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "24h" | "1d" => Ok(Timeframe::OneDay),
            "7d" => Ok(Timeframe::SevenDays),
            "30d" => Ok(Timeframe::ThirtyDays),
            _ => Err(anyhow::anyhow!("Invalid timeframe: {}", s)),
        }
    }
}

/// A raw close price as returned by a series provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalBar {
    pub time: DateTime<Utc>,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn empty(symbol: &str, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            points: Vec::new(),
        }
    }

    pub fn from_bars(symbol: &str, timeframe: Timeframe, bars: &[HistoricalBar]) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            points: bars
                .iter()
                .map(|bar| ChartPoint {
                    label: timeframe.label(&bar.time),
                    price: bar.close,
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
pub enum SeriesError {
    NoSelection,
    /// The provider answered but reported an error or had no data.
    Provider(String),
    Transport(anyhow::Error),
}

impl Display for SeriesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesError::NoSelection => write!(f, "Please select a coin."),
            SeriesError::Provider(message) => write!(f, "Failed to fetch chart data: {message}"),
            SeriesError::Transport(_) => {
                write!(f, "Failed to fetch chart data. Please try again later.")
            }
        }
    }
}

impl std::error::Error for SeriesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeriesError::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// A source of close prices, ending now, oldest first.
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    async fn fetch_history(
        &self,
        symbol: &str,
        resolution: Resolution,
        points: u32,
    ) -> Result<Vec<HistoricalBar>, SeriesError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinOption {
    pub symbol: String,
    pub name: String,
}

/// Picker options: the top market coins plus every basket symbol, first
/// occurrence wins, sorted by symbol.
pub fn coin_options(
    top_coins: &[NormalizedCoin],
    holdings: &[EnrichedHolding],
    top_n: usize,
) -> Vec<CoinOption> {
    let candidates = top_coins
        .iter()
        .take(top_n)
        .map(|c| (&c.symbol, &c.name))
        .chain(holdings.iter().map(|h| (&h.symbol, &h.name)));

    let mut seen: HashSet<String> = HashSet::new();
    let mut options: Vec<CoinOption> = candidates
        .filter(|(symbol, _)| seen.insert(symbol.to_string()))
        .map(|(symbol, name)| CoinOption {
            symbol: symbol.clone(),
            name: name.clone(),
        })
        .collect();
    options.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    options
}

/// Keeps the current selection if still offered, otherwise falls back to the
/// first option, or to no selection when there are none.
pub fn resolve_selection(current: Option<&str>, options: &[CoinOption]) -> Option<String> {
    match current {
        Some(symbol) if options.iter().any(|o| o.symbol == symbol) => Some(symbol.to_string()),
        _ => options.first().map(|o| o.symbol.clone()),
    }
}
