//! Market data model and the provider abstraction for ranked coin lists.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;

/// A coin record in the one shape every market provider is mapped into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCoin {
    pub id: String,
    /// Always uppercase.
    pub symbol: String,
    pub name: String,
    pub rank: u32,
    pub price: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Rise,
    Fall,
    Neutral,
}

impl Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Sentiment::Rise => "rise",
                Sentiment::Fall => "fall",
                Sentiment::Neutral => "neutral",
            }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_market_cap: f64,
    pub total_volume_24h: f64,
    pub btc_dominance_percent: f64,
}

impl AggregateStats {
    /// Stats are computed from the fetched page itself, not from a global
    /// market endpoint, so dominance is relative to the page.
    pub fn from_coins(coins: &[NormalizedCoin]) -> Self {
        let total_market_cap: f64 = coins.iter().map(|c| c.market_cap).sum();
        let total_volume_24h: f64 = coins.iter().map(|c| c.volume_24h).sum();
        let btc_dominance_percent = coins
            .iter()
            .find(|c| c.symbol == "BTC")
            .filter(|_| total_market_cap > 0.0)
            .map_or(0.0, |btc| btc.market_cap / total_market_cap * 100.0);

        Self {
            total_market_cap,
            total_volume_24h,
            btc_dominance_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub coins: Vec<NormalizedCoin>,
    pub rising_count: usize,
    pub falling_count: usize,
    pub unchanged_count: usize,
    pub sentiment: Sentiment,
    pub stats: AggregateStats,
    pub fetched_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl MarketSnapshot {
    /// The documented empty state: no coins, zeroed stats, never fetched.
    pub fn empty() -> Self {
        Self {
            coins: Vec::new(),
            rising_count: 0,
            falling_count: 0,
            unchanged_count: 0,
            sentiment: Sentiment::Neutral,
            stats: AggregateStats::default(),
            fetched_at: None,
            source: None,
        }
    }

    /// Builds a snapshot from a freshly normalized page of coins.
    ///
    /// Symbols are unique within a snapshot: a repeated symbol keeps only its
    /// first record in rank order. Coins are partitioned by the sign of their
    /// 24h change; a missing or zero change counts as unchanged.
    pub fn from_coins(coins: Vec<NormalizedCoin>, source: &str, fetched_at: DateTime<Utc>) -> Self {
        let mut seen: HashSet<String> = HashSet::with_capacity(coins.len());
        let coins: Vec<NormalizedCoin> = coins
            .into_iter()
            .filter(|c| seen.insert(c.symbol.to_uppercase()))
            .collect();

        let mut rising_count = 0;
        let mut falling_count = 0;
        let mut unchanged_count = 0;
        for coin in &coins {
            match coin.percent_change_24h {
                Some(c) if c > 0.0 => rising_count += 1,
                Some(c) if c < 0.0 => falling_count += 1,
                _ => unchanged_count += 1,
            }
        }

        let sentiment = if rising_count > falling_count {
            Sentiment::Rise
        } else if falling_count > rising_count {
            Sentiment::Fall
        } else {
            Sentiment::Neutral
        };

        let stats = AggregateStats::from_coins(&coins);

        Self {
            coins,
            rising_count,
            falling_count,
            unchanged_count,
            sentiment,
            stats,
            fetched_at: Some(fetched_at),
            source: Some(source.to_string()),
        }
    }
}

impl Default for MarketSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// A source of top-ranked coins. Implementations resolve their own field
/// names and return records already normalized, in rank order.
#[async_trait]
pub trait MarketProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_top_coins(&self, limit: usize) -> Result<Vec<NormalizedCoin>>;
}
