//! Portfolio basket model, ticker abstraction and the weighted performance
//! calculations over a fixed basket of coins.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Horizon {
    OneHour,
    OneDay,
    SevenDays,
    ThirtyDays,
    OneYear,
}

impl Horizon {
    pub const ALL: [Horizon; 5] = [
        Horizon::OneHour,
        Horizon::OneDay,
        Horizon::SevenDays,
        Horizon::ThirtyDays,
        Horizon::OneYear,
    ];
}

impl Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Horizon::OneHour => "1h",
                Horizon::OneDay => "24h",
                Horizon::SevenDays => "7d",
                Horizon::ThirtyDays => "30d",
                Horizon::OneYear => "1y",
            }
        )
    }
}

impl FromStr for Horizon {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1h" => Ok(Horizon::OneHour),
            "24h" | "1d" => Ok(Horizon::OneDay),
            "7d" => Ok(Horizon::SevenDays),
            "30d" => Ok(Horizon::ThirtyDays),
            "1y" => Ok(Horizon::OneYear),
            _ => Err(anyhow::anyhow!("Invalid horizon: {}", s)),
        }
    }
}

/// One entry of the fixed basket. Not derived from market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHolding {
    pub symbol: String,
    #[serde(alias = "amount")]
    pub held_amount: f64,
    #[serde(alias = "weight", default)]
    pub display_weight_percent: f64,
}

impl PortfolioHolding {
    pub fn new(symbol: &str, held_amount: f64, display_weight_percent: f64) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            held_amount,
            display_weight_percent,
        }
    }
}

/// USD quote block of a ticker. Any field the provider sent as something
/// other than a number is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsdQuote {
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub percent_change_30d: Option<f64>,
    pub percent_change_1y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    pub id: String,
    pub symbol: String,
    pub name: Option<String>,
    pub rank: u32,
    pub usd: Option<UsdQuote>,
}

/// A provider returning its full ticker list in one request.
#[async_trait]
pub trait TickerProvider: Send + Sync {
    async fn fetch_tickers(&self) -> Result<Vec<Ticker>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedHolding {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub held_amount: f64,
    pub display_weight_percent: f64,
    /// Live share of the basket's total value.
    pub actual_weight_percent: f64,
    pub price_usd: f64,
    pub value_usd: f64,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub percent_change_30d: Option<f64>,
    pub percent_change_1y: Option<f64>,
    pub volume_24h: Option<f64>,
}

impl EnrichedHolding {
    /// Zero-value stand-in for a holding the provider did not return.
    pub fn placeholder(holding: &PortfolioHolding) -> Self {
        Self {
            id: holding.symbol.to_lowercase(),
            symbol: holding.symbol.to_uppercase(),
            name: holding.symbol.clone(),
            held_amount: holding.held_amount,
            display_weight_percent: holding.display_weight_percent,
            actual_weight_percent: 0.0,
            price_usd: 0.0,
            value_usd: 0.0,
            percent_change_1h: None,
            percent_change_24h: None,
            percent_change_7d: None,
            percent_change_30d: None,
            percent_change_1y: None,
            volume_24h: None,
        }
    }

    fn from_quote(holding: &PortfolioHolding, ticker: &Ticker, quote: &UsdQuote, price: f64) -> Self {
        Self {
            id: ticker.id.clone(),
            symbol: holding.symbol.to_uppercase(),
            name: ticker.name.clone().unwrap_or_else(|| holding.symbol.clone()),
            held_amount: holding.held_amount,
            display_weight_percent: holding.display_weight_percent,
            actual_weight_percent: 0.0,
            price_usd: price,
            value_usd: holding.held_amount * price,
            percent_change_1h: quote.percent_change_1h,
            percent_change_24h: quote.percent_change_24h,
            percent_change_7d: quote.percent_change_7d,
            percent_change_30d: quote.percent_change_30d,
            percent_change_1y: quote.percent_change_1y,
            volume_24h: quote.volume_24h,
        }
    }

    pub fn percent_change(&self, horizon: Horizon) -> Option<f64> {
        match horizon {
            Horizon::OneHour => self.percent_change_1h,
            Horizon::OneDay => self.percent_change_24h,
            Horizon::SevenDays => self.percent_change_7d,
            Horizon::ThirtyDays => self.percent_change_30d,
            Horizon::OneYear => self.percent_change_1y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub holdings: Vec<EnrichedHolding>,
    pub total_value_usd: f64,
    pub weighted_performance: BTreeMap<Horizon, f64>,
    pub best_performer_1h: Option<EnrichedHolding>,
    pub best_performer_24h: Option<EnrichedHolding>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl PortfolioSnapshot {
    /// Zeroed state used before the first fetch and after a failed one.
    pub fn empty() -> Self {
        Self {
            holdings: Vec::new(),
            total_value_usd: 0.0,
            weighted_performance: Horizon::ALL.iter().map(|h| (*h, 0.0)).collect(),
            best_performer_1h: None,
            best_performer_24h: None,
            fetched_at: None,
        }
    }

    pub fn performance(&self, horizon: Horizon) -> f64 {
        self.weighted_performance
            .get(&horizon)
            .copied()
            .unwrap_or(0.0)
    }
}

impl Default for PortfolioSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Value-weighted average percent change for one horizon. Holdings without
/// data for the horizon contribute no change but still count toward the total.
pub fn weighted_performance(holdings: &[EnrichedHolding], total_value_usd: f64, horizon: Horizon) -> f64 {
    if total_value_usd == 0.0 {
        return 0.0;
    }
    let change_value: f64 = holdings
        .iter()
        .filter_map(|h| h.percent_change(horizon).map(|pc| h.value_usd * pc / 100.0))
        .sum();
    change_value / total_value_usd * 100.0
}

/// Highest known change for the horizon. Ties keep the earliest holding.
pub fn best_performer(holdings: &[EnrichedHolding], horizon: Horizon) -> Option<&EnrichedHolding> {
    let mut best: Option<(&EnrichedHolding, f64)> = None;
    for holding in holdings {
        if let Some(change) = holding.percent_change(horizon) {
            if best.is_none_or(|(_, highest)| change > highest) {
                best = Some((holding, change));
            }
        }
    }
    best.map(|(holding, _)| holding)
}

/// Enriches every basket entry from the ticker list and derives the
/// portfolio-level figures. The result always has one holding per basket
/// entry, in basket order.
pub fn calculate_portfolio(
    basket: &[PortfolioHolding],
    tickers: &[Ticker],
    fetched_at: DateTime<Utc>,
) -> PortfolioSnapshot {
    let mut by_symbol: HashMap<String, &Ticker> = HashMap::with_capacity(tickers.len());
    for ticker in tickers {
        by_symbol.entry(ticker.symbol.to_uppercase()).or_insert(ticker);
    }

    let mut holdings: Vec<EnrichedHolding> = basket
        .iter()
        .map(|holding| {
            let found = by_symbol
                .get(&holding.symbol.to_uppercase())
                .and_then(|t| t.usd.as_ref().map(|q| (*t, q)))
                .and_then(|(t, q)| q.price.map(|p| (t, q, p)));
            match found {
                Some((ticker, quote, price)) => EnrichedHolding::from_quote(holding, ticker, quote, price),
                None => {
                    warn!(symbol = %holding.symbol, "Ticker data not found or incomplete");
                    EnrichedHolding::placeholder(holding)
                }
            }
        })
        .collect();

    let total_value_usd: f64 = holdings.iter().map(|h| h.value_usd).sum();
    if total_value_usd > 0.0 {
        for holding in &mut holdings {
            holding.actual_weight_percent = holding.value_usd / total_value_usd * 100.0;
        }
    }

    let weighted_performance = Horizon::ALL
        .iter()
        .map(|h| (*h, weighted_performance(&holdings, total_value_usd, *h)))
        .collect();
    let best_performer_1h = best_performer(&holdings, Horizon::OneHour).cloned();
    let best_performer_24h = best_performer(&holdings, Horizon::OneDay).cloned();

    PortfolioSnapshot {
        holdings,
        total_value_usd,
        weighted_performance,
        best_performer_1h,
        best_performer_24h,
        fetched_at: Some(fetched_at),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Price,
    Change(Horizon),
    DisplayWeight,
}

impl FromStr for SortField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortField::Name),
            "price" => Ok(SortField::Price),
            "weight" => Ok(SortField::DisplayWeight),
            other => other
                .parse::<Horizon>()
                .map(SortField::Change)
                .map_err(|_| anyhow::anyhow!("Invalid sort field: {}", s)),
        }
    }
}

fn compare_optional(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Returns the holdings ordered for display. Missing values sort as smallest.
pub fn sorted_holdings(holdings: &[EnrichedHolding], field: SortField, descending: bool) -> Vec<EnrichedHolding> {
    let mut sorted = holdings.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = match field {
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::Price => compare_optional(Some(a.price_usd), Some(b.price_usd)),
            SortField::Change(h) => compare_optional(a.percent_change(h), b.percent_change(h)),
            SortField::DisplayWeight => compare_optional(
                Some(a.display_weight_percent),
                Some(b.display_weight_percent),
            ),
        };
        if descending { ordering.reverse() } else { ordering }
    });
    sorted
}
