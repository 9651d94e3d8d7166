use super::util::{HttpSettings, lenient_f64};
use crate::core::market::{MarketProvider, NormalizedCoin};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Primary market provider: the CoinGecko `/coins/markets` ranking.
pub struct CoinGeckoProvider {
    base_url: String,
    client: reqwest::Client,
    http: HttpSettings,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, http: HttpSettings) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http.build_client()?,
            http,
        })
    }
}

#[derive(Deserialize, Debug)]
struct MarketCoin {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    current_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
    #[serde(default)]
    market_cap_rank: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    total_volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percentage_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percentage_1h_in_currency: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_percentage_7d_in_currency: Option<f64>,
}

impl MarketCoin {
    fn normalize(self, position: usize) -> NormalizedCoin {
        NormalizedCoin {
            id: self.id,
            symbol: self.symbol.to_uppercase(),
            name: self.name,
            rank: self.market_cap_rank.unwrap_or(position as u32 + 1),
            price: self.current_price,
            percent_change_1h: self.price_change_percentage_1h_in_currency,
            percent_change_24h: self.price_change_percentage_24h,
            percent_change_7d: self.price_change_percentage_7d_in_currency,
            volume_24h: self.total_volume.unwrap_or(0.0),
            market_cap: self.market_cap.unwrap_or(0.0),
            image: self.image,
        }
    }
}

#[async_trait]
impl MarketProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "CoinGecko"
    }

    #[instrument(name = "CoinGeckoMarketsFetch", skip(self))]
    async fn fetch_top_coins(&self, limit: usize) -> Result<Vec<NormalizedCoin>> {
        let endpoint = format!("{}/api/v3/coins/markets", self.base_url);
        let per_page = limit.to_string();
        let params = [
            ("vs_currency", "usd"),
            ("order", "market_cap_desc"),
            ("per_page", per_page.as_str()),
            ("page", "1"),
            ("sparkline", "false"),
            ("price_change_percentage", "1h,24h,7d"),
        ];
        let url = reqwest::Url::parse_with_params(&endpoint, &params)
            .with_context(|| format!("Invalid CoinGecko URL: {endpoint}"))?;
        debug!("Requesting market data from {}", url);

        let body = self
            .http
            .get_text(|| self.client.get(url.clone()))
            .await
            .with_context(|| format!("Request error for URL: {url}"))?;

        let coins: Vec<MarketCoin> =
            serde_json::from_str(&body).context("Failed to parse CoinGecko markets response")?;
        if coins.is_empty() {
            return Err(anyhow!("No coins returned by CoinGecko"));
        }

        Ok(coins
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, coin)| coin.normalize(i))
            .collect())
    }
}
