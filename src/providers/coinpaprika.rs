use super::util::{HttpSettings, lenient_f64, lenient_u32};
use crate::core::market::{MarketProvider, NormalizedCoin};
use crate::core::portfolio::{Ticker, TickerProvider, UsdQuote};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

/// CoinPaprika `/v1/tickers`. Serves both as the fallback market provider
/// and as the ticker provider for the basket.
pub struct CoinPaprikaProvider {
    base_url: String,
    client: reqwest::Client,
    http: HttpSettings,
}

#[derive(Deserialize, Debug)]
struct RawTicker {
    id: String,
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    rank: Option<u32>,
    #[serde(default)]
    quotes: Option<RawQuotes>,
}

#[derive(Deserialize, Debug)]
struct RawQuotes {
    #[serde(rename = "USD", default)]
    usd: Option<RawQuote>,
}

#[derive(Deserialize, Debug)]
struct RawQuote {
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    volume_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    market_cap: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    percent_change_1h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    percent_change_24h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    percent_change_7d: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    percent_change_30d: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    percent_change_1y: Option<f64>,
}

impl From<RawTicker> for Ticker {
    fn from(raw: RawTicker) -> Self {
        let usd = raw.quotes.and_then(|q| q.usd).map(|q| UsdQuote {
            price: q.price,
            volume_24h: q.volume_24h,
            market_cap: q.market_cap,
            percent_change_1h: q.percent_change_1h,
            percent_change_24h: q.percent_change_24h,
            percent_change_7d: q.percent_change_7d,
            percent_change_30d: q.percent_change_30d,
            percent_change_1y: q.percent_change_1y,
        });
        Ticker {
            id: raw.id,
            symbol: raw.symbol,
            name: raw.name,
            // Rank 0 marks an unranked coin
            rank: raw.rank.unwrap_or(0),
            usd,
        }
    }
}

fn normalize(ticker: Ticker) -> NormalizedCoin {
    let quote = ticker.usd.unwrap_or_default();
    NormalizedCoin {
        id: ticker.id,
        symbol: ticker.symbol.to_uppercase(),
        name: ticker.name.unwrap_or_else(|| ticker.symbol.clone()),
        rank: ticker.rank,
        price: quote.price,
        percent_change_1h: quote.percent_change_1h,
        percent_change_24h: quote.percent_change_24h,
        percent_change_7d: quote.percent_change_7d,
        volume_24h: quote.volume_24h.unwrap_or(0.0),
        market_cap: quote.market_cap.unwrap_or(0.0),
        image: None,
    }
}

impl CoinPaprikaProvider {
    pub fn new(base_url: &str, http: HttpSettings) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http.build_client()?,
            http,
        })
    }
}

#[async_trait]
impl TickerProvider for CoinPaprikaProvider {
    #[instrument(name = "CoinPaprikaTickersFetch", skip(self))]
    async fn fetch_tickers(&self) -> Result<Vec<Ticker>> {
        let url = format!("{}/v1/tickers", self.base_url);
        debug!("Requesting tickers from {}", url);

        let body = self
            .http
            .get_text(|| self.client.get(&url))
            .await
            .with_context(|| format!("Request error for URL: {url}"))?;

        let tickers: Vec<RawTicker> =
            serde_json::from_str(&body).context("Invalid data format from CoinPaprika")?;
        debug!(count = tickers.len(), "Received CoinPaprika tickers");
        Ok(tickers.into_iter().map(Ticker::from).collect())
    }
}

#[async_trait]
impl MarketProvider for CoinPaprikaProvider {
    fn name(&self) -> &str {
        "CoinPaprika"
    }

    async fn fetch_top_coins(&self, limit: usize) -> Result<Vec<NormalizedCoin>> {
        let mut tickers = self.fetch_tickers().await?;
        if tickers.is_empty() {
            return Err(anyhow!("No tickers returned by CoinPaprika"));
        }

        // Rank 0 marks an unranked coin
        tickers.sort_by_key(|t| if t.rank == 0 { u32::MAX } else { t.rank });
        Ok(tickers.into_iter().take(limit).map(normalize).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/tickers"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(uri: &str) -> CoinPaprikaProvider {
        let http = HttpSettings {
            retries: 0,
            ..Default::default()
        };
        CoinPaprikaProvider::new(uri, http).unwrap()
    }

    const MOCK_JSON: &str = r#"[
        {
            "id": "eth-ethereum",
            "name": "Ethereum",
            "symbol": "ETH",
            "rank": 2,
            "quotes": {
                "USD": {
                    "price": 3000.0,
                    "volume_24h": 15000000000,
                    "market_cap": 360000000000,
                    "percent_change_1h": "n/a",
                    "percent_change_24h": -1.5,
                    "percent_change_7d": 3.0,
                    "percent_change_30d": 10.0,
                    "percent_change_1y": 55.5
                }
            }
        },
        {
            "id": "xyz-unranked",
            "name": "Unranked",
            "symbol": "XYZ",
            "rank": 0,
            "quotes": {"USD": {"price": 0.01}}
        },
        {
            "id": "btc-bitcoin",
            "name": "Bitcoin",
            "symbol": "btc",
            "rank": 1,
            "quotes": {
                "USD": {
                    "price": 60000.0,
                    "volume_24h": 35000000000,
                    "market_cap": 1200000000000,
                    "percent_change_1h": 0.2,
                    "percent_change_24h": 1.1
                }
            }
        },
        {
            "id": "nq-noquote",
            "name": "No Quote",
            "symbol": "NQ",
            "rank": 3
        }
    ]"#;

    #[tokio::test]
    async fn test_fetch_tickers() {
        let mock_server = create_mock_server(MOCK_JSON).await;
        let tickers = provider(&mock_server.uri()).fetch_tickers().await.unwrap();

        assert_eq!(tickers.len(), 4);
        let eth = &tickers[0];
        assert_eq!(eth.id, "eth-ethereum");
        let quote = eth.usd.as_ref().unwrap();
        assert_eq!(quote.price, Some(3000.0));
        assert!(quote.percent_change_1h.is_none());
        assert_eq!(quote.percent_change_1y, Some(55.5));
        assert!(tickers[3].usd.is_none());
    }

    #[tokio::test]
    async fn test_fetch_top_coins_in_rank_order() {
        let mock_server = create_mock_server(MOCK_JSON).await;
        let coins = provider(&mock_server.uri()).fetch_top_coins(3).await.unwrap();

        let symbols: Vec<_> = coins.iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, ["BTC", "ETH", "NQ"]);
        assert!(coins.iter().all(|c| c.image.is_none()));
        assert!(coins[0].percent_change_7d.is_none());
        assert_eq!(coins[1].percent_change_24h, Some(-1.5));
        assert_eq!(coins[2].market_cap, 0.0);
        assert!(coins[2].price.is_none());
    }

    #[tokio::test]
    async fn test_null_rank_is_unranked() {
        let mock_json = r#"[
            {"id": "nr-null", "name": "Null Rank", "symbol": "NR", "rank": null},
            {"id": "sr-string", "name": "String Rank", "symbol": "SR", "rank": "n/a"},
            {"id": "btc-bitcoin", "name": "Bitcoin", "symbol": "BTC", "rank": 1,
             "quotes": {"USD": {"price": 60000.0}}}
        ]"#;
        let mock_server = create_mock_server(mock_json).await;
        let paprika = provider(&mock_server.uri());

        let tickers = paprika.fetch_tickers().await.unwrap();
        assert_eq!(tickers.len(), 3);
        assert_eq!(tickers[0].rank, 0);
        assert_eq!(tickers[1].rank, 0);

        let coins = paprika.fetch_top_coins(100).await.unwrap();
        assert_eq!(coins[0].symbol, "BTC");
        assert_eq!(coins.len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_format_is_error() {
        let mock_server = create_mock_server(r#"{"error": "rate limited"}"#).await;
        let result = provider(&mock_server.uri()).fetch_tickers().await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid data format from CoinPaprika")
        );
    }

    #[tokio::test]
    async fn test_empty_tickers_is_market_error() {
        let mock_server = create_mock_server("[]").await;
        let paprika = provider(&mock_server.uri());

        assert!(paprika.fetch_tickers().await.unwrap().is_empty());
        assert!(paprika.fetch_top_coins(100).await.is_err());
    }
}
