use super::util::HttpSettings;
use crate::core::series::{HistoricalBar, Resolution, SeriesError, SeriesProvider};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Hourly and daily close history from CryptoCompare.
pub struct CryptoCompareProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    http: HttpSettings,
}

#[derive(Deserialize, Debug)]
struct HistoryResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: Option<HistoryData>,
}

#[derive(Deserialize, Debug)]
struct HistoryData {
    #[serde(rename = "Data", default)]
    data: Vec<HistoryBar>,
}

#[derive(Deserialize, Debug)]
struct HistoryBar {
    time: i64,
    close: f64,
}

impl CryptoCompareProvider {
    pub fn new(base_url: &str, api_key: Option<String>, http: HttpSettings) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: http.build_client()?,
            http,
        })
    }

    fn endpoint(resolution: Resolution) -> &'static str {
        match resolution {
            Resolution::Hourly => "/data/v2/histohour",
            Resolution::Daily => "/data/v2/histoday",
        }
    }

    fn parse(body: &str) -> Result<Vec<HistoricalBar>, SeriesError> {
        let parsed: HistoryResponse = serde_json::from_str(body)
            .context("Failed to parse CryptoCompare history response")
            .map_err(SeriesError::Transport)?;

        let bars = parsed.data.map(|d| d.data).unwrap_or_default();
        if parsed.response != "Success" || bars.is_empty() {
            let message = if parsed.message.is_empty() {
                "No historical data available for this period.".to_string()
            } else {
                parsed.message
            };
            warn!(%message, "CryptoCompare returned no data");
            return Err(SeriesError::Provider(message));
        }

        Ok(bars
            .into_iter()
            .filter_map(|bar| {
                Utc.timestamp_opt(bar.time, 0).single().map(|time| HistoricalBar {
                    time,
                    close: bar.close,
                })
            })
            .collect())
    }
}

#[async_trait]
impl SeriesProvider for CryptoCompareProvider {
    #[instrument(name = "CryptoCompareHistoryFetch", skip(self))]
    async fn fetch_history(
        &self,
        symbol: &str,
        resolution: Resolution,
        points: u32,
    ) -> Result<Vec<HistoricalBar>, SeriesError> {
        let endpoint = format!("{}{}", self.base_url, Self::endpoint(resolution));
        let now: DateTime<Utc> = Utc::now();
        // The provider returns `limit + 1` points ending at `toTs`
        let limit = points.saturating_sub(1).to_string();
        let to_ts = now.timestamp().to_string();

        let mut params = vec![
            ("fsym", symbol),
            ("tsym", "USD"),
            ("limit", limit.as_str()),
            ("aggregate", "1"),
            ("toTs", to_ts.as_str()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
        let url = reqwest::Url::parse_with_params(&endpoint, &params)
            .with_context(|| format!("Invalid CryptoCompare URL: {endpoint}"))
            .map_err(SeriesError::Transport)?;
        debug!(%endpoint, symbol, "Requesting price history");

        let body = self
            .http
            .get_text(|| self.client.get(url.clone()))
            .await
            .map_err(SeriesError::Transport)?;

        Self::parse(&body)
    }
}
