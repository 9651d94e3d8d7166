use super::state::{AggregatorState, StateCell};
use crate::core::series::{
    ChartSeries, CoinOption, SeriesError, SeriesProvider, Timeframe, resolve_selection,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq)]
struct Selection {
    symbol: Option<String>,
    timeframe: Timeframe,
}

/// Fetches the chart series for the selected coin. Fetches are driven by
/// selection changes, never by a timer.
pub struct SeriesFetcher {
    provider: Box<dyn SeriesProvider>,
    state: StateCell<ChartSeries>,
    selection: Mutex<Selection>,
    // Bumped per fetch so a slow response for an old selection is not published
    generation: AtomicU64,
}

impl SeriesFetcher {
    pub fn new(provider: Box<dyn SeriesProvider>) -> Self {
        Self {
            provider,
            state: StateCell::new(ChartSeries::empty("", Timeframe::default())),
            selection: Mutex::new(Selection::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> AggregatorState<ChartSeries> {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<AggregatorState<ChartSeries>> {
        self.state.subscribe()
    }

    pub fn selected_symbol(&self) -> Option<String> {
        self.lock_selection().symbol.clone()
    }

    pub fn timeframe(&self) -> Timeframe {
        self.lock_selection().timeframe
    }

    /// Fetches and publishes the series for `symbol` over `timeframe`.
    ///
    /// The series is cleared while the fetch runs. Errors leave an empty
    /// series and the error message in the state.
    #[instrument(name = "SeriesFetch", skip(self))]
    pub async fn fetch_series(
        &self,
        symbol: Option<&str>,
        timeframe: Timeframe,
    ) -> Result<ChartSeries, SeriesError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let empty = ChartSeries::empty(symbol.unwrap_or_default(), timeframe);

        let Some(symbol) = symbol else {
            self.state.fail(empty, SeriesError::NoSelection.to_string());
            return Err(SeriesError::NoSelection);
        };

        self.state.set_loading(Some(empty.clone()));
        let (resolution, points) = timeframe.resolution();
        let result = self
            .provider
            .fetch_history(symbol, resolution, points)
            .await
            .map(|bars| ChartSeries::from_bars(symbol, timeframe, &bars));

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(symbol, "Selection changed during fetch, discarding result");
            return result;
        }

        match &result {
            Ok(series) => {
                info!(symbol, points = series.points.len(), "Chart series updated");
                self.state.succeed(series.clone());
            }
            Err(e) => {
                warn!(symbol, error = %e, "Chart series fetch failed");
                self.state.fail(empty, e.to_string());
            }
        }
        result
    }

    /// Changes the selection and fetches when it differs from the current
    /// one. Returns `None` when nothing changed.
    pub async fn select(
        &self,
        symbol: Option<&str>,
        timeframe: Timeframe,
    ) -> Option<Result<ChartSeries, SeriesError>> {
        let next = Selection {
            symbol: symbol.map(str::to_uppercase),
            timeframe,
        };
        self.apply(next).await
    }

    pub async fn set_timeframe(&self, timeframe: Timeframe) -> Option<Result<ChartSeries, SeriesError>> {
        let mut next = self.lock_selection().clone();
        next.timeframe = timeframe;
        self.apply(next).await
    }

    /// Re-resolves the selection against a new picker list, e.g. after a
    /// market refresh, falling back to the first option when the selected
    /// symbol is no longer offered.
    pub async fn update_options(&self, options: &[CoinOption]) -> Option<Result<ChartSeries, SeriesError>> {
        let mut next = self.lock_selection().clone();
        next.symbol = resolve_selection(next.symbol.as_deref(), options);
        self.apply(next).await
    }

    /// Fetches the current selection again.
    pub async fn refresh(&self) -> Result<ChartSeries, SeriesError> {
        let current = self.lock_selection().clone();
        self.fetch_series(current.symbol.as_deref(), current.timeframe)
            .await
    }

    async fn apply(&self, next: Selection) -> Option<Result<ChartSeries, SeriesError>> {
        {
            let mut selection = self.lock_selection();
            if *selection == next {
                return None;
            }
            *selection = next.clone();
        }
        Some(self.fetch_series(next.symbol.as_deref(), next.timeframe).await)
    }

    fn lock_selection(&self) -> std::sync::MutexGuard<'_, Selection> {
        // The selection is plain data, a poisoned lock still holds a valid value
        self.selection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::{HistoricalBar, Resolution};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockSeriesProvider {
        requests: Arc<StdMutex<Vec<(String, Resolution, u32)>>>,
        slow_symbol: Option<&'static str>,
    }

    #[async_trait]
    impl SeriesProvider for MockSeriesProvider {
        async fn fetch_history(
            &self,
            symbol: &str,
            resolution: Resolution,
            points: u32,
        ) -> Result<Vec<HistoricalBar>, SeriesError> {
            self.requests
                .lock()
                .unwrap()
                .push((symbol.to_string(), resolution, points));
            if self.slow_symbol == Some(symbol) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            match symbol {
                "ZZZ" => Err(SeriesError::Provider(
                    "There is no data for the symbol ZZZ".to_string(),
                )),
                "DOWN" => Err(SeriesError::Transport(anyhow::anyhow!("timed out"))),
                _ => Ok((0..points)
                    .map(|i| HistoricalBar {
                        time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                            + chrono::Duration::hours(i as i64),
                        close: 100.0 + i as f64,
                    })
                    .collect()),
            }
        }
    }

    fn option(symbol: &str) -> CoinOption {
        CoinOption {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_series_maps_timeframe() {
        let provider = MockSeriesProvider::default();
        let requests = Arc::clone(&provider.requests);
        let fetcher = SeriesFetcher::new(Box::new(provider));

        let series = fetcher
            .fetch_series(Some("BTC"), Timeframe::SevenDays)
            .await
            .unwrap();
        assert_eq!(series.points.len(), 7);
        assert_eq!(series.points[0].label, "Jan 1");

        fetcher.fetch_series(Some("BTC"), Timeframe::OneDay).await.unwrap();
        let recorded = requests.lock().unwrap().clone();
        assert_eq!(recorded[0], ("BTC".to_string(), Resolution::Daily, 7));
        assert_eq!(recorded[1], ("BTC".to_string(), Resolution::Hourly, 24));

        let state = fetcher.state();
        assert_eq!(state.data.points.len(), 24);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_provider_error_clears_series() {
        let fetcher = SeriesFetcher::new(Box::new(MockSeriesProvider::default()));
        fetcher.fetch_series(Some("BTC"), Timeframe::OneDay).await.unwrap();

        let err = fetcher
            .fetch_series(Some("ZZZ"), Timeframe::OneDay)
            .await
            .unwrap_err();
        assert!(matches!(err, SeriesError::Provider(_)));

        let state = fetcher.state();
        assert!(state.data.points.is_empty());
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to fetch chart data: There is no data for the symbol ZZZ")
        );

        fetcher.fetch_series(Some("DOWN"), Timeframe::OneDay).await.unwrap_err();
        assert_eq!(
            fetcher.state().error.as_deref(),
            Some("Failed to fetch chart data. Please try again later.")
        );
    }

    #[tokio::test]
    async fn test_no_selection() {
        let provider = MockSeriesProvider::default();
        let requests = Arc::clone(&provider.requests);
        let fetcher = SeriesFetcher::new(Box::new(provider));

        let err = fetcher.fetch_series(None, Timeframe::OneDay).await.unwrap_err();
        assert!(matches!(err, SeriesError::NoSelection));
        assert!(requests.lock().unwrap().is_empty());
        assert_eq!(fetcher.state().error.as_deref(), Some("Please select a coin."));
    }

    #[tokio::test]
    async fn test_selection_changes_drive_fetches() {
        let provider = MockSeriesProvider::default();
        let requests = Arc::clone(&provider.requests);
        let fetcher = SeriesFetcher::new(Box::new(provider));

        assert!(fetcher.select(Some("eth"), Timeframe::OneDay).await.is_some());
        assert_eq!(fetcher.selected_symbol().as_deref(), Some("ETH"));
        // Same selection again does not refetch
        assert!(fetcher.select(Some("ETH"), Timeframe::OneDay).await.is_none());
        assert_eq!(fetcher.timeframe(), Timeframe::OneDay);
        assert!(fetcher.set_timeframe(Timeframe::ThirtyDays).await.is_some());
        assert_eq!(fetcher.timeframe(), Timeframe::ThirtyDays);
        assert_eq!(requests.lock().unwrap().len(), 2);

        // ETH still offered: selection kept, no fetch
        let options = vec![option("BTC"), option("ETH")];
        assert!(fetcher.update_options(&options).await.is_none());

        // ETH dropped out: falls back to the first option
        let result = fetcher.update_options(&[option("ADA"), option("BTC")]).await;
        assert_eq!(result.unwrap().unwrap().symbol, "ADA");
        assert_eq!(fetcher.selected_symbol().as_deref(), Some("ADA"));
        assert_eq!(fetcher.timeframe(), Timeframe::ThirtyDays);

        // No options left: explicit no selection
        let result = fetcher.update_options(&[]).await;
        assert!(matches!(result, Some(Err(SeriesError::NoSelection))));
        assert!(fetcher.selected_symbol().is_none());
        assert_eq!(requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_stale_response_is_not_published() {
        let provider = MockSeriesProvider {
            slow_symbol: Some("SLOW"),
            ..Default::default()
        };
        let fetcher = Arc::new(SeriesFetcher::new(Box::new(provider)));

        let slow = {
            let fetcher = Arc::clone(&fetcher);
            tokio::spawn(async move { fetcher.fetch_series(Some("SLOW"), Timeframe::SevenDays).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        fetcher.fetch_series(Some("BTC"), Timeframe::SevenDays).await.unwrap();

        let stale = slow.await.unwrap().unwrap();
        assert_eq!(stale.symbol, "SLOW");
        assert_eq!(fetcher.state().data.symbol, "BTC");
    }
}
