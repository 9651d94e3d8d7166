//! Observable state shared between a data component and its consumers.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error};

/// What consumers see: the data, whether a fetch is running, and the error
/// of the last fetch if it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Single-writer state cell. Every write replaces the whole state, so readers
/// never observe a mix of old and new fields.
pub struct StateCell<T> {
    tx: watch::Sender<AggregatorState<T>>,
    refresh_lock: Mutex<()>,
}

impl<T> StateCell<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(AggregatorState {
            data: initial,
            loading: false,
            error: None,
            updated_at: None,
        });
        Self {
            tx,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> AggregatorState<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AggregatorState<T>> {
        self.tx.subscribe()
    }

    /// Marks a fetch as running, optionally clearing the data first.
    pub fn set_loading(&self, cleared: Option<T>) {
        self.tx.send_modify(|state| {
            state.loading = true;
            state.error = None;
            if let Some(data) = cleared {
                state.data = data;
            }
        });
    }

    pub fn succeed(&self, data: T) {
        self.tx.send_replace(AggregatorState {
            data,
            loading: false,
            error: None,
            updated_at: Some(Utc::now()),
        });
    }

    pub fn fail(&self, data: T, message: String) {
        self.tx.send_replace(AggregatorState {
            data,
            loading: false,
            error: Some(message),
            updated_at: None,
        });
    }

    /// Runs `fetch` and publishes its outcome. A failure publishes `empty`
    /// rather than keeping possibly stale data.
    ///
    /// Calls made while a fetch is already running wait for it and return
    /// its outcome instead of issuing another request.
    pub async fn run<F, Fut>(&self, empty: impl FnOnce() -> T, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _guard = match self.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Refresh already in flight, waiting for it");
                let _guard = self.refresh_lock.lock().await;
                let state = self.get();
                return match state.error {
                    Some(message) => Err(anyhow!(message)),
                    None => Ok(state.data),
                };
            }
        };

        self.set_loading(None);
        match fetch().await {
            Ok(data) => {
                self.succeed(data.clone());
                Ok(data)
            }
            Err(e) => {
                error!(error = ?e, "Refresh failed");
                let message = e.to_string();
                self.fail(empty(), message);
                Err(e)
            }
        }
    }
}
