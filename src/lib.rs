pub mod cli;
pub mod core;
pub mod providers;
pub mod service;

use crate::core::config::AppConfig;
use crate::core::portfolio::SortField;
use crate::core::series::Timeframe;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Market,
    Portfolio {
        sort: Option<SortField>,
        descending: bool,
    },
    Chart {
        symbol: Option<String>,
        timeframe: Timeframe,
    },
    Watch {
        symbol: Option<String>,
        timeframe: Timeframe,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("coinpulse starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let dashboard = service::Dashboard::from_config(&config)?;

    match command {
        AppCommand::Market => cli::market::run(&dashboard.market).await,
        AppCommand::Portfolio { sort, descending } => {
            cli::portfolio::run(&dashboard.portfolio, sort, descending).await
        }
        AppCommand::Chart { symbol, timeframe } => {
            cli::chart::run(&dashboard, symbol.as_deref(), timeframe).await
        }
        AppCommand::Watch { symbol, timeframe } => {
            cli::watch::run(&dashboard, symbol.as_deref(), timeframe).await
        }
    }
}
