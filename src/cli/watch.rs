use super::{chart, market, portfolio, ui};
use crate::core::config::AppConfig;
use crate::core::format::format_time;
use crate::core::{MarketSnapshot, PortfolioSnapshot};
use crate::core::series::Timeframe;
use crate::service::{AggregatorState, Dashboard};
use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};

/// Coins shown in the market table while watching.
const WATCH_TOP_COINS: usize = 10;

/// Keeps both aggregators refreshing on their timers and re-renders on every
/// update until Ctrl-C.
pub async fn run(dashboard: &Dashboard, symbol: Option<&str>, timeframe: Timeframe) -> Result<()> {
    let mut market_rx = dashboard.market.subscribe();
    let mut portfolio_rx = dashboard.portfolio.subscribe();

    // Seed the selection; it is resolved once the coin list is known
    let _ = dashboard.series.select(symbol, timeframe).await;

    let tasks = dashboard.start();
    info!(tasks = tasks.len(), "Watching market and portfolio");

    loop {
        tokio::select! {
            changed = market_rx.changed() => {
                changed.context("Market updates stopped")?;
            }
            changed = portfolio_rx.changed() => {
                changed.context("Portfolio updates stopped")?;
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted, stopping refresh tasks");
                break;
            }
        }

        let market_state = market_rx.borrow_and_update().clone();
        let portfolio_state = portfolio_rx.borrow_and_update().clone();
        if market_state.loading || portfolio_state.loading {
            continue;
        }

        let _ = dashboard.series.update_options(&dashboard.coin_options()).await;
        render(dashboard, &market_state, &portfolio_state)?;
    }

    drop(tasks);
    Ok(())
}

fn render(
    dashboard: &Dashboard,
    market_state: &AggregatorState<MarketSnapshot>,
    portfolio_state: &AggregatorState<PortfolioSnapshot>,
) -> Result<()> {
    console::Term::stdout()
        .clear_screen()
        .context("Failed to clear terminal")?;
    let header = status_line(
        dashboard.config(),
        dashboard.series.selected_symbol().as_deref(),
        dashboard.series.timeframe(),
    );
    println!(
        "{}",
        ui::style_text(
            &format!("coinpulse {} {header} (Ctrl-C to quit)", format_time(&Utc::now())),
            ui::StyleType::Subtle
        )
    );

    match &market_state.error {
        Some(message) => ui::print_error(message),
        None => market::display_snapshot(&market_state.data, Some(WATCH_TOP_COINS)),
    }

    ui::print_separator();
    match &portfolio_state.error {
        Some(message) => ui::print_error(message),
        None => portfolio::display_snapshot(&portfolio_state.data, None, false),
    }

    ui::print_separator();
    let series_state = dashboard.series.state();
    match &series_state.error {
        Some(message) => ui::print_error(message),
        None => chart::display_series(&series_state.data),
    }
    Ok(())
}

/// Refresh cadence and chart selection shown above the tables.
fn status_line(config: &AppConfig, symbol: Option<&str>, timeframe: Timeframe) -> String {
    format!(
        "| market every {}s, portfolio every {}s | chart {} {}",
        config.refresh.market_secs,
        config.refresh.portfolio_secs,
        symbol.unwrap_or("-"),
        timeframe
    )
}
