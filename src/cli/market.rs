use super::ui;
use crate::core::format::{format_currency, format_price, format_time, format_volume};
use crate::core::market::MarketSnapshot;
use crate::service::MarketAggregator;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

pub async fn run(market: &MarketAggregator) -> Result<()> {
    let pb = ui::new_spinner("Fetching market data...");
    let result = market.refresh().await;
    pb.finish_and_clear();

    display_snapshot(&result?, None);
    Ok(())
}

/// Prints the overview and the coin table, optionally limited to the first
/// `limit` coins.
pub fn display_snapshot(snapshot: &MarketSnapshot, limit: Option<usize>) {
    display_overview(snapshot);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Coin"),
        ui::header_cell("Price"),
        ui::header_cell("1h"),
        ui::header_cell("24h"),
        ui::header_cell("7d"),
        ui::header_cell("Volume (24h)"),
        ui::header_cell("Market Cap"),
    ]);

    let shown = limit.unwrap_or(snapshot.coins.len());
    for coin in snapshot.coins.iter().take(shown) {
        table.add_row(vec![
            Cell::new(coin.rank).set_alignment(CellAlignment::Right),
            Cell::new(format!("{} ({})", coin.name, coin.symbol)),
            ui::format_optional_cell(coin.price, |p| format_price(Some(p))),
            ui::change_cell(coin.percent_change_1h),
            ui::change_cell(coin.percent_change_24h),
            ui::change_cell(coin.percent_change_7d),
            Cell::new(format_volume(Some(coin.volume_24h))).set_alignment(CellAlignment::Right),
            Cell::new(format_currency(Some(coin.market_cap))).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}

pub fn display_overview(snapshot: &MarketSnapshot) {
    let updated = snapshot
        .fetched_at
        .as_ref()
        .map_or("never".to_string(), format_time);
    println!(
        "\n{} {}",
        ui::style_text("Market Overview", ui::StyleType::Title),
        ui::style_text(
            &format!(
                "(via {}, updated {updated})",
                snapshot.source.as_deref().unwrap_or("no provider")
            ),
            ui::StyleType::Subtle
        )
    );

    let stats = &snapshot.stats;
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Total Market Cap"),
        ui::header_cell("24h Volume"),
        ui::header_cell("BTC Dominance"),
        ui::header_cell("Sentiment"),
    ]);
    table.add_row(vec![
        Cell::new(format_currency(Some(stats.total_market_cap))),
        Cell::new(format_currency(Some(stats.total_volume_24h))),
        Cell::new(format!("{:.2}%", stats.btc_dominance_percent)),
        Cell::new(format!(
            "{} ({} up, {} down, {} flat)",
            snapshot.sentiment,
            snapshot.rising_count,
            snapshot.falling_count,
            snapshot.unchanged_count
        )),
    ]);
    println!("{table}");
}
