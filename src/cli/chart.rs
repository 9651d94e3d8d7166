use super::ui;
use crate::core::format::format_price;
use crate::core::series::{ChartSeries, Timeframe, resolve_selection};
use crate::service::Dashboard;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use futures::future::join;
use tracing::warn;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub async fn run(dashboard: &Dashboard, symbol: Option<&str>, timeframe: Timeframe) -> Result<()> {
    let pb = ui::new_spinner("Loading coin list...");
    let (market, portfolio) = join(dashboard.market.refresh(), dashboard.portfolio.refresh()).await;
    pb.finish_and_clear();
    if let Err(e) = &market {
        warn!(error = %e, "Chart picker built without market coins");
    }
    if let Err(e) = &portfolio {
        warn!(error = %e, "Chart picker built without portfolio coins");
    }

    let options = dashboard.coin_options();
    let requested = symbol.map(str::to_uppercase);
    let selected = resolve_selection(requested.as_deref(), &options);
    if let (Some(requested), Some(selected)) = (&requested, &selected) {
        if requested != selected {
            println!(
                "{}",
                ui::style_text(
                    &format!("{requested} is not in the coin list, showing {selected}"),
                    ui::StyleType::Subtle
                )
            );
        }
    }

    let pb = ui::new_spinner("Fetching chart data...");
    let result = match dashboard.series.select(selected.as_deref(), timeframe).await {
        Some(result) => result,
        None => dashboard.series.refresh().await,
    };
    pb.finish_and_clear();

    display_series(&result?);
    Ok(())
}

pub fn display_series(series: &ChartSeries) {
    println!(
        "\n{}",
        ui::style_text(
            &format!("{} ({})", series.symbol, series.timeframe),
            ui::StyleType::Title
        )
    );

    let prices: Vec<f64> = series.points.iter().map(|p| p.price).collect();
    println!("{}", sparkline(&prices));

    if let (Some(first), Some(last)) = (prices.first(), prices.last()) {
        let change = if *first > 0.0 {
            Some((last - first) / first * 100.0)
        } else {
            None
        };
        println!(
            "{} {}",
            ui::style_text("Change:", ui::StyleType::TotalLabel),
            crate::core::format::format_percent(change)
        );
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Time"), ui::header_cell("Price")]);
    for point in &series.points {
        table.add_row(vec![
            Cell::new(&point.label),
            Cell::new(format_price(Some(point.price))).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}

fn sparkline(prices: &[f64]) -> String {
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    prices
        .iter()
        .map(|p| {
            if range > 0.0 {
                let level = ((p - min) / range * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
                SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
            } else {
                SPARK_LEVELS[0]
            }
        })
        .collect()
}
