use super::ui;
use crate::core::format::{format_currency, format_percent, format_price, format_time, format_volume};
use crate::core::portfolio::{
    EnrichedHolding, Horizon, PortfolioSnapshot, SortField, sorted_holdings,
};
use crate::service::PortfolioAggregator;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

pub async fn run(
    portfolio: &PortfolioAggregator,
    sort: Option<SortField>,
    descending: bool,
) -> Result<()> {
    let pb = ui::new_spinner("Fetching portfolio data...");
    let result = portfolio.refresh().await;
    pb.finish_and_clear();

    display_snapshot(&result?, sort, descending);
    Ok(())
}

pub fn display_snapshot(snapshot: &PortfolioSnapshot, sort: Option<SortField>, descending: bool) {
    let updated = snapshot
        .fetched_at
        .as_ref()
        .map_or("never".to_string(), format_time);
    println!(
        "\n{} {}",
        ui::style_text("Portfolio", ui::StyleType::Title),
        ui::style_text(&format!("(updated {updated})"), ui::StyleType::Subtle)
    );

    display_performance(snapshot);

    let holdings = match sort {
        Some(field) => sorted_holdings(&snapshot.holdings, field, descending),
        None => snapshot.holdings.clone(),
    };
    display_holdings(&holdings);

    println!(
        "{} {}",
        ui::style_text("Total Value:", ui::StyleType::TotalLabel),
        ui::style_text(
            &format_currency(Some(snapshot.total_value_usd)),
            ui::StyleType::TotalValue
        )
    );
}

fn display_performance(snapshot: &PortfolioSnapshot) {
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Performance")];
    header.extend(Horizon::ALL.iter().map(|h| ui::header_cell(&h.to_string())));
    table.set_header(header);

    let mut row = vec![Cell::new("Weighted")];
    row.extend(
        Horizon::ALL
            .iter()
            .map(|h| ui::change_cell(Some(snapshot.performance(*h)))),
    );
    table.add_row(row);
    println!("{table}");

    for (label, best, horizon) in [
        ("Best 1h", &snapshot.best_performer_1h, Horizon::OneHour),
        ("Best 24h", &snapshot.best_performer_24h, Horizon::OneDay),
    ] {
        let text = best.as_ref().map_or("N/A".to_string(), |h| {
            format!("{} {}", h.symbol, format_percent(h.percent_change(horizon)))
        });
        println!("{} {text}", ui::style_text(label, ui::StyleType::TotalLabel));
    }
}

fn display_holdings(holdings: &[EnrichedHolding]) {
    let mut table = ui::new_styled_table();
    let mut header = vec![
        ui::header_cell("Coin"),
        ui::header_cell("Amount"),
        ui::header_cell("Price"),
        ui::header_cell("Value"),
        ui::header_cell("Weight"),
        ui::header_cell("Actual"),
    ];
    header.extend(Horizon::ALL.iter().map(|h| ui::header_cell(&h.to_string())));
    header.push(ui::header_cell("Volume (24h)"));
    table.set_header(header);

    for holding in holdings {
        let mut row = vec![
            Cell::new(format!("{} ({})", holding.name, holding.symbol)),
            Cell::new(format!("{:.2}", holding.held_amount)).set_alignment(CellAlignment::Right),
            Cell::new(format_price(Some(holding.price_usd))).set_alignment(CellAlignment::Right),
            Cell::new(format_currency(Some(holding.value_usd))).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", holding.display_weight_percent))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}%", holding.actual_weight_percent))
                .set_alignment(CellAlignment::Right),
        ];
        row.extend(
            Horizon::ALL
                .iter()
                .map(|h| ui::change_cell(holding.percent_change(*h))),
        );
        row.push(ui::format_optional_cell(holding.volume_24h, |v| {
            format_volume(Some(v))
        }));
        table.add_row(row);
    }
    println!("{table}");
}
