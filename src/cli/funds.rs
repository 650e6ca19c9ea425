use super::ui;
use crate::core::dates::format_date;
use crate::core::rates::RatesPayload;
use crate::providers::cal_provider::CalProvider;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use comfy_table::{Cell, CellAlignment};

pub fn render_catalog(payload: &RatesPayload, date: NaiveDate) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Fund"),
        ui::header_cell("Price (LKR)"),
    ]);
    let prices = payload.all_prices();
    for (i, (fund, price)) in prices.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(fund),
            ui::format_optional_cell(*price, |p| format!("{p:.4}")),
        ]);
    }

    let title = format!("Funds published for {}", format_date(date));
    format!(
        "{}\n\n{}\n\n{} {}",
        ui::style_text(&title, ui::StyleType::Title),
        table,
        ui::style_text("Count:", ui::StyleType::TotalLabel),
        prices.len()
    )
}

pub async fn run(provider: &CalProvider, date: Option<NaiveDate>) -> Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    // The error carries the reason, unlike the reconciler's "no data"
    let payload = provider.fetch_fund_rates(date).await?;
    println!("{}", render_catalog(&payload, date));
    Ok(())
}
