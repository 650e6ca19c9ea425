use crate::core::dates::format_date;
use crate::core::price::FundSeries;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(
        Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
        |v| Cell::new(format_fn(v)).set_alignment(CellAlignment::Right),
    )
}

pub fn price_cell(price: f64) -> Cell {
    Cell::new(format!("{price:.4}")).set_alignment(CellAlignment::Right)
}

/// Creates a cell for displaying percentage change with color coding.
pub fn change_cell(change: f64) -> Cell {
    let text = format!("{change:.2}%");
    if change >= 0.0 {
        Cell::new(text)
            .fg(Color::Green)
            .set_alignment(CellAlignment::Right)
    } else {
        Cell::new(text)
            .fg(Color::Red)
            .set_alignment(CellAlignment::Right)
    }
}

/// Creates a new `indicatif::ProgressBar` with standard styling.
pub fn new_progress_bar(len: u64, with_message: bool) -> ProgressBar {
    let template = if with_message {
        "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})"
    } else {
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})"
    };

    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Prints a separator line matching the terminal width.
pub fn print_separator() {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    println!("\n{}", "─".repeat(term_width));
}

/// Date/price table for a series, oldest first.
pub fn series_table(series: &FundSeries) -> Table {
    let mut table = new_styled_table();
    table.set_header(vec![header_cell("Date"), header_cell("Price (LKR)")]);
    for (date, price) in series {
        table.add_row(vec![Cell::new(format_date(*date)), price_cell(*price)]);
    }
    table
}

/// One-paragraph statistics block printed under a series.
pub fn series_stats(series: &FundSeries) -> Option<String> {
    let (first_date, first) = series.iter().next()?;
    let (last_date, last) = series.iter().next_back()?;
    let min = series.values().copied().fold(f64::INFINITY, f64::min);
    let max = series.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let change = (last - first) / first * 100.0;

    let mut table = new_styled_table();
    table.set_header(vec![
        header_cell("Points"),
        header_cell("First"),
        header_cell("Last"),
        header_cell("Min"),
        header_cell("Max"),
        header_cell("Change"),
    ]);
    table.add_row(vec![
        Cell::new(series.len()).set_alignment(CellAlignment::Right),
        Cell::new(format!("{first:.4} ({})", format_date(*first_date))),
        Cell::new(format!("{last:.4} ({})", format_date(*last_date))),
        price_cell(min),
        price_cell(max),
        change_cell(change),
    ]);
    Some(table.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dates::parse_date;

    #[test]
    fn test_series_stats() {
        let series = FundSeries::from([
            (parse_date("2024-01-01").unwrap(), 10.0),
            (parse_date("2024-02-01").unwrap(), 8.0),
            (parse_date("2024-03-01").unwrap(), 12.5),
        ]);
        let stats = series_stats(&series).unwrap();
        assert!(stats.contains("10.0000 (2024-01-01)"));
        assert!(stats.contains("12.5000 (2024-03-01)"));
        assert!(stats.contains("8.0000"));
        assert!(stats.contains("25.00%"));

        assert!(series_stats(&FundSeries::new()).is_none());
    }

    #[test]
    fn test_series_table_lists_every_point() {
        let series = FundSeries::from([
            (parse_date("2024-01-01").unwrap(), 10.0),
            (parse_date("2024-02-01").unwrap(), 8.0),
        ]);
        let rendered = series_table(&series).to_string();
        assert!(rendered.contains("2024-01-01"));
        assert!(rendered.contains("8.0000"));
    }
}
