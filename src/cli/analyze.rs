use super::ui;
use crate::core::PriceStore;
use crate::core::analysis::{
    Analysis, AnalysisPreset, PeriodComparison, SIGNIFICANT_MOVE_PCT, classify_volatility,
    compare_periods, summarize,
};
use crate::core::config::AppConfig;
use crate::core::dates::{format_date, parse_date};
use crate::core::price::{filter_range, to_points};
use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use comfy_table::Cell;
use serde_json::json;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub fund: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub preset: Option<String>,
    /// Preset whose window is set against the analyzed one
    pub compare: Option<String>,
    pub json: bool,
}

fn resolve_range(
    config: &AppConfig,
    options: &AnalyzeOptions,
    today: NaiveDate,
) -> Result<(String, NaiveDate, NaiveDate)> {
    if let Some(preset) = &options.preset {
        let preset: AnalysisPreset = preset.parse()?;
        let (start, end) = preset.range(today);
        return Ok((preset.title().to_string(), start, end));
    }
    let start = match options.start {
        Some(date) => date,
        None => parse_date(&config.default_start_date)
            .context("Invalid default_start_date in config")?,
    };
    let end = options.end.unwrap_or(today);
    if start > end {
        bail!(
            "Start date {} is after end date {}",
            format_date(start),
            format_date(end)
        );
    }
    Ok(("Custom Period Analysis".to_string(), start, end))
}

pub fn render_analysis(fund: &str, title: &str, analysis: &Analysis) -> String {
    let mut output = format!(
        "{}\n{}\n\n",
        ui::style_text(fund, ui::StyleType::Title),
        ui::style_text(
            &format!(
                "{title}: {} to {}",
                format_date(analysis.start),
                format_date(analysis.end)
            ),
            ui::StyleType::Subtle
        )
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);
    table.add_row(vec![Cell::new("Data points"), Cell::new(analysis.stats.data_points)]);
    table.add_row(vec![Cell::new("Start price"), ui::price_cell(analysis.stats.start_price)]);
    table.add_row(vec![Cell::new("End price"), ui::price_cell(analysis.stats.end_price)]);
    table.add_row(vec![Cell::new("Min price"), ui::price_cell(analysis.stats.min_price)]);
    table.add_row(vec![Cell::new("Max price"), ui::price_cell(analysis.stats.max_price)]);
    table.add_row(vec![Cell::new("Average price"), ui::price_cell(analysis.stats.average_price)]);
    table.add_row(vec![Cell::new("Total return"), ui::change_cell(analysis.stats.total_return)]);
    table.add_row(vec![
        Cell::new("Volatility (annualized)"),
        Cell::new(format!("{:.2}%", analysis.volatility)),
    ]);
    table.add_row(vec![
        Cell::new("Trend"),
        Cell::new(format!(
            "{} ({:.2}%)",
            analysis.trend.direction, analysis.trend.strength
        )),
    ]);
    output.push_str(&table.to_string());

    output.push_str(&format!(
        "\n\n{} {}\n{}",
        ui::style_text("Trend:", ui::StyleType::TotalLabel),
        analysis.trend.direction.description(),
        classify_volatility(analysis.volatility).label()
    ));

    if !analysis.movements.is_empty() {
        output.push_str(&format!(
            "\n\n{}",
            ui::style_text(
                &format!("Significant moves (at least {SIGNIFICANT_MOVE_PCT}%)"),
                ui::StyleType::TotalLabel
            )
        ));
        for movement in &analysis.movements {
            output.push_str(&format!(
                "\n  {} to {}: {:.4} -> {:.4} ({:+.2}%, {})",
                format_date(movement.from_date),
                format_date(movement.to_date),
                movement.from_price,
                movement.to_price,
                movement.change_pct,
                movement.direction
            ));
        }
    }

    if !analysis.events.is_empty() {
        output.push_str(&format!(
            "\n\n{}",
            ui::style_text("Market context", ui::StyleType::TotalLabel)
        ));
        for event in &analysis.events {
            output.push_str(&format!(
                "\n  {} [{}] {}",
                event.date, event.impact, event.description
            ));
        }
    }

    if !analysis.insights.is_empty() {
        output.push_str(&format!(
            "\n\n{}",
            ui::style_text("Insights", ui::StyleType::TotalLabel)
        ));
        for insight in &analysis.insights {
            output.push_str(&format!("\n  - {insight}"));
        }
    }
    output
}

pub fn render_comparison(first_title: &str, second_title: &str, comparison: &PeriodComparison) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Metric"),
        ui::header_cell(first_title),
        ui::header_cell(second_title),
    ]);
    let (first, second) = (&comparison.first, &comparison.second);
    table.add_row(vec![
        Cell::new("Data points"),
        Cell::new(first.data_points),
        Cell::new(second.data_points),
    ]);
    table.add_row(vec![
        Cell::new("Average price"),
        ui::price_cell(first.average_price),
        ui::price_cell(second.average_price),
    ]);
    table.add_row(vec![
        Cell::new("Total return"),
        ui::change_cell(first.total_return),
        ui::change_cell(second.total_return),
    ]);

    format!(
        "{}\n\n{}\n\n{} {:+.2} points return, {:+.4} average price",
        ui::style_text("Period comparison", ui::StyleType::Title),
        table,
        ui::style_text("Difference:", ui::StyleType::TotalLabel),
        comparison.return_diff,
        comparison.average_diff
    )
}

pub fn run(config: &AppConfig, store: &dyn PriceStore, options: AnalyzeOptions) -> Result<()> {
    let today = Local::now().date_naive();
    let fund = options
        .fund
        .clone()
        .unwrap_or_else(|| config.default_fund.clone());
    let (title, start, end) = resolve_range(config, &options, today)?;
    let compare_with = options
        .compare
        .as_deref()
        .map(str::parse::<AnalysisPreset>)
        .transpose()?;

    let series = store.load(&fund, start, end);
    let Some(analysis) = summarize(&series, start, end) else {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Not enough cached data for {fund} between {} and {} (need at least 2 points)",
                    format_date(start),
                    format_date(end)
                ),
                ui::StyleType::Error
            )
        );
        return Ok(());
    };

    let comparison = match compare_with {
        Some(other) => {
            let (other_start, other_end) = other.range(today);
            let first: Vec<f64> = series.values().copied().collect();
            let second: Vec<f64> = store
                .load(&fund, other_start, other_end)
                .values()
                .copied()
                .collect();
            let comparison = compare_periods(&first, &second);
            if comparison.is_none() {
                warn!(fund = %fund, period = other.title(), "No cached prices to compare against");
            }
            comparison.map(|comparison| (other.title(), comparison))
        }
        None => None,
    };

    if options.json {
        let document = json!({
            "fund": fund,
            "period": title,
            "analysis": analysis,
            "comparison": comparison.as_ref().map(|(other, comparison)| json!({
                "period": other,
                "stats": comparison,
            })),
            "points": to_points(&filter_range(&series, start, end)),
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        ui::print_separator();
        println!("{}", render_analysis(&fund, &title, &analysis));
        if let Some((other, comparison)) = &comparison {
            ui::print_separator();
            println!("{}", render_comparison(&title, other, comparison));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::price::FundSeries;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_resolve_range_prefers_preset() {
        let options = AnalyzeOptions {
            preset: Some("crisis".to_string()),
            ..Default::default()
        };
        let (title, start, end) =
            resolve_range(&AppConfig::default(), &options, d("2025-01-10")).unwrap();
        assert!(title.contains("2022"));
        assert_eq!((start, end), (d("2022-01-01"), d("2022-12-31")));

        let bad = AnalyzeOptions {
            preset: Some("boom".to_string()),
            ..Default::default()
        };
        assert!(resolve_range(&AppConfig::default(), &bad, d("2025-01-10")).is_err());
    }

    #[test]
    fn test_resolve_range_defaults() {
        let (_, start, end) = resolve_range(
            &AppConfig::default(),
            &AnalyzeOptions::default(),
            d("2025-01-10"),
        )
        .unwrap();
        assert_eq!((start, end), (d("2013-01-01"), d("2025-01-10")));
    }

    #[test]
    fn test_resolve_range_rejects_reversed_dates() {
        let options = AnalyzeOptions {
            start: Some(d("2024-06-01")),
            end: Some(d("2024-01-01")),
            ..Default::default()
        };
        let err = resolve_range(&AppConfig::default(), &options, d("2025-01-10")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Start date 2024-06-01 is after end date 2024-01-01"
        );

        // A start after today with no end is reversed too
        let future = AnalyzeOptions {
            start: Some(d("2025-02-01")),
            ..Default::default()
        };
        assert!(resolve_range(&AppConfig::default(), &future, d("2025-01-10")).is_err());
    }

    #[test]
    fn test_render_analysis_lists_events() {
        let series = FundSeries::from([
            (d("2022-01-01"), 10.0),
            (d("2022-06-01"), 9.0),
            (d("2022-12-01"), 12.0),
        ]);
        let analysis = summarize(&series, d("2022-01-01"), d("2022-12-31")).unwrap();
        let rendered = render_analysis("Fund A", "Crisis", &analysis);
        assert!(rendered.contains("Fund A"));
        assert!(rendered.contains("Sri Lanka defaults on foreign debt"));
        assert!(rendered.contains("20.00%"));
        // 10 -> 9 is -10%, 9 -> 12 is +33%
        assert!(rendered.contains("Significant moves"));
        assert!(rendered.contains("2022-01-01 to 2022-06-01: 10.0000 -> 9.0000 (-10.00%, down)"));
        assert!(rendered.contains("(+33.33%, up)"));
    }

    #[test]
    fn test_render_comparison_shows_differences() {
        let comparison = compare_periods(&[20.0, 18.0, 17.0], &[17.0, 21.25]).unwrap();
        let rendered = render_comparison("Crisis", "Recovery", &comparison);
        assert!(rendered.contains("Crisis"));
        assert!(rendered.contains("Recovery"));
        assert!(rendered.contains("+40.00 points return"));
        assert!(rendered.contains("+0.7917 average price"));
    }
}
