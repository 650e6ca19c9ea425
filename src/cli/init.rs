use super::ui;
use crate::chart;
use crate::core::config::AppConfig;
use crate::core::dates::{format_date, parse_date};
use crate::core::reconcile::{Attempt, BatchReconciliation, Reconciler};
use crate::core::{FundRatesSource, PriceStore};
use crate::store::CsvPriceStore;
use anyhow::{Context, Result, bail};
use chrono::{Days, Local, NaiveDate};
use comfy_table::{Cell, CellAlignment};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Seconds between requests
    pub delay: Option<f64>,
}

/// Discovers every fund and fills all their caches in one pass.
pub async fn build_cache(
    source: &dyn FundRatesSource,
    store: &dyn PriceStore,
    start: NaiveDate,
    end: NaiveDate,
    delay: Duration,
) -> Result<BatchReconciliation> {
    if start > end {
        bail!(
            "Start date {} is after end date {}",
            format_date(start),
            format_date(end)
        );
    }

    let funds = source.discover_fund_names(end).await;
    if funds.is_empty() {
        bail!("No funds discovered for {}", format_date(end));
    }
    info!(funds = funds.len(), "Discovered funds");
    println!("Found {} funds", funds.len());

    let reconciler = Reconciler::new(source, store, delay);
    let plan = reconciler.plan_batch(&funds, start, end);
    println!(
        "{} dates to request between {} and {}",
        plan.missing.len(),
        format_date(start),
        format_date(end)
    );

    let pb = ui::new_progress_bar(plan.missing.len() as u64, true);
    pb.set_message("Building cache");
    let on_attempt = |date: NaiveDate, attempt: Attempt| {
        pb.set_message(format!("{} {attempt:?}", format_date(date)));
        pb.inc(1);
    };
    let result = reconciler.execute_batch(plan, &on_attempt).await;
    pb.finish_and_clear();
    result
}

pub fn render_summary(batch: &BatchReconciliation, charts: &[(String, PathBuf)]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Fund"),
        ui::header_cell("Cached"),
        ui::header_cell("New"),
        ui::header_cell("Points"),
        ui::header_cell("Latest"),
        ui::header_cell("Chart"),
    ]);

    for fund in &batch.funds {
        let latest = fund.series.iter().next_back();
        let chart = charts
            .iter()
            .find(|(name, _)| *name == fund.fund)
            .map(|(_, path)| path.display().to_string());
        table.add_row(vec![
            Cell::new(&fund.fund),
            Cell::new(fund.report.cached).set_alignment(CellAlignment::Right),
            Cell::new(fund.report.filled).set_alignment(CellAlignment::Right),
            Cell::new(fund.series.len()).set_alignment(CellAlignment::Right),
            ui::format_optional_cell(latest, |(date, price)| {
                format!("{price:.4} ({})", format_date(*date))
            }),
            Cell::new(chart.unwrap_or_else(|| "-".to_string())),
        ]);
    }

    format!(
        "{}\n\n{}\n\n{} {} requests, {} dates with prices",
        ui::style_text("Cache summary", ui::StyleType::Title),
        table,
        ui::style_text("Total:", ui::StyleType::TotalLabel),
        batch.requests,
        ui::style_text(&batch.dates_filled.to_string(), ui::StyleType::TotalValue)
    )
}

pub async fn run(
    config: &AppConfig,
    provider: &dyn FundRatesSource,
    store: &CsvPriceStore,
    options: InitOptions,
) -> Result<()> {
    let start = match options.start {
        Some(date) => date,
        None => parse_date(&config.default_start_date)
            .context("Invalid default_start_date in config")?,
    };
    let end = options.end.unwrap_or_else(|| {
        let today = Local::now().date_naive();
        today.checked_sub_days(Days::new(1)).unwrap_or(today)
    });
    let delay = match options.delay {
        Some(seconds) => Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("Invalid delay: {seconds}"))?,
        None => config.request_delay(),
    };

    let batch = build_cache(provider, store, start, end, delay).await?;

    let mut charts = Vec::new();
    for fund in &batch.funds {
        let history = store.load_all(&fund.fund);
        match chart::write_chart(store.dir(), &fund.fund, &history) {
            Ok(Some(path)) => charts.push((fund.fund.clone(), path)),
            Ok(None) => {}
            Err(e) => warn!(fund = %fund.fund, error = %e, "Failed to write chart"),
        }
    }

    ui::print_separator();
    println!("{}", render_summary(&batch, &charts));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::RatesPayload;
    use crate::store::MemoryPriceStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[derive(Default)]
    struct TwoFunds {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FundRatesSource for TwoFunds {
        async fn fetch_day_data(&self, _date: NaiveDate) -> Option<RatesPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(RatesPayload::new(json!({"UTMS_FUND": [
                {"FUND_NAME": "Fund A", "OLD_PRICE": "10.0"},
                {"FUND_NAME": "Fund B", "OLD_PRICE": "0"}
            ]})))
        }
    }

    #[tokio::test]
    async fn test_build_cache_fills_all_funds() {
        let source = TwoFunds::default();
        let store = MemoryPriceStore::new();
        let batch = build_cache(
            &source,
            &store,
            d("2024-01-01"),
            d("2024-03-01"),
            Duration::ZERO,
        )
        .await
        .unwrap();

        // One discovery call plus one request per sample date
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
        assert_eq!(batch.requests, 5);
        assert_eq!(batch.dates_filled, 5);
        assert_eq!(batch.funds.len(), 2);
        assert_eq!(batch.funds[0].series.len(), 5);
        assert!(batch.funds[1].series.is_empty());

        let rendered = render_summary(&batch, &[]);
        assert!(rendered.contains("Fund A"));
        assert!(rendered.contains("10.0000 (2024-03-01)"));
    }

    #[tokio::test]
    async fn test_build_cache_rejects_reversed_range() {
        let source = TwoFunds::default();
        let store = MemoryPriceStore::new();
        let result = build_cache(
            &source,
            &store,
            d("2024-03-01"),
            d("2024-01-01"),
            Duration::ZERO,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
