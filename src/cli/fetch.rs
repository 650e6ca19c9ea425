use super::prompt::{self, Input};
use super::ui;
use crate::chart;
use crate::core::config::AppConfig;
use crate::core::dates::{format_date, parse_date};
use crate::core::reconcile::{Attempt, Reconciler, Reconciliation};
use crate::core::{FundRatesSource, PriceStore};
use crate::store::{CsvPriceStore, MemoryPriceStore};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use console::Term;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub fund: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Seconds between requests
    pub delay: Option<f64>,
    pub no_save: bool,
}

impl FetchOptions {
    /// Anything left unset on the command line is asked for.
    fn is_interactive(&self) -> bool {
        self.fund.is_none() || self.start.is_none() || self.end.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub fund: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub delay: Duration,
}

/// Merges command-line options, config defaults and answers from `input`.
///
/// `catalog` is the list of funds offered when no fund was given.
pub fn resolve_request(
    config: &AppConfig,
    catalog: &[String],
    input: &mut dyn Input,
    options: &FetchOptions,
    today: NaiveDate,
) -> Result<FetchRequest> {
    let default_start = parse_date(&config.default_start_date)
        .context("Invalid default_start_date in config")?;

    let fund = match &options.fund {
        Some(fund) => fund.clone(),
        None if catalog.is_empty() => {
            input.tell(&ui::style_text(
                &format!(
                    "Could not load the fund list, using {}",
                    config.default_fund
                ),
                ui::StyleType::Subtle,
            ));
            config.default_fund.clone()
        }
        None => prompt::choose_fund(input, catalog, &config.default_fund)?,
    };

    let (start, end) = prompt::ask_range(input, options.start, options.end, default_start, today)?;

    let delay = match options.delay {
        Some(seconds) => Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("Invalid delay: {seconds}"))?,
        None if options.is_interactive() => prompt::ask_delay(input, config.request_delay())?,
        None => config.request_delay(),
    };

    Ok(FetchRequest {
        fund,
        start,
        end,
        delay,
    })
}

/// Reconciles one fund, ticking a progress bar per request.
pub async fn fetch_series(
    source: &dyn FundRatesSource,
    store: &dyn PriceStore,
    request: &FetchRequest,
) -> Result<Reconciliation> {
    let reconciler = Reconciler::new(source, store, request.delay);
    let plan = reconciler.plan(&request.fund, request.start, request.end);
    info!(
        fund = %request.fund,
        cached = plan.cached.len(),
        missing = plan.missing.len(),
        "Starting fetch"
    );

    let pb = ui::new_progress_bar(plan.missing.len() as u64, true);
    pb.set_message("Fetching prices");
    let on_attempt = |date: NaiveDate, attempt: Attempt| {
        if attempt != Attempt::Filled {
            pb.set_message(format!("No price for {}", format_date(date)));
        }
        pb.inc(1);
    };
    let result = reconciler.execute(plan, &on_attempt).await;
    pb.finish_and_clear();
    result
}

pub fn render_outcome(outcome: &Reconciliation, start: NaiveDate, end: NaiveDate) -> String {
    let title = format!(
        "{} ({} to {})",
        outcome.fund,
        format_date(start),
        format_date(end)
    );
    let mut output = format!("{}\n\n", ui::style_text(&title, ui::StyleType::Title));

    let Some(stats) = ui::series_stats(&outcome.series) else {
        output.push_str(&ui::style_text("No data collected", ui::StyleType::Error));
        return output;
    };
    output.push_str(&ui::series_table(&outcome.series).to_string());
    output.push_str("\n\n");
    output.push_str(&stats);

    let report = &outcome.report;
    output.push_str(&format!(
        "\n\n{} {} new, {} cached, {} requested",
        ui::style_text("Prices:", ui::StyleType::TotalLabel),
        ui::style_text(&report.filled.to_string(), ui::StyleType::TotalValue),
        report.cached,
        report.attempted
    ));
    output
}

pub async fn run(
    config: &AppConfig,
    provider: &dyn FundRatesSource,
    store: &CsvPriceStore,
    options: FetchOptions,
) -> Result<()> {
    let today = Local::now().date_naive();
    let catalog = if options.fund.is_none() {
        provider.discover_fund_names(today).await
    } else {
        Vec::new()
    };

    let mut term = Term::stdout();
    let request = resolve_request(config, &catalog, &mut term, &options, today)?;

    let memory = MemoryPriceStore::new();
    let target: &dyn PriceStore = if options.no_save { &memory } else { store };
    let outcome = fetch_series(provider, target, &request).await?;

    ui::print_separator();
    println!("{}", render_outcome(&outcome, request.start, request.end));

    if options.no_save || outcome.series.is_empty() {
        return Ok(());
    }
    // Chart the whole cached history, not just the requested window
    let history = store.load_all(&request.fund);
    match chart::write_chart(store.dir(), &request.fund, &history) {
        Ok(Some(path)) => println!(
            "\n{} {}",
            ui::style_text("Chart:", ui::StyleType::TotalLabel),
            path.display()
        ),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to write chart"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::prompt::tests::Scripted;
    use crate::core::rates::RatesPayload;
    use async_trait::async_trait;
    use serde_json::json;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    struct FixedPrice(f64);

    #[async_trait]
    impl FundRatesSource for FixedPrice {
        async fn fetch_day_data(&self, _date: NaiveDate) -> Option<RatesPayload> {
            Some(RatesPayload::new(json!({
                "UTMS_FUND": [{"FUND_NAME": "Fund A", "OLD_PRICE": self.0}]
            })))
        }
    }

    #[test]
    fn test_resolve_request_without_prompts() {
        let options = FetchOptions {
            fund: Some("Fund A".to_string()),
            start: Some(d("2024-01-01")),
            end: Some(d("2024-03-01")),
            delay: None,
            no_save: false,
        };
        let mut input = Scripted::new(&[]);
        let request = resolve_request(
            &AppConfig::default(),
            &[],
            &mut input,
            &options,
            d("2024-06-01"),
        )
        .unwrap();
        assert_eq!(request.fund, "Fund A");
        assert_eq!(request.delay, Duration::from_millis(500));
    }

    #[test]
    fn test_resolve_request_interactive() {
        let catalog = vec!["Fund A".to_string(), "Fund B".to_string()];
        let mut input = Scripted::new(&["2", "2024-01-01", "", "0"]);
        let request = resolve_request(
            &AppConfig::default(),
            &catalog,
            &mut input,
            &FetchOptions::default(),
            d("2024-06-01"),
        )
        .unwrap();
        assert_eq!(
            request,
            FetchRequest {
                fund: "Fund B".to_string(),
                start: d("2024-01-01"),
                end: d("2024-06-01"),
                delay: Duration::ZERO,
            }
        );
    }

    #[test]
    fn test_resolve_request_rejects_negative_delay() {
        let options = FetchOptions {
            fund: Some("Fund A".to_string()),
            start: Some(d("2024-01-01")),
            end: Some(d("2024-03-01")),
            delay: Some(-1.0),
            no_save: false,
        };
        let mut input = Scripted::new(&[]);
        let result = resolve_request(
            &AppConfig::default(),
            &[],
            &mut input,
            &options,
            d("2024-06-01"),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_series_and_render() {
        let store = MemoryPriceStore::new();
        let request = FetchRequest {
            fund: "Fund A".to_string(),
            start: d("2024-01-01"),
            end: d("2024-03-01"),
            delay: Duration::ZERO,
        };
        let outcome = fetch_series(&FixedPrice(10.0), &store, &request)
            .await
            .unwrap();
        assert_eq!(outcome.series.len(), 5);
        assert_eq!(store.load("Fund A", request.start, request.end).len(), 5);

        let rendered = render_outcome(&outcome, request.start, request.end);
        assert!(rendered.contains("2024-02-15"));
        assert!(!rendered.contains("No data collected"));
    }

    #[tokio::test]
    async fn test_render_without_data() {
        let store = MemoryPriceStore::new();
        let request = FetchRequest {
            fund: "Fund Z".to_string(),
            start: d("2024-01-01"),
            end: d("2024-01-01"),
            delay: Duration::ZERO,
        };
        let outcome = fetch_series(&FixedPrice(10.0), &store, &request)
            .await
            .unwrap();
        assert!(outcome.series.is_empty());
        assert!(render_outcome(&outcome, request.start, request.end).contains("No data collected"));
    }
}
