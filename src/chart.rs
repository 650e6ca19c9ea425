//! Price trend charts rendered as standalone SVG documents.

use crate::core::analysis::moving_average;
use crate::core::dates::format_date;
use crate::core::price::FundSeries;
use crate::store::disk::{CsvPriceStore, chart_file_name, fund_name_from_path};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

const WIDTH: f64 = 1200.0;
const HEIGHT: f64 = 700.0;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_TOP: f64 = 80.0;
const MARGIN_BOTTOM: f64 = 90.0;
const Y_TICKS: usize = 5;
const LINE_COLOR: &str = "#1f77b4";
const AVERAGE_COLOR: &str = "#ff7f0e";
/// Samples per moving-average window; two samples a month makes this a quarter.
pub const MOVING_AVERAGE_PERIOD: usize = 6;
pub const SUBTITLE: &str = "Price Trend Analysis";

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders `series` as an SVG line chart with one marker per sample.
pub fn render_svg(fund: &str, series: &FundSeries) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let (first_date, last_date) = match (series.keys().next(), series.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return empty_svg(fund),
    };
    let min_price = series.values().copied().fold(f64::INFINITY, f64::min);
    let max_price = series.values().copied().fold(f64::NEG_INFINITY, f64::max);

    // Pad flat series so the line sits mid-plot
    let (low, high) = if (max_price - min_price).abs() < f64::EPSILON {
        (min_price * 0.95, max_price * 1.05)
    } else {
        let pad = (max_price - min_price) * 0.05;
        (min_price - pad, max_price + pad)
    };
    let span_days = (last_date - first_date).num_days().max(1) as f64;

    let x_of = |date: chrono::NaiveDate| {
        let offset = (date - first_date).num_days() as f64;
        if series.len() == 1 {
            MARGIN_LEFT + plot_w / 2.0
        } else {
            MARGIN_LEFT + offset / span_days * plot_w
        }
    };
    let y_of = |price: f64| MARGIN_TOP + (high - price) / (high - low) * plot_h;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="35" text-anchor="middle" font-size="20" font-weight="bold">{}</text>"#,
        WIDTH / 2.0,
        escape(fund)
    );
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="60" text-anchor="middle" font-size="14">{SUBTITLE}</text>"#,
        WIDTH / 2.0
    );

    for i in 0..=Y_TICKS {
        let price = low + (high - low) * i as f64 / Y_TICKS as f64;
        let y = y_of(price);
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#000" stroke-opacity="0.1"/>"##,
            MARGIN_LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="12">{price:.4}</text>"#,
            MARGIN_LEFT - 8.0,
            y + 4.0
        );
    }

    let _ = writeln!(
        svg,
        r##"<rect x="{MARGIN_LEFT}" y="{MARGIN_TOP}" width="{plot_w}" height="{plot_h}" fill="none" stroke="#333"/>"##
    );

    let points: Vec<String> = series
        .iter()
        .map(|(date, price)| format!("{:.1},{:.1}", x_of(*date), y_of(*price)))
        .collect();
    let _ = writeln!(
        svg,
        r#"<polyline fill="none" stroke="{LINE_COLOR}" stroke-width="2" stroke-opacity="0.7" points="{}"/>"#,
        points.join(" ")
    );

    let prices: Vec<f64> = series.values().copied().collect();
    let average_points: Vec<String> = series
        .keys()
        .zip(moving_average(&prices, MOVING_AVERAGE_PERIOD))
        .filter_map(|(date, average)| {
            average.map(|average| format!("{:.1},{:.1}", x_of(*date), y_of(average)))
        })
        .collect();
    if average_points.len() > 1 {
        let _ = writeln!(
            svg,
            r#"<polyline class="moving-average" fill="none" stroke="{AVERAGE_COLOR}" stroke-width="1.5" stroke-dasharray="6 4" points="{}"/>"#,
            average_points.join(" ")
        );
    }

    for (date, price) in series {
        let _ = writeln!(
            svg,
            r#"<circle cx="{:.1}" cy="{:.1}" r="4" fill="{LINE_COLOR}"><title>{}: {price:.4}</title></circle>"#,
            x_of(*date),
            y_of(*price),
            format_date(*date)
        );
    }

    let axis_y = MARGIN_TOP + plot_h + 25.0;
    let _ = writeln!(
        svg,
        r#"<text x="{MARGIN_LEFT}" y="{axis_y}" text-anchor="start" font-size="12">{}</text>"#,
        format_date(first_date)
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{axis_y}" text-anchor="end" font-size="12">{}</text>"#,
        MARGIN_LEFT + plot_w,
        format_date(last_date)
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="14">Date</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 25.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="25" y="{:.1}" text-anchor="middle" font-size="14" transform="rotate(-90 25 {:.1})">Price (LKR)</text>"#,
        MARGIN_TOP + plot_h / 2.0,
        MARGIN_TOP + plot_h / 2.0
    );
    svg.push_str("</svg>\n");
    svg
}

fn empty_svg(fund: &str) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}"><text x="{}" y="{}" text-anchor="middle">{}: no data</text></svg>
"#,
        WIDTH / 2.0,
        HEIGHT / 2.0,
        escape(fund)
    )
}

/// Writes the chart for `fund` next to its price cache.
///
/// Returns `None` without touching the disk when there is nothing to plot.
pub fn write_chart(dir: &Path, fund: &str, series: &FundSeries) -> Result<Option<PathBuf>> {
    if series.is_empty() {
        debug!(fund, "No data to chart");
        return Ok(None);
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    let path = dir.join(chart_file_name(fund));
    fs::write(&path, render_svg(fund, series))
        .with_context(|| format!("Failed to write chart: {}", path.display()))?;
    debug!(fund, path = %path.display(), "Chart written");
    Ok(Some(path))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartState {
    UpToDate,
    NeedsUpdate,
    Missing,
}

#[derive(Debug, Clone)]
pub struct ChartStatus {
    pub fund: String,
    pub series_path: PathBuf,
    pub chart_path: PathBuf,
    pub state: ChartState,
}

/// Compares each cached series with its chart by modification time.
pub fn chart_status(store: &CsvPriceStore) -> Result<Vec<ChartStatus>> {
    let mut statuses = Vec::new();
    for series_path in store.list_series()? {
        let Some(fund) = fund_name_from_path(&series_path) else {
            continue;
        };
        let chart_path = store.chart_path_for(&fund);
        let state = match (modified(&series_path), modified(&chart_path)) {
            (_, None) => ChartState::Missing,
            (Some(csv_time), Some(chart_time)) if csv_time > chart_time => ChartState::NeedsUpdate,
            _ => ChartState::UpToDate,
        };
        statuses.push(ChartStatus {
            fund,
            series_path,
            chart_path,
            state,
        });
    }
    Ok(statuses)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Redraws charts whose price cache changed, once the file has been quiet
/// for `settle`.
///
/// A series that fails to chart is not retried until it is modified again.
#[derive(Debug)]
pub struct ChartWatcher {
    settle: Duration,
    attempted: HashMap<PathBuf, SystemTime>,
}

impl ChartWatcher {
    pub fn new(settle: Duration) -> Self {
        ChartWatcher {
            settle,
            attempted: HashMap::new(),
        }
    }

    /// One scan of the data directory. Returns the charts written.
    pub fn poll(&mut self, store: &CsvPriceStore, now: SystemTime) -> Result<Vec<(String, PathBuf)>> {
        let mut written = Vec::new();
        for status in chart_status(store)? {
            if status.state == ChartState::UpToDate {
                continue;
            }
            let Some(changed_at) = modified(&status.series_path) else {
                continue;
            };
            if changed_at + self.settle > now {
                debug!(fund = %status.fund, "Price cache still settling");
                continue;
            }
            if self.attempted.get(&status.series_path) == Some(&changed_at) {
                continue;
            }
            self.attempted.insert(status.series_path.clone(), changed_at);

            let series = store.load_all(&status.fund);
            match write_chart(store.dir(), &status.fund, &series) {
                Ok(Some(path)) => written.push((status.fund, path)),
                Ok(None) => debug!(fund = %status.fund, "Changed cache holds no prices"),
                Err(e) => warn!(fund = %status.fund, error = %e, "Failed to redraw chart"),
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::PriceStore;
    use crate::core::dates::parse_date;
    use tempfile::tempdir;

    fn d(s: &str) -> chrono::NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_render_svg_contains_points_and_labels() {
        let series = FundSeries::from([
            (d("2024-06-01"), 12.5),
            (d("2024-06-15"), 13.0),
            (d("2024-07-01"), 12.75),
        ]);
        let svg = render_svg("Fund <A> & Co", &series);

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("Fund &lt;A&gt; &amp; Co"));
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains("2024-06-01: 12.5000"));
        assert!(svg.contains(">2024-07-01</text>"));
        assert!(svg.contains("Price (LKR)"));
    }

    #[test]
    fn test_title_is_fund_name_over_subtitle() {
        let series = FundSeries::from([(d("2024-06-01"), 12.5), (d("2024-06-15"), 13.0)]);
        let svg = render_svg("Capital Alliance Income Fund", &series);
        let title = svg
            .lines()
            .find(|line| line.contains(r#"y="35""#))
            .unwrap();
        assert!(title.ends_with(">Capital Alliance Income Fund</text>"));
        let subtitle = svg
            .lines()
            .find(|line| line.contains(r#"y="60""#))
            .unwrap();
        assert!(subtitle.ends_with(">Price Trend Analysis</text>"));
    }

    #[test]
    fn test_moving_average_drawn_once_window_fills() {
        let month_starts = |count: u32| -> FundSeries {
            (1..=count)
                .map(|m| (d(&format!("2024-{m:02}-01")), 10.0 + m as f64))
                .collect()
        };
        let short = render_svg("Fund A", &month_starts(MOVING_AVERAGE_PERIOD as u32));
        assert!(!short.contains("moving-average"));

        let long = render_svg("Fund A", &month_starts(9));
        let line = long
            .lines()
            .find(|line| line.contains("moving-average"))
            .unwrap();
        // One vertex per sample from the sixth on
        let points = line.split("points=\"").nth(1).unwrap();
        assert_eq!(points.split_whitespace().count(), 4);
    }

    #[test]
    fn test_render_single_point_series() {
        let series = FundSeries::from([(d("2024-06-01"), 12.5)]);
        let svg = render_svg("Fund A", &series);
        assert_eq!(svg.matches("<circle").count(), 1);
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn test_write_chart_skips_empty_series() {
        let dir = tempdir().unwrap();
        assert!(write_chart(dir.path(), "Fund A", &FundSeries::new()).unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_chart_status() {
        let dir = tempdir().unwrap();
        let store = CsvPriceStore::new(dir.path());
        let series = FundSeries::from([(d("2024-06-01"), 12.5)]);
        store.merge_and_save("Fund A", &series).unwrap();
        store.merge_and_save("Fund B", &series).unwrap();

        let path = write_chart(dir.path(), "Fund A", &series).unwrap().unwrap();
        assert_eq!(path, store.chart_path_for("Fund A"));

        let statuses = chart_status(&store).unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].fund, "Fund A");
        assert_eq!(statuses[0].state, ChartState::UpToDate);
        assert_eq!(statuses[1].fund, "Fund B");
        assert_eq!(statuses[1].state, ChartState::Missing);
    }

    fn backdate(path: &Path, by: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_watcher_redraws_changed_series_after_settling() {
        let dir = tempdir().unwrap();
        let store = CsvPriceStore::new(dir.path());
        let settle = Duration::from_secs(2);
        let mut watcher = ChartWatcher::new(settle);

        store
            .merge_and_save("Fund A", &FundSeries::from([(d("2024-06-01"), 12.5)]))
            .unwrap();
        // Just written, still inside the quiet period
        assert!(watcher.poll(&store, SystemTime::now()).unwrap().is_empty());
        assert!(!store.chart_path_for("Fund A").exists());

        backdate(&store.path_for("Fund A"), Duration::from_secs(10));
        let written = watcher.poll(&store, SystemTime::now()).unwrap();
        assert_eq!(
            written,
            vec![("Fund A".to_string(), store.chart_path_for("Fund A"))]
        );
        assert!(watcher.poll(&store, SystemTime::now()).unwrap().is_empty());

        // A later save makes the chart stale again
        backdate(&store.chart_path_for("Fund A"), Duration::from_secs(5));
        store
            .merge_and_save("Fund A", &FundSeries::from([(d("2024-06-15"), 13.0)]))
            .unwrap();
        let later = SystemTime::now() + settle * 2;
        let written = watcher.poll(&store, later).unwrap();
        assert_eq!(written.len(), 1);
        assert!(fs::read_to_string(&written[0].1).unwrap().contains("2024-06-15: 13.0000"));
    }

    #[test]
    fn test_watcher_ignores_unrelated_files_and_skips_failed_series() {
        let dir = tempdir().unwrap();
        let store = CsvPriceStore::new(dir.path());
        let mut watcher = ChartWatcher::new(Duration::ZERO);

        fs::write(dir.path().join("notes.csv"), "Date,OLD_PRICE\n2024-06-01,1\n").unwrap();
        fs::write(store.path_for("Fund Z"), "Date,OLD_PRICE\n").unwrap();
        let later = SystemTime::now() + Duration::from_secs(1);

        assert!(watcher.poll(&store, later).unwrap().is_empty());
        assert!(watcher.attempted.contains_key(&store.path_for("Fund Z")));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
        // Same modification time, not attempted again
        assert!(watcher.poll(&store, later).unwrap().is_empty());
        assert_eq!(watcher.attempted.len(), 1);
    }
}
