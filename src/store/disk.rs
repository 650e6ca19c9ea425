//! Flat-file price cache: one `Date,OLD_PRICE` CSV per fund.

use crate::core::cache::PriceStore;
use crate::core::dates::{format_date, parse_date};
use crate::core::price::{FundSeries, filter_range, valid_price};
use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SERIES_PREFIX: &str = "cal_fund_data_";
pub const CHART_PREFIX: &str = "cal_fund_price_trend_";
pub const DATE_COLUMN: &str = "Date";
pub const PRICE_COLUMN: &str = "OLD_PRICE";

/// File-name-safe form of a fund display name. Stable across runs.
pub fn file_slug(fund: &str) -> String {
    fund.trim().replace([' ', '/'], "_")
}

pub fn series_file_name(fund: &str) -> String {
    format!("{SERIES_PREFIX}{}.csv", file_slug(fund))
}

pub fn chart_file_name(fund: &str) -> String {
    format!("{CHART_PREFIX}{}.svg", file_slug(fund))
}

/// Best-effort display name for a series file, e.g. for status listings.
///
/// Slashes cannot be recovered; they come back as spaces.
pub fn fund_name_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let slug = stem.strip_prefix(SERIES_PREFIX)?;
    Some(slug.replace('_', " "))
}

/// Reads a whole series file. A missing file is an empty series.
pub fn read_series_file(path: &Path) -> Result<FundSeries> {
    if !path.exists() {
        return Ok(FundSeries::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open price cache: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read headers of {}", path.display()))?
        .clone();
    let date_idx = headers
        .iter()
        .position(|h| h == DATE_COLUMN)
        .ok_or_else(|| anyhow!("Missing '{DATE_COLUMN}' column in {}", path.display()))?;
    let price_idx = headers
        .iter()
        .position(|h| h == PRICE_COLUMN || h == "Price")
        .ok_or_else(|| anyhow!("Missing '{PRICE_COLUMN}' column in {}", path.display()))?;

    let mut series = FundSeries::new();
    for (idx, record) in reader.records().enumerate() {
        // +2: header line plus 1-based numbering
        let line = idx + 2;
        let record =
            record.with_context(|| format!("CSV parse error at {}:{line}", path.display()))?;

        let raw_date = record.get(date_idx).unwrap_or_default();
        // Older exports carry a midnight timestamp after the date
        let date = parse_date(raw_date.get(..10).unwrap_or(raw_date))
            .with_context(|| format!("Bad date at {}:{line}", path.display()))?;
        let price = record
            .get(price_idx)
            .unwrap_or_default()
            .parse::<f64>()
            .ok()
            .and_then(valid_price)
            .ok_or_else(|| anyhow!("Bad price at {}:{line}", path.display()))?;

        series.insert(date, price);
    }
    Ok(series)
}

/// Rewrites `path` with `series`, sorted by date.
pub fn write_series_file(path: &Path, series: &FundSeries) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        writer.write_record([DATE_COLUMN, PRICE_COLUMN])?;
        for (date, price) in series {
            writer.write_record([format_date(*date), price.to_string()])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace price cache: {}", path.display()))?;
    Ok(())
}

/// Renames a damaged cache to `<name>.csv.bad` so a rewrite cannot lose it.
fn set_aside(path: &Path) -> Result<PathBuf> {
    let bad_path = path.with_extension("csv.bad");
    fs::rename(path, &bad_path).with_context(|| {
        format!(
            "Failed to move damaged price cache {} to {}",
            path.display(),
            bad_path.display()
        )
    })?;
    Ok(bad_path)
}

/// Removes each existing file in `paths`. Returns how many were removed.
fn remove_files(paths: &[PathBuf]) -> Result<usize> {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
            }
        }
    }
    Ok(removed)
}

/// Price cache rooted at a data directory.
#[derive(Debug, Clone)]
pub struct CsvPriceStore {
    dir: PathBuf,
}

impl CsvPriceStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        CsvPriceStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, fund: &str) -> PathBuf {
        self.dir.join(series_file_name(fund))
    }

    pub fn chart_path_for(&self, fund: &str) -> PathBuf {
        self.dir.join(chart_file_name(fund))
    }

    /// All persisted points for `fund`, degraded to empty on any read error.
    pub fn load_all(&self, fund: &str) -> FundSeries {
        let path = self.path_for(fund);
        match read_series_file(&path) {
            Ok(series) => series,
            Err(e) => {
                warn!(fund, path = %path.display(), error = %e, "Ignoring unreadable price cache");
                FundSeries::new()
            }
        }
    }

    /// Deletes the cache, chart and any set-aside copy for `fund`.
    pub fn remove(&self, fund: &str) -> Result<usize> {
        let series = self.path_for(fund);
        let removed = remove_files(&[
            series.with_extension("csv.bad"),
            self.chart_path_for(fund),
            series,
        ])?;
        debug!(fund, removed, "Removed cached files");
        Ok(removed)
    }

    /// Deletes every cache and chart file in the data directory, leaving
    /// anything else alone.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let owned: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| {
                            name.starts_with(SERIES_PREFIX) || name.starts_with(CHART_PREFIX)
                        })
            })
            .collect();
        let removed = remove_files(&owned)?;
        debug!(removed, dir = %self.dir.display(), "Cleared price cache");
        Ok(removed)
    }

    /// Series files present in the data directory, sorted by name.
    pub fn list_series(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "csv")
                    && path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| name.starts_with(SERIES_PREFIX))
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl PriceStore for CsvPriceStore {
    fn load(&self, fund: &str, start: NaiveDate, end: NaiveDate) -> FundSeries {
        let series = filter_range(&self.load_all(fund), start, end);
        debug!(fund, points = series.len(), "Loaded cached prices");
        series
    }

    fn merge_and_save(&self, fund: &str, points: &FundSeries) -> Result<()> {
        let path = self.path_for(fund);
        let mut series = match read_series_file(&path) {
            Ok(series) => series,
            Err(e) => {
                let kept = set_aside(&path)?;
                warn!(
                    fund,
                    path = %kept.display(),
                    error = %e,
                    "Moved unreadable price cache aside before saving"
                );
                FundSeries::new()
            }
        };
        series.extend(points.iter().map(|(date, price)| (*date, *price)));

        write_series_file(&path, &series)?;
        debug!(fund, points = series.len(), path = %path.display(), "Saved price cache");
        Ok(())
    }
}
