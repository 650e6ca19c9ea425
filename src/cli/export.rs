use crate::core::PriceStore;
use crate::core::config::AppConfig;
use crate::core::dates::format_date;
use crate::core::price::FundSeries;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub fund: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Defaults to `<fund>_data.csv` in the working directory
    pub output: Option<PathBuf>,
}

/// Download-style file name: every non-alphanumeric character becomes `_`.
pub fn export_file_name(fund: &str) -> String {
    let stem: String = fund
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}_data.csv")
}

/// Writes a plain `Date,Price` table, oldest first.
pub fn write_export(path: &Path, series: &FundSeries) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["Date", "Price"])?;
    for (date, price) in series {
        writer.write_record([format_date(*date), price.to_string()])?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Copies the cached prices of one fund out to a standalone CSV.
pub fn export(store: &dyn PriceStore, fund: &str, options: &ExportOptions) -> Result<(PathBuf, usize)> {
    let start = options.start.unwrap_or(NaiveDate::MIN);
    let end = options.end.unwrap_or(NaiveDate::MAX);
    if start > end {
        bail!(
            "Start date {} is after end date {}",
            format_date(start),
            format_date(end)
        );
    }

    let series = store.load(fund, start, end);
    if series.is_empty() {
        bail!("No cached prices for fund: {fund}");
    }
    let path = options
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(export_file_name(fund)));
    write_export(&path, &series)?;
    info!(fund, points = series.len(), path = %path.display(), "Exported prices");
    Ok((path, series.len()))
}

pub fn run(config: &AppConfig, store: &dyn PriceStore, options: ExportOptions) -> Result<()> {
    let fund = options
        .fund
        .clone()
        .unwrap_or_else(|| config.default_fund.clone());
    let (path, points) = export(store, &fund, &options)?;
    println!("Exported {points} prices for {fund} to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dates::parse_date;
    use crate::store::MemoryPriceStore;
    use std::fs;
    use tempfile::tempdir;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(
            export_file_name("Capital Alliance Gilt/Money Fund (LKR)"),
            "Capital_Alliance_Gilt_Money_Fund__LKR__data.csv"
        );
    }

    #[test]
    fn test_export_writes_sorted_price_table() {
        let dir = tempdir().unwrap();
        let store = MemoryPriceStore::new();
        store
            .merge_and_save(
                "Fund A",
                &FundSeries::from([
                    (d("2024-07-01"), 13.0),
                    (d("2024-06-01"), 12.5),
                    (d("2024-06-15"), 12.75),
                ]),
            )
            .unwrap();

        let options = ExportOptions {
            output: Some(dir.path().join("out.csv")),
            ..Default::default()
        };
        let (path, points) = export(&store, "Fund A", &options).unwrap();
        assert_eq!(points, 3);
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "Date,Price\n2024-06-01,12.5\n2024-06-15,12.75\n2024-07-01,13\n"
        );

        let windowed = ExportOptions {
            start: Some(d("2024-06-10")),
            end: Some(d("2024-06-30")),
            output: Some(dir.path().join("june.csv")),
            ..Default::default()
        };
        assert_eq!(export(&store, "Fund A", &windowed).unwrap().1, 1);
    }

    #[test]
    fn test_export_without_data_fails() {
        let dir = tempdir().unwrap();
        let options = ExportOptions {
            output: Some(dir.path().join("out.csv")),
            ..Default::default()
        };
        let err = export(&MemoryPriceStore::new(), "Fund A", &options).unwrap_err();
        assert_eq!(err.to_string(), "No cached prices for fund: Fund A");
        assert!(!dir.path().join("out.csv").exists());
    }
}
