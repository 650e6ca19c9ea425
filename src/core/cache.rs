//! Persistent price cache abstraction.

use crate::core::price::FundSeries;
use anyhow::Result;
use chrono::NaiveDate;

/// Keyed date to price table, one per fund.
///
/// Saving rewrites the whole table for the fund; two writers on the same
/// fund race and the last one wins.
pub trait PriceStore: Send + Sync {
    /// Returns the cached points with `start <= date <= end`.
    ///
    /// Unreadable or malformed tables are reported and treated as empty.
    fn load(&self, fund: &str, start: NaiveDate, end: NaiveDate) -> FundSeries;

    /// Overlays `points` on the stored table and persists it sorted by date.
    fn merge_and_save(&self, fund: &str, points: &FundSeries) -> Result<()>;
}
