use crate::core::cache::PriceStore;
use crate::core::price::{FundSeries, filter_range};
use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// In-memory price cache, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryPriceStore {
    inner: RwLock<HashMap<String, FundSeries>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PriceStore for MemoryPriceStore {
    fn load(&self, fund: &str, start: NaiveDate, end: NaiveDate) -> FundSeries {
        let Ok(map) = self.inner.read() else {
            return FundSeries::new();
        };
        let series = map
            .get(fund)
            .map(|series| filter_range(series, start, end))
            .unwrap_or_default();
        debug!(fund, points = series.len(), "Cache HIT");
        series
    }

    fn merge_and_save(&self, fund: &str, points: &FundSeries) -> Result<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| anyhow!("Price store lock poisoned"))?;
        map.entry(fund.to_string())
            .or_default()
            .extend(points.iter().map(|(date, price)| (*date, *price)));
        debug!(fund, "Cache PUT");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_merge_overwrites_and_load_filters() {
        let store = MemoryPriceStore::new();
        assert!(store.load("Fund A", d("2024-01-01"), d("2024-12-31")).is_empty());

        store
            .merge_and_save(
                "Fund A",
                &FundSeries::from([(d("2024-06-01"), 1.0), (d("2024-07-01"), 2.0)]),
            )
            .unwrap();
        store
            .merge_and_save("Fund A", &FundSeries::from([(d("2024-06-01"), 1.5)]))
            .unwrap();

        assert_eq!(
            store.load("Fund A", d("2024-06-01"), d("2024-06-30")),
            FundSeries::from([(d("2024-06-01"), 1.5)])
        );
        assert_eq!(store.load("Fund A", d("2024-01-01"), d("2024-12-31")).len(), 2);
    }
}
