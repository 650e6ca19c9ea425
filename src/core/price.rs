//! Price series types shared by the cache, reconciler and presenters

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Date to price for a single fund, always in chronological order.
pub type FundSeries = BTreeMap<NaiveDate, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Returns the price only when it is a usable observation.
///
/// Zero and negative prices are upstream noise, not real quotes.
pub fn valid_price(price: f64) -> Option<f64> {
    (price.is_finite() && price > 0.0).then_some(price)
}

pub fn to_points(series: &FundSeries) -> Vec<PricePoint> {
    series
        .iter()
        .map(|(date, price)| PricePoint {
            date: *date,
            price: *price,
        })
        .collect()
}

/// Keeps the points with `start <= date <= end`.
pub fn filter_range(series: &FundSeries, start: NaiveDate, end: NaiveDate) -> FundSeries {
    if start > end {
        return FundSeries::new();
    }
    series
        .range(start..=end)
        .map(|(date, price)| (*date, *price))
        .collect()
}
