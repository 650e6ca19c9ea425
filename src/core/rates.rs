//! Daily fund rate payloads and the source abstraction that produces them.

use crate::core::price::valid_price;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const FUND_LIST_KEY: &str = "UTMS_FUND";
pub const FUND_NAME_KEY: &str = "FUND_NAME";
pub const PRICE_KEY: &str = "OLD_PRICE";

/// One day's response from the rates endpoint, kept verbatim.
///
/// The upstream schema is not under our control, so fields are looked up
/// lazily and anything unexpected reads as "no data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatesPayload(pub Value);

impl RatesPayload {
    pub fn new(value: Value) -> Self {
        RatesPayload(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn fund_entries(&self) -> impl Iterator<Item = &Value> {
        self.0
            .get(FUND_LIST_KEY)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    /// Distinct fund names, in the order the endpoint lists them.
    pub fn fund_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self
            .fund_entries()
            .filter_map(|entry| entry.get(FUND_NAME_KEY).and_then(Value::as_str))
            .filter(|name| !name.is_empty())
        {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Each listed fund with its price, resolved the same way as [`extract_price`].
    pub fn all_prices(&self) -> Vec<(String, Option<f64>)> {
        self.fund_names()
            .into_iter()
            .map(|name| {
                let price = extract_price(self, &name);
                (name, price)
            })
            .collect()
    }
}

/// Looks up `fund_name` (exact, case-sensitive match) and returns its price.
///
/// Missing funds, unparseable prices and prices `<= 0` all yield `None`.
pub fn extract_price(payload: &RatesPayload, fund_name: &str) -> Option<f64> {
    let Some(entry) = payload
        .fund_entries()
        .find(|entry| entry.get(FUND_NAME_KEY).and_then(Value::as_str) == Some(fund_name))
    else {
        debug!(fund = fund_name, "Fund not present in payload");
        return None;
    };

    let price = entry.get(PRICE_KEY).and_then(parse_price);
    if price.is_none() {
        debug!(fund = fund_name, raw = ?entry.get(PRICE_KEY), "Invalid price data");
    }
    price
}

fn parse_price(raw: &Value) -> Option<f64> {
    let price = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
        _ => return None,
    };
    valid_price(price)
}

/// Source of daily rate payloads.
#[async_trait]
pub trait FundRatesSource: Send + Sync {
    /// Fetches the payload for `date`. Any failure reads as "no data".
    async fn fetch_day_data(&self, date: NaiveDate) -> Option<RatesPayload>;

    /// Lists the funds offered on `sample_date`.
    async fn discover_fund_names(&self, sample_date: NaiveDate) -> Vec<String> {
        match self.fetch_day_data(sample_date).await {
            Some(payload) => payload.fund_names(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> RatesPayload {
        RatesPayload::new(json!({
            "UTMS_FUND": [
                {"FUND_NAME": "Fund A", "OLD_PRICE": "12.5"},
                {"FUND_NAME": "Fund B", "OLD_PRICE": 20.25},
                {"FUND_NAME": "Fund Zero", "OLD_PRICE": "0"},
                {"FUND_NAME": "Fund Negative", "OLD_PRICE": -3.0},
                {"FUND_NAME": "Fund Text", "OLD_PRICE": "n/a"},
                {"FUND_NAME": "Fund Missing"},
                {"FUND_NAME": "Fund A", "OLD_PRICE": "99"},
                {"OLD_PRICE": "1.0"}
            ]
        }))
    }

    #[test]
    fn test_extract_price_exact_match() {
        let payload = payload();
        assert_eq!(extract_price(&payload, "Fund A"), Some(12.5));
        assert_eq!(extract_price(&payload, "Fund B"), Some(20.25));
        assert_eq!(extract_price(&payload, "Fund A "), None);
        assert_eq!(extract_price(&payload, "fund a"), None);
        assert_eq!(extract_price(&payload, "Fund C"), None);
    }

    #[test]
    fn test_extract_price_rejects_invalid_values() {
        let payload = payload();
        assert_eq!(extract_price(&payload, "Fund Zero"), None);
        assert_eq!(extract_price(&payload, "Fund Negative"), None);
        assert_eq!(extract_price(&payload, "Fund Text"), None);
        assert_eq!(extract_price(&payload, "Fund Missing"), None);
    }

    #[test]
    fn test_extract_price_without_fund_list() {
        let payload = RatesPayload::new(json!({"success": false}));
        assert_eq!(extract_price(&payload, "Fund A"), None);
        assert!(payload.fund_names().is_empty());

        let payload = RatesPayload::new(json!({"UTMS_FUND": "unavailable"}));
        assert_eq!(extract_price(&payload, "Fund A"), None);
    }

    #[test]
    fn test_fund_names_are_distinct_and_ordered() {
        assert_eq!(
            payload().fund_names(),
            vec![
                "Fund A",
                "Fund B",
                "Fund Zero",
                "Fund Negative",
                "Fund Text",
                "Fund Missing"
            ]
        );
    }

    #[test]
    fn test_all_prices_uses_first_listing() {
        let prices = payload().all_prices();
        assert_eq!(prices.len(), 6);
        assert_eq!(prices[0], ("Fund A".to_string(), Some(12.5)));
        assert_eq!(prices[1], ("Fund B".to_string(), Some(20.25)));
        assert_eq!(prices[2], ("Fund Zero".to_string(), None));
    }
}
