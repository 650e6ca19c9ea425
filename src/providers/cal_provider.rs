use crate::core::config::CalProviderConfig;
use crate::core::dates::format_date;
use crate::core::rates::{FundRatesSource, RatesPayload};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the Capital Alliance unit trust rates endpoint.
pub struct CalProvider {
    base_url: String,
    action: String,
    client: reqwest::Client,
}

impl CalProvider {
    pub fn new(config: &CalProviderConfig) -> Result<Self> {
        Self::with_settings(&config.base_url, &config.action, config.timeout())
    }

    pub fn with_settings(base_url: &str, action: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("calfund/0.1")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(CalProvider {
            base_url: base_url.to_string(),
            action: action.to_string(),
            client,
        })
    }

    /// Fetches the rates for `date`, surfacing the reason on failure.
    pub async fn fetch_fund_rates(&self, date: NaiveDate) -> Result<RatesPayload> {
        let valuedate = format_date(date);
        debug!("Requesting fund rates from {} for {}", self.base_url, valuedate);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("action", self.action.as_str()), ("valuedate", valuedate.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to send request for date: {valuedate}"))?
            .error_for_status()
            .with_context(|| format!("Rates endpoint returned an error for date: {valuedate}"))?;

        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for date: {valuedate}"))?;

        if response_text.trim().is_empty() {
            return Err(anyhow!("Received empty response for date: {}", valuedate));
        }

        let value: Value = serde_json::from_str(&response_text).with_context(|| {
            format!("Failed to parse rates response for date: {valuedate}. Response: '{response_text}'")
        })?;

        debug!("Successfully fetched fund rates for {}", valuedate);
        Ok(RatesPayload::new(value))
    }
}

#[async_trait]
impl FundRatesSource for CalProvider {
    async fn fetch_day_data(&self, date: NaiveDate) -> Option<RatesPayload> {
        match self.fetch_fund_rates(date).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(%date, error = %e, "No rates for date");
                None
            }
        }
    }
}
