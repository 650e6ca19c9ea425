//! Incremental cache reconciliation.
//!
//! A run first scans: it synthesizes the required sample dates for the range,
//! loads what the cache already holds and computes the gap set. It then fills
//! the gaps with one request per missing date, strictly in order, sleeping a
//! fixed delay between requests, and finally merges the new points back into
//! the cache. Dates that could not be filled are simply retried next run.

use crate::core::cache::PriceStore;
use crate::core::dates::date_range;
use crate::core::price::{FundSeries, filter_range};
use crate::core::rates::{FundRatesSource, extract_price};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a single fetch attempt, reported to progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// At least one requested fund got a price for the date.
    Filled,
    /// The payload arrived but held no usable price for the requested funds.
    NoPrice,
    /// The request itself failed.
    NoData,
}

/// Scanning result for one fund.
#[derive(Debug, Clone)]
pub struct ReconcilePlan {
    pub fund: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub required: Vec<NaiveDate>,
    pub cached: FundSeries,
    pub missing: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub required: usize,
    pub cached: usize,
    pub attempted: usize,
    pub filled: usize,
    pub saved: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub fund: String,
    /// Every known point for the requested range after the merge.
    pub series: FundSeries,
    pub report: ReconcileReport,
}

/// Scanning result for several funds sharing one range.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub funds: Vec<ReconcilePlan>,
    /// Union of the per-fund gap sets, in sample-date order.
    pub missing: Vec<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct BatchReconciliation {
    pub funds: Vec<Reconciliation>,
    pub requests: usize,
    /// Dates for which at least one fund obtained a price.
    pub dates_filled: usize,
}

/// The dates in `required` that have no cached price, in `required` order.
pub fn gap_set(required: &[NaiveDate], cached: &FundSeries) -> Vec<NaiveDate> {
    required
        .iter()
        .filter(|date| !cached.contains_key(date))
        .copied()
        .collect()
}

/// One reconciliation session over a rates source and a price store.
pub struct Reconciler<'a> {
    source: &'a dyn FundRatesSource,
    store: &'a dyn PriceStore,
    delay: Duration,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        source: &'a dyn FundRatesSource,
        store: &'a dyn PriceStore,
        delay: Duration,
    ) -> Self {
        if delay.is_zero() {
            warn!("Request delay is zero; the rates endpoint may throttle rapid requests");
        }
        Reconciler {
            source,
            store,
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn plan(&self, fund: &str, start: NaiveDate, end: NaiveDate) -> ReconcilePlan {
        let required = date_range(start, end);
        let cached = self.store.load(fund, start, end);
        let missing = gap_set(&required, &cached);
        debug!(
            fund,
            required = required.len(),
            cached = cached.len(),
            missing = missing.len(),
            "Scanned cache"
        );
        ReconcilePlan {
            fund: fund.to_string(),
            start,
            end,
            required,
            cached,
            missing,
        }
    }

    /// Fills the gaps of `plan` and persists the merged series.
    pub async fn execute(
        &self,
        plan: ReconcilePlan,
        on_attempt: &(dyn Fn(NaiveDate, Attempt) + Sync),
    ) -> Result<Reconciliation> {
        let mut fetched = FundSeries::new();

        for (i, date) in plan.missing.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }

            let attempt = match self.source.fetch_day_data(*date).await {
                Some(payload) => match extract_price(&payload, &plan.fund) {
                    Some(price) => {
                        debug!(fund = %plan.fund, %date, price, "Price collected");
                        fetched.insert(*date, price);
                        Attempt::Filled
                    }
                    None => {
                        info!(fund = %plan.fund, %date, "No price data found");
                        Attempt::NoPrice
                    }
                },
                None => {
                    info!(fund = %plan.fund, %date, "Failed to fetch data");
                    Attempt::NoData
                }
            };
            on_attempt(*date, attempt);
        }

        let mut report = ReconcileReport {
            required: plan.required.len(),
            cached: plan.cached.len(),
            attempted: plan.missing.len(),
            filled: fetched.len(),
            saved: false,
        };

        let series = self.merge(&plan, fetched, &mut report)?;
        Ok(Reconciliation {
            fund: plan.fund,
            series,
            report,
        })
    }

    /// Scans and fills a single fund.
    pub async fn reconcile(
        &self,
        fund: &str,
        start: NaiveDate,
        end: NaiveDate,
        on_attempt: &(dyn Fn(NaiveDate, Attempt) + Sync),
    ) -> Result<Reconciliation> {
        let plan = self.plan(fund, start, end);
        self.execute(plan, on_attempt).await
    }

    pub fn plan_batch(&self, funds: &[String], start: NaiveDate, end: NaiveDate) -> BatchPlan {
        let plans: Vec<ReconcilePlan> = funds
            .iter()
            .map(|fund| self.plan(fund, start, end))
            .collect();

        let wanted: HashSet<NaiveDate> = plans
            .iter()
            .flat_map(|plan| plan.missing.iter().copied())
            .collect();
        let missing = date_range(start, end)
            .into_iter()
            .filter(|date| wanted.contains(date))
            .collect();

        BatchPlan {
            start,
            end,
            funds: plans,
            missing,
        }
    }

    /// Fills every fund of `plan` with one request per missing date.
    ///
    /// Each payload serves all funds that lack that date.
    pub async fn execute_batch(
        &self,
        plan: BatchPlan,
        on_attempt: &(dyn Fn(NaiveDate, Attempt) + Sync),
    ) -> Result<BatchReconciliation> {
        let mut fetched: BTreeMap<String, FundSeries> = BTreeMap::new();
        let mut dates_filled = 0;

        for (i, date) in plan.missing.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }

            let attempt = match self.source.fetch_day_data(*date).await {
                Some(payload) => {
                    let mut any = false;
                    for fund_plan in plan.funds.iter().filter(|p| p.missing.contains(date)) {
                        if let Some(price) = extract_price(&payload, &fund_plan.fund) {
                            fetched
                                .entry(fund_plan.fund.clone())
                                .or_default()
                                .insert(*date, price);
                            any = true;
                        }
                    }
                    if any {
                        dates_filled += 1;
                        Attempt::Filled
                    } else {
                        info!(%date, "No price data found for any fund");
                        Attempt::NoPrice
                    }
                }
                None => {
                    info!(%date, "Failed to fetch data");
                    Attempt::NoData
                }
            };
            on_attempt(*date, attempt);
        }

        let requests = plan.missing.len();
        let mut results = Vec::with_capacity(plan.funds.len());
        for fund_plan in plan.funds {
            let points = fetched.remove(&fund_plan.fund).unwrap_or_default();
            let mut report = ReconcileReport {
                required: fund_plan.required.len(),
                cached: fund_plan.cached.len(),
                attempted: fund_plan.missing.len(),
                filled: points.len(),
                saved: false,
            };
            let series = self.merge(&fund_plan, points, &mut report)?;
            results.push(Reconciliation {
                fund: fund_plan.fund,
                series,
                report,
            });
        }

        info!(
            funds = results.len(),
            requests, dates_filled, "Batch reconciliation finished"
        );
        Ok(BatchReconciliation {
            funds: results,
            requests,
            dates_filled,
        })
    }

    fn merge(
        &self,
        plan: &ReconcilePlan,
        fetched: FundSeries,
        report: &mut ReconcileReport,
    ) -> Result<FundSeries> {
        let mut merged = plan.cached.clone();
        if !fetched.is_empty() {
            self.store
                .merge_and_save(&plan.fund, &fetched)
                .with_context(|| format!("Failed to save prices for fund: {}", plan.fund))?;
            report.saved = true;
            merged.extend(fetched);
        }
        Ok(filter_range(&merged, plan.start, plan.end))
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
