//! Statistical summary and market-context commentary for a price series.
//!
//! Everything here is a pure function of the cached prices and a static
//! table of Sri Lankan economic events; nothing touches the network.

use crate::core::dates::parse_date;
use crate::core::price::{FundSeries, filter_range};
use anyhow::{Result, bail};
use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// Trading days used to annualize volatility.
const TRADING_DAYS: f64 = 252.0;
/// Regression slope (price units per sample) below which the trend is flat.
const TREND_SLOPE_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Display for Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Impact::High => "High",
                Impact::Medium => "Medium",
                Impact::Low => "Low",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EconomicEvent {
    pub date: &'static str,
    pub description: &'static str,
    pub impact: Impact,
}

pub const ECONOMIC_EVENTS: &[EconomicEvent] = &[
    EconomicEvent {
        date: "2022-03-01",
        description: "Sri Lanka economic crisis begins",
        impact: Impact::High,
    },
    EconomicEvent {
        date: "2022-04-01",
        description: "Sri Lanka defaults on foreign debt",
        impact: Impact::High,
    },
    EconomicEvent {
        date: "2022-07-01",
        description: "IMF bailout negotiations begin",
        impact: Impact::Medium,
    },
    EconomicEvent {
        date: "2023-03-01",
        description: "IMF approves $3 billion bailout package",
        impact: Impact::High,
    },
    EconomicEvent {
        date: "2023-09-01",
        description: "Central Bank policy rate adjustments",
        impact: Impact::Medium,
    },
    EconomicEvent {
        date: "2024-01-01",
        description: "Economic recovery measures implemented",
        impact: Impact::Medium,
    },
    EconomicEvent {
        date: "2024-06-01",
        description: "Tourism sector recovery",
        impact: Impact::Low,
    },
];

/// Events dated within `[start, end]`.
pub fn events_between(start: NaiveDate, end: NaiveDate) -> Vec<EconomicEvent> {
    ECONOMIC_EVENTS
        .iter()
        .filter(|event| {
            parse_date(event.date).is_ok_and(|date| date >= start && date <= end)
        })
        .copied()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Sideways,
}

impl Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TrendDirection::Uptrend => "Uptrend",
                TrendDirection::Downtrend => "Downtrend",
                TrendDirection::Sideways => "Sideways",
            }
        )
    }
}

impl TrendDirection {
    pub fn description(&self) -> &'static str {
        match self {
            TrendDirection::Uptrend => "Showing a positive trend with consistent price increases.",
            TrendDirection::Downtrend => "Showing a negative trend with price decreases.",
            TrendDirection::Sideways => "Relatively stable with minimal directional movement.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub slope: f64,
    /// Fitted move over half the window, as a percentage of the mean price.
    pub strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReturnClass {
    Strong,
    Positive,
    Stable,
    MinorDecline,
    SignificantDecline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolatilityClass {
    High,
    Moderate,
    Low,
}

impl VolatilityClass {
    pub fn label(&self) -> &'static str {
        match self {
            VolatilityClass::High => "High volatility - significant price swings observed.",
            VolatilityClass::Moderate => "Moderate volatility - some price fluctuations.",
            VolatilityClass::Low => "Low volatility - relatively stable period.",
        }
    }
}

pub fn classify_return(total_return: f64) -> ReturnClass {
    if total_return > 10.0 {
        ReturnClass::Strong
    } else if total_return > 0.0 {
        ReturnClass::Positive
    } else if total_return < -10.0 {
        ReturnClass::SignificantDecline
    } else if total_return < 0.0 {
        ReturnClass::MinorDecline
    } else {
        ReturnClass::Stable
    }
}

pub fn classify_volatility(volatility: f64) -> VolatilityClass {
    if volatility > 30.0 {
        VolatilityClass::High
    } else if volatility > 15.0 {
        VolatilityClass::Moderate
    } else {
        VolatilityClass::Low
    }
}

/// Annualized volatility in percent: population standard deviation of the
/// simple period returns, scaled by the square root of 252.
pub fn volatility(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = prices
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() * TRADING_DAYS.sqrt() * 100.0
}

/// Least-squares trend over the sample index.
pub fn trend(prices: &[f64]) -> Option<Trend> {
    if prices.len() < 2 {
        return None;
    }
    let n = prices.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, price) in prices.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += price;
        sum_xy += x * price;
        sum_x2 += x * x;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_x2 - sum_x * sum_x);
    let average = sum_y / n;
    let strength = ((slope * n / 2.0) / average).abs() * 100.0;

    let direction = if slope > TREND_SLOPE_THRESHOLD {
        TrendDirection::Uptrend
    } else if slope < -TREND_SLOPE_THRESHOLD {
        TrendDirection::Downtrend
    } else {
        TrendDirection::Sideways
    };

    Some(Trend {
        direction,
        slope,
        strength,
    })
}

pub fn insights(
    total_return: f64,
    volatility: f64,
    trend: &Trend,
    events: &[EconomicEvent],
) -> Vec<String> {
    let mut insights = Vec::new();

    insights.push(
        match classify_return(total_return) {
            ReturnClass::Strong => {
                "Strong Performance: the fund showed excellent returns during this period."
            }
            ReturnClass::Positive => "Positive Growth: the fund delivered modest positive returns.",
            ReturnClass::SignificantDecline => {
                "Significant Decline: the fund experienced substantial losses during this period."
            }
            ReturnClass::MinorDecline => "Minor Decline: the fund showed slight negative returns.",
            ReturnClass::Stable => {
                "Stable: the fund remained relatively flat with minimal change."
            }
        }
        .to_string(),
    );

    if volatility > 30.0 {
        insights.push(
            "High Risk Period: significant price fluctuations indicate higher investment risk."
                .to_string(),
        );
    } else if volatility < 10.0 {
        insights.push(
            "Stable Period: low volatility suggests a safer, more predictable investment period."
                .to_string(),
        );
    }

    match trend.direction {
        TrendDirection::Uptrend => insights.push(
            "Positive Momentum: the upward trend suggests growing investor confidence."
                .to_string(),
        ),
        TrendDirection::Downtrend => insights.push(
            "Negative Momentum: the downward trend indicates decreasing fund value over time."
                .to_string(),
        ),
        TrendDirection::Sideways => {}
    }

    let high_impact = events
        .iter()
        .filter(|event| event.impact == Impact::High)
        .count();
    if high_impact > 0 {
        insights.push(format!(
            "Major Events: {high_impact} high-impact economic events occurred during this period."
        ));
    }

    insights
}

/// Percent change between consecutive samples that counts as significant.
pub const SIGNIFICANT_MOVE_PCT: f64 = 5.0;

/// Trailing mean of the last `period` prices at each sample.
///
/// Entries before the first full window are `None`.
pub fn moving_average(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            let window_start = (i + 1).checked_sub(period).filter(|_| period > 0)?;
            let window = &prices[window_start..=i];
            Some(window.iter().sum::<f64>() / period as f64)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MoveDirection {
    Up,
    Down,
}

impl Display for MoveDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveDirection::Up => write!(f, "up"),
            MoveDirection::Down => write!(f, "down"),
        }
    }
}

/// A jump between two consecutive cached samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMovement {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub from_price: f64,
    pub to_price: f64,
    pub change_pct: f64,
    pub direction: MoveDirection,
}

/// Consecutive sample pairs whose percent change is at least `threshold`
/// in either direction, oldest first.
pub fn significant_movements(series: &FundSeries, threshold: f64) -> Vec<PriceMovement> {
    series
        .iter()
        .zip(series.iter().skip(1))
        .filter_map(|((from_date, from_price), (to_date, to_price))| {
            let change_pct = (to_price - from_price) / from_price * 100.0;
            if change_pct.abs() < threshold {
                return None;
            }
            Some(PriceMovement {
                from_date: *from_date,
                to_date: *to_date,
                from_price: *from_price,
                to_price: *to_price,
                change_pct,
                direction: if change_pct > 0.0 {
                    MoveDirection::Up
                } else {
                    MoveDirection::Down
                },
            })
        })
        .collect()
}

/// Basic statistics of a price run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStats {
    pub data_points: usize,
    pub start_price: f64,
    pub end_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub average_price: f64,
    /// Percent change from the first to the last price.
    pub total_return: f64,
}

pub fn period_stats(prices: &[f64]) -> Option<PeriodStats> {
    let start_price = *prices.first()?;
    let end_price = *prices.last()?;
    Some(PeriodStats {
        data_points: prices.len(),
        start_price,
        end_price,
        min_price: prices.iter().copied().fold(f64::INFINITY, f64::min),
        max_price: prices.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        average_price: prices.iter().sum::<f64>() / prices.len() as f64,
        total_return: (end_price - start_price) / start_price * 100.0,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub first: PeriodStats,
    pub second: PeriodStats,
    /// Second period's return minus the first's, in percentage points.
    pub return_diff: f64,
    pub average_diff: f64,
}

/// Compares two price runs. `None` if either is empty.
pub fn compare_periods(first: &[f64], second: &[f64]) -> Option<PeriodComparison> {
    let first = period_stats(first)?;
    let second = period_stats(second)?;
    Some(PeriodComparison {
        return_diff: second.total_return - first.total_return,
        average_diff: second.average_price - first.average_price,
        first,
        second,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(flatten)]
    pub stats: PeriodStats,
    pub volatility: f64,
    pub trend: Trend,
    pub movements: Vec<PriceMovement>,
    pub events: Vec<EconomicEvent>,
    pub insights: Vec<String>,
}

/// Summarizes the points of `series` within `[start, end]`.
///
/// Returns `None` when fewer than two points fall in the range.
pub fn summarize(series: &FundSeries, start: NaiveDate, end: NaiveDate) -> Option<Analysis> {
    let in_range = filter_range(series, start, end);
    let prices: Vec<f64> = in_range.values().copied().collect();
    let trend = trend(&prices)?;
    let stats = period_stats(&prices)?;

    let volatility = volatility(&prices);
    let events = events_between(start, end);
    let insights = insights(stats.total_return, volatility, &trend, &events);

    Some(Analysis {
        start,
        end,
        stats,
        volatility,
        trend,
        movements: significant_movements(&in_range, SIGNIFICANT_MOVE_PCT),
        events,
        insights,
    })
}

/// Named analysis windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPreset {
    /// Calendar 2022.
    Crisis,
    /// Calendar 2023.
    Recovery,
    /// The six months up to today.
    Recent,
}

impl AnalysisPreset {
    pub fn title(&self) -> &'static str {
        match self {
            AnalysisPreset::Crisis => "Economic Crisis Period Analysis (2022)",
            AnalysisPreset::Recovery => "Recovery Period Analysis (2023)",
            AnalysisPreset::Recent => "Recent 6 Months Analysis",
        }
    }

    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let ymd = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or(today);
        match self {
            AnalysisPreset::Crisis => (ymd(2022, 1, 1), ymd(2022, 12, 31)),
            AnalysisPreset::Recovery => (ymd(2023, 1, 1), ymd(2023, 12, 31)),
            AnalysisPreset::Recent => (
                today.checked_sub_months(Months::new(6)).unwrap_or(today),
                today,
            ),
        }
    }
}

impl FromStr for AnalysisPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crisis" => Ok(AnalysisPreset::Crisis),
            "recovery" => Ok(AnalysisPreset::Recovery),
            "recent" => Ok(AnalysisPreset::Recent),
            _ => bail!("Invalid analysis preset: {} (use crisis, recovery or recent)", s),
        }
    }
}
