//! Sample-date synthesis for a reconciliation range.

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    // chrono accepts unpadded fields, the endpoint does not
    if trimmed.len() != 10 {
        bail!("Invalid date '{trimmed}'. Use YYYY-MM-DD");
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .with_context(|| format!("Invalid date '{trimmed}'. Use YYYY-MM-DD"))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Returns the 1st and 15th of every month in `[start, end]`, followed by
/// `end` itself when it is not one of those days.
///
/// An inverted range (`start > end`) yields no dates.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    if start > end {
        return dates;
    }

    let mut month_start = first_of_month(start);
    while month_start <= end {
        for day in [1, 15] {
            if let Some(candidate) = month_start.with_day(day)
                && candidate >= start
                && candidate <= end
            {
                dates.push(candidate);
            }
        }
        month_start = match next_month(month_start) {
            Some(next) => next,
            None => break,
        };
    }

    if !dates.contains(&end) {
        dates.push(end);
    }
    dates
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn next_month(month_start: NaiveDate) -> Option<NaiveDate> {
    if month_start.month() == 12 {
        NaiveDate::from_ymd_opt(month_start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(month_start.year(), month_start.month() + 1, 1)
    }
}
