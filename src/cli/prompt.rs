//! Line-based prompts for the interactive commands.
//!
//! Invalid answers are reported and asked again; an empty answer takes the
//! offered default.

use super::ui;
use crate::core::dates::{format_date, parse_date};
use anyhow::Result;
use chrono::NaiveDate;
use console::Term;
use std::time::Duration;

/// Source of user answers.
pub trait Input {
    fn ask(&mut self, question: &str) -> Result<String>;
    fn tell(&mut self, message: &str);
}

impl Input for Term {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.write_str(question)?;
        Ok(self.read_line()?)
    }

    fn tell(&mut self, message: &str) {
        let _ = self.write_line(message);
    }
}

pub fn ask_date(input: &mut dyn Input, label: &str, default: NaiveDate) -> Result<NaiveDate> {
    loop {
        let answer = input.ask(&format!("{label} (YYYY-MM-DD) [{}]: ", format_date(default)))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(default);
        }
        match parse_date(answer) {
            Ok(date) => return Ok(date),
            Err(_) => input.tell(&ui::style_text(
                "Invalid date format. Please use YYYY-MM-DD.",
                ui::StyleType::Error,
            )),
        }
    }
}

/// Asks for whichever bound is not already known, re-asking both when the
/// answers are out of order.
pub fn ask_range(
    input: &mut dyn Input,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    default_start: NaiveDate,
    default_end: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    loop {
        let chosen_start = match start {
            Some(date) => date,
            None => ask_date(input, "Start date", default_start)?,
        };
        let chosen_end = match end {
            Some(date) => date,
            None => ask_date(input, "End date", default_end)?,
        };
        if chosen_start <= chosen_end {
            return Ok((chosen_start, chosen_end));
        }
        if start.is_some() && end.is_some() {
            anyhow::bail!(
                "Start date {} is after end date {}",
                format_date(chosen_start),
                format_date(chosen_end)
            );
        }
        input.tell(&ui::style_text(
            "Start date must be on or before the end date.",
            ui::StyleType::Error,
        ));
    }
}

pub fn parse_delay(answer: &str) -> Option<Duration> {
    let seconds: f64 = answer.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

pub fn ask_delay(input: &mut dyn Input, default: Duration) -> Result<Duration> {
    loop {
        let answer = input.ask(&format!(
            "Delay between requests in seconds [{}]: ",
            default.as_secs_f64()
        ))?;
        if answer.trim().is_empty() {
            return Ok(default);
        }
        match parse_delay(&answer) {
            Some(delay) => return Ok(delay),
            None => input.tell(&ui::style_text(
                "Invalid delay. Please enter a non-negative number of seconds.",
                ui::StyleType::Error,
            )),
        }
    }
}

/// Lets the user pick a fund by list number or exact name.
pub fn choose_fund(input: &mut dyn Input, funds: &[String], default: &str) -> Result<String> {
    input.tell(&ui::style_text("Available funds:", ui::StyleType::Title));
    for (i, fund) in funds.iter().enumerate() {
        input.tell(&format!("  {:>2}. {fund}", i + 1));
    }

    loop {
        let answer = input.ask(&format!("Select a fund by number or name [{default}]: "))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Ok(default.to_string());
        }
        if let Ok(number) = answer.parse::<usize>()
            && let Some(fund) = number.checked_sub(1).and_then(|i| funds.get(i))
        {
            return Ok(fund.clone());
        }
        if let Some(fund) = funds.iter().find(|fund| fund.as_str() == answer) {
            return Ok(fund.clone());
        }
        input.tell(&ui::style_text(
            "Unknown fund. Enter a number from the list or the exact fund name.",
            ui::StyleType::Error,
        ));
    }
}

/// Yes/no question that defaults to no.
pub fn confirm(input: &mut dyn Input, question: &str) -> Result<bool> {
    let answer = input.ask(&format!("{question} [y/N]: "))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted answers; running out of them is an error.
    pub(crate) struct Scripted {
        answers: VecDeque<String>,
        pub told: Vec<String>,
    }

    impl Scripted {
        pub(crate) fn new(answers: &[&str]) -> Self {
            Scripted {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                told: Vec::new(),
            }
        }
    }

    impl Input for Scripted {
        fn ask(&mut self, _question: &str) -> Result<String> {
            self.answers
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("No more input"))
        }

        fn tell(&mut self, message: &str) {
            self.told.push(message.to_string());
        }
    }

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_ask_date_reprompts_on_invalid_input() {
        let mut input = Scripted::new(&["2024/01/01", "yesterday", "2024-01-15"]);
        let date = ask_date(&mut input, "Start date", d("2013-01-01")).unwrap();
        assert_eq!(date, d("2024-01-15"));
        assert_eq!(input.told.len(), 2);
    }

    #[test]
    fn test_ask_date_takes_default_on_empty() {
        let mut input = Scripted::new(&[""]);
        assert_eq!(
            ask_date(&mut input, "Start date", d("2013-01-01")).unwrap(),
            d("2013-01-01")
        );
    }

    #[test]
    fn test_ask_range_reprompts_when_out_of_order() {
        let mut input = Scripted::new(&["2024-06-01", "2024-01-01", "2024-01-01", "2024-06-01"]);
        let range = ask_range(&mut input, None, None, d("2013-01-01"), d("2024-12-31")).unwrap();
        assert_eq!(range, (d("2024-01-01"), d("2024-06-01")));
        assert_eq!(input.told.len(), 1);
    }

    #[test]
    fn test_ask_range_rejects_fixed_bounds_out_of_order() {
        let mut input = Scripted::new(&[]);
        let result = ask_range(
            &mut input,
            Some(d("2024-06-01")),
            Some(d("2024-01-01")),
            d("2013-01-01"),
            d("2024-12-31"),
        );
        assert!(result.unwrap_err().to_string().contains("is after end date"));
    }

    #[test]
    fn test_ask_delay() {
        let mut input = Scripted::new(&["-1", "abc", "0.25"]);
        let delay = ask_delay(&mut input, Duration::from_millis(500)).unwrap();
        assert_eq!(delay, Duration::from_millis(250));
        assert_eq!(input.told.len(), 2);

        let mut input = Scripted::new(&[""]);
        assert_eq!(
            ask_delay(&mut input, Duration::from_millis(500)).unwrap(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_choose_fund_by_number_or_name() {
        let funds = vec!["Fund A".to_string(), "Fund B".to_string()];

        let mut input = Scripted::new(&["2"]);
        assert_eq!(choose_fund(&mut input, &funds, "Fund A").unwrap(), "Fund B");

        let mut input = Scripted::new(&["0", "fund a", "Fund A"]);
        assert_eq!(choose_fund(&mut input, &funds, "Fund B").unwrap(), "Fund A");

        let mut input = Scripted::new(&[""]);
        assert_eq!(choose_fund(&mut input, &funds, "Fund B").unwrap(), "Fund B");
    }

    #[test]
    fn test_confirm_defaults_to_no() {
        for (answer, expected) in [("y", true), (" YES ", true), ("", false), ("n", false), ("sure", false)] {
            let mut input = Scripted::new(&[answer]);
            assert_eq!(confirm(&mut input, "Remove?").unwrap(), expected, "{answer:?}");
        }
    }
}
