//! Posting-date normalization.
//!
//! Known imprecision: relative dates have day granularity,
//! a month counts as 30 days, and anything unparseable becomes `today`.
//! Changing any of this would shift dates of records already stored.

use chrono::{Days, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

const RELATIVE_MARKER: &str = "ago";

/// Tried in order; the first that parses wins.
const ABSOLUTE_FORMATS: [&str; 3] = ["%b %d, %Y", "%B %d, %Y", "%Y-%m-%d"];

// "5d ago", "2 weeks ago", "1mo ago"
static RELATIVE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*([a-z]+)").unwrap());

/// Resolve raw posting-date text to a calendar date. Never fails: absent or
/// unparseable text yields `today`.
pub fn normalize_posting_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return today;
    };

    let lowered = raw.to_lowercase();
    let parsed = if lowered.contains(RELATIVE_MARKER) {
        parse_relative(&lowered, today)
    } else {
        parse_absolute(raw)
    };

    parsed.unwrap_or(today)
}

fn parse_relative(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let captures = RELATIVE_REGEX.captures(text)?;
    let amount: u64 = captures.get(1)?.as_str().parse().ok()?;
    let days_per_unit = unit_to_days(captures.get(2)?.as_str())?;
    today.checked_sub_days(Days::new(amount.checked_mul(days_per_unit)?))
}

fn unit_to_days(unit: &str) -> Option<u64> {
    match unit {
        "d" | "day" | "days" => Some(1),
        "w" | "wk" | "wks" | "week" | "weeks" => Some(7),
        "mo" | "mos" | "month" | "months" => Some(30),
        // posted earlier today
        "s" | "sec" | "secs" | "second" | "seconds" | "m" | "min" | "mins" | "minute"
        | "minutes" | "h" | "hr" | "hrs" | "hour" | "hours" => Some(0),
        _ => None,
    }
}

fn parse_absolute(text: &str) -> Option<NaiveDate> {
    ABSOLUTE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}
