//! Best-effort interpretation of cells as numbers, booleans and dates.
//!
//! Every conversion returns `None` on failure. Callers decide what a failed
//! coercion means for them (a range filter rejects the row, the sort
//! comparator falls back to text, inference rules the type out).

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::data::Cell;

const GENERIC_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const GENERIC_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid ISO date pattern"));
static US_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})/(\d{2})/(\d{4})$").expect("valid US date pattern"));
static DAY_FIRST_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})-(\d{2})-(\d{4})$").expect("valid day-first date pattern")
});

pub fn to_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) => n.is_finite().then_some(*n),
        Cell::Text(s) => parse_number(s),
        Cell::Absent | Cell::Boolean(_) => None,
    }
}

/// Parses a finite numeric literal, allowing surrounding whitespace and a sign.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn to_boolean(cell: &Cell) -> Option<bool> {
    match cell {
        Cell::Boolean(b) => Some(*b),
        Cell::Absent => None,
        other => match other.as_display().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
    }
}

pub fn to_date(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::Text(s) => parse_date(s),
        _ => None,
    }
}

/// Generic parse first; otherwise the first explicit pattern that structurally
/// matches decides the outcome. `MM/DD/YYYY` is never read as `DD/MM/YYYY`.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(parsed) = parse_generic(trimmed) {
        return Some(parsed);
    }
    if let Some(caps) = ISO_DATE.captures(trimmed) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = US_DATE.captures(trimmed) {
        return ymd(&caps[3], &caps[1], &caps[2]);
    }
    if let Some(caps) = DAY_FIRST_DATE.captures(trimmed) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }
    None
}

fn parse_generic(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.naive_utc());
    }
    for fmt in GENERIC_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(parsed);
        }
    }
    for fmt in GENERIC_DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Some(parsed.and_time(NaiveTime::MIN));
        }
    }
    None
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    Some(date.and_time(NaiveTime::MIN))
}
