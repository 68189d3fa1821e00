//! Single-value type classification.
//!
//! [`classify()`] looks at one raw CSV cell and returns the narrowest
//! [`AtomicType`] it could belong to, or `None` for blank cells. The rules are
//! evaluated in a fixed order and the first match wins, so the result for a
//! given string is always the same regardless of which column it came from.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::types::AtomicType;

/// Digits beyond this are treated as identifiers or codes rather than numbers.
pub const INTEGER_MAX_DIGITS: usize = 10;

const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%b %d %Y %H:%M:%S",
];

const LOOSE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]+\.[0-9]+$").expect("valid decimal pattern"))
}

fn integer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^[0-9]{{1,{INTEGER_MAX_DIGITS}}}$"))
            .expect("valid integer pattern")
    })
}

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("valid uuid pattern")
    })
}

fn date_shape_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]{4})([^0-9])([0-9]{2})([^0-9])([0-9]{2})$")
            .expect("valid date pattern")
    })
}

/// Classifies one raw value. Blank input has no opinion and yields `None`.
pub fn classify(value: &str) -> Option<AtomicType> {
    if value.trim().is_empty() {
        None
    } else if decimal_pattern().is_match(value) {
        Some(AtomicType::Decimal)
    } else if integer_pattern().is_match(value) {
        Some(AtomicType::Integer)
    } else if uuid_pattern().is_match(value) {
        Some(AtomicType::Uuid)
    } else if parse_calendar_date(value).is_some() {
        Some(AtomicType::Date)
    } else if parses_as_timestamp(value) {
        Some(AtomicType::DateTime)
    } else {
        Some(AtomicType::String)
    }
}

/// `YYYY<sep>MM<sep>DD` with one repeated separator that is also a real
/// calendar day. Shape alone is not enough: `2021-13-40` is rejected.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let captures = date_shape_pattern().captures(value)?;
    if captures[2] != captures[4] {
        return None;
    }
    let year = captures[1].parse::<i32>().ok()?;
    let month = captures[3].parse::<u32>().ok()?;
    let day = captures[5].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Accepts the broader timestamp grammar: RFC 3339 / 2822, offset and naive
/// date-times, loosely formatted dates, and bare clock times.
pub fn parses_as_timestamp(value: &str) -> bool {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value).is_ok()
        || DateTime::parse_from_rfc2822(value).is_ok()
        || OFFSET_DATETIME_FORMATS
            .iter()
            .any(|fmt| DateTime::parse_from_str(value, fmt).is_ok())
        || NAIVE_DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
        || LOOSE_DATE_FORMATS
            .iter()
            .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
        || TIME_FORMATS
            .iter()
            .any(|fmt| NaiveTime::parse_from_str(value, fmt).is_ok())
}
