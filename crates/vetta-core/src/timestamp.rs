//! # Timestamp Layouts
//!
//! Lenient timestamp parsing for ingesting external data. Strings are
//! tried against a fixed, ordered list of layouts and the first match wins.
//! Numbers are Unix seconds.
//!
//! | Order | Layout | Example |
//! |-------|--------|---------|
//! | 1 | RFC 3339 with fractional seconds | `2023-12-25T10:30:00.123456789Z` |
//! | 2 | RFC 3339 | `2023-12-25T10:30:00+02:00` |
//! | 3 | ISO 8601 without zone or fraction | `2023-12-25T10:30:00` |
//! | 4 | date space time | `2023-12-25 10:30:00` |
//! | 5 | date only | `2023-12-25` |
//! | 6 | time only | `10:30:00` |
//!
//! Zone-less layouts are interpreted as UTC. A time-only value lands on
//! January 1st of year 0. Every result is normalized to UTC.
//!
//! ## Float Unix timestamps
//!
//! The whole seconds are the float truncated toward zero; the nanoseconds
//! are `(f - secs) * 1e9` truncated toward zero. Binary rounding in that
//! product means sub-microsecond digits are not exact (for example
//! `1703505000.123` yields `122999906` ns). This is the observable
//! behavior and is kept as is.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::TimestampError;

const NANOS_PER_SEC: i64 = 1_000_000_000;

type LayoutFn = fn(&str) -> Option<DateTime<Utc>>;

/// Ordered layouts; the first one that parses wins.
const LAYOUTS: [(&str, LayoutFn); 6] = [
    ("rfc3339-fractional", parse_rfc3339_fractional),
    ("rfc3339", parse_rfc3339),
    ("iso8601-local", |s| parse_naive(s, "%Y-%m-%dT%H:%M:%S")),
    ("date-time", |s| parse_naive(s, "%Y-%m-%d %H:%M:%S")),
    ("date", parse_date),
    ("time", parse_time),
];

/// Names of the supported string layouts, in the order they are tried.
pub fn layout_names() -> impl Iterator<Item = &'static str> {
    LAYOUTS.iter().map(|(name, _)| *name)
}

/// The timestamp a non-optional field receives when the input is null or
/// absent: the Unix epoch, `DateTime::<Utc>::default()`.
pub fn zero_timestamp() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Parse a timestamp string against the supported layouts.
///
/// # Errors
///
/// Returns `TimestampError::UnrecognizedFormat` naming the input if no
/// layout matches.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = input.trim();
    LAYOUTS
        .iter()
        .find_map(|(_, layout)| layout(trimmed))
        .ok_or_else(|| TimestampError::UnrecognizedFormat {
            input: input.to_string(),
        })
}

/// Interpret an integer as Unix seconds.
pub fn from_unix_seconds(secs: i64) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| TimestampError::OutOfRange {
        input: secs.to_string(),
    })
}

/// Interpret a float as Unix seconds with a fractional nanosecond remainder.
pub fn from_unix_float(value: f64) -> Result<DateTime<Utc>, TimestampError> {
    let out_of_range = || TimestampError::OutOfRange {
        input: value.to_string(),
    };
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return Err(out_of_range());
    }
    let mut secs = value as i64;
    let mut nanos = ((value - secs as f64) * 1e9) as i64;
    if nanos < 0 {
        secs -= 1;
        nanos += NANOS_PER_SEC;
    }
    let nanos = u32::try_from(nanos).map_err(|_| out_of_range())?;
    DateTime::from_timestamp(secs, nanos).ok_or_else(out_of_range)
}

fn parse_rfc3339_fractional(s: &str) -> Option<DateTime<Utc>> {
    if !s.contains('.') {
        return None;
    }
    parse_rfc3339(s)
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(s: &str, layout: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, layout)
        .ok()
        .map(|dt| dt.and_utc())
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(s, "%H:%M:%S").ok()?;
    NaiveDate::from_ymd_opt(0, 1, 1).map(|d| d.and_time(time).and_utc())
}
