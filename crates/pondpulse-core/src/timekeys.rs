//! Period-key codec for the four report granularities.
//!
//! Report documents are keyed by strings: `YYYY-MM-DD:HH` for hour records,
//! `YYYY-MM-DD` for daily reports, ISO `YYYY-Www` for weekly reports
//! (Monday-start, week 1 contains the year's first Thursday), and `YYYY-MM`
//! for monthly reports. Parsing is strict: a key must round-trip to the
//! exact input string, so `2025-2-3` or `2025-02-30` are rejected.

use chrono::{Datelike, Days, IsoWeek, NaiveDate, Weekday};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeKeyError {
    #[error("invalid period key: {0:?}")]
    InvalidFormat(String),
}

/// Formats a date as a `YYYY-MM-DD` day key.
#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a `YYYY-MM-DD` day key.
///
/// # Errors
///
/// Returns [`TimeKeyError::InvalidFormat`] for non-matching strings or
/// non-existent calendar dates (e.g. `2025-02-30`).
pub fn parse_day_key(key: &str) -> Result<NaiveDate, TimeKeyError> {
    let date = NaiveDate::parse_from_str(key, "%Y-%m-%d")
        .map_err(|_| TimeKeyError::InvalidFormat(key.to_string()))?;
    // chrono accepts unpadded fields; require the canonical form.
    if day_key(date) != key {
        return Err(TimeKeyError::InvalidFormat(key.to_string()));
    }
    Ok(date)
}

/// Formats a `YYYY-MM-DD:HH` hour-bucket key.
#[must_use]
pub fn hour_key(date: NaiveDate, hour: u32) -> String {
    format!("{}:{hour:02}", day_key(date))
}

/// Parses a `YYYY-MM-DD:HH` hour-bucket key into its date and hour (0-23).
///
/// # Errors
///
/// Returns [`TimeKeyError::InvalidFormat`] if either part is malformed or
/// the hour is out of range.
pub fn parse_hour_key(key: &str) -> Result<(NaiveDate, u32), TimeKeyError> {
    let (day_part, hour_part) = key
        .split_once(':')
        .ok_or_else(|| TimeKeyError::InvalidFormat(key.to_string()))?;
    let date = parse_day_key(day_part)?;
    let hour: u32 = hour_part
        .parse()
        .map_err(|_| TimeKeyError::InvalidFormat(key.to_string()))?;
    if hour > 23 || hour_key(date, hour) != key {
        return Err(TimeKeyError::InvalidFormat(key.to_string()));
    }
    Ok((date, hour))
}

/// Formats a date as its ISO 8601 `YYYY-Www` week key.
///
/// The year component is the ISO week-year, which differs from the calendar
/// year around January 1: 2025-12-29 belongs to `2026-W01`.
#[must_use]
pub fn iso_week_key(date: NaiveDate) -> String {
    format_iso_week(date.iso_week())
}

fn format_iso_week(week: IsoWeek) -> String {
    format!("{:04}-W{:02}", week.year(), week.week())
}

/// Parses a `YYYY-Www` week key and returns the Monday of that week.
///
/// # Errors
///
/// Returns [`TimeKeyError::InvalidFormat`] for malformed keys or week
/// numbers that do not exist in the given ISO year (e.g. `2025-W53`).
pub fn iso_week_monday(key: &str) -> Result<NaiveDate, TimeKeyError> {
    let invalid = || TimeKeyError::InvalidFormat(key.to_string());
    let (year_part, week_part) = key.split_once("-W").ok_or_else(invalid)?;
    if year_part.len() != 4 || week_part.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year_part.parse().map_err(|_| invalid())?;
    let week: u32 = week_part.parse().map_err(|_| invalid())?;
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)
}

/// Returns the 7 dates of an ISO week, Monday through Sunday.
///
/// # Errors
///
/// Returns [`TimeKeyError::InvalidFormat`] if the week key is malformed.
pub fn dates_in_iso_week(key: &str) -> Result<Vec<NaiveDate>, TimeKeyError> {
    let monday = iso_week_monday(key)?;
    Ok((0..7)
        .map(|offset| monday + Days::new(offset))
        .collect())
}

/// Formats a date as a `YYYY-MM` month key.
#[must_use]
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Parses a `YYYY-MM` month key and returns the first day of the month.
///
/// # Errors
///
/// Returns [`TimeKeyError::InvalidFormat`] for malformed keys.
pub fn month_first_day(key: &str) -> Result<NaiveDate, TimeKeyError> {
    let invalid = || TimeKeyError::InvalidFormat(key.to_string());
    let (year_part, month_part) = key.split_once('-').ok_or_else(invalid)?;
    if year_part.len() != 4 || month_part.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year_part.parse().map_err(|_| invalid())?;
    let month: u32 = month_part.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)
}

/// Returns the last day of the month identified by a `YYYY-MM` key.
///
/// # Errors
///
/// Returns [`TimeKeyError::InvalidFormat`] for malformed keys.
pub fn month_last_day(key: &str) -> Result<NaiveDate, TimeKeyError> {
    let first = month_first_day(key)?;
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    // Month arithmetic on a valid first-of-month cannot fail.
    Ok(next_first.unwrap_or(first) - Days::new(1))
}

/// Returns all dates of the month identified by a `YYYY-MM` key, in order
/// (28-31 entries).
///
/// # Errors
///
/// Returns [`TimeKeyError::InvalidFormat`] for malformed keys.
pub fn dates_in_month(key: &str) -> Result<Vec<NaiveDate>, TimeKeyError> {
    let first = month_first_day(key)?;
    let last = month_last_day(key)?;
    Ok(first.iter_days().take_while(|d| *d <= last).collect())
}

/// True iff the ISO week's `[Monday, Sunday]` interval intersects the
/// month's `[first, last]` interval.
///
/// A week spanning a year boundary overlaps both the December and the
/// January month by this test.
///
/// # Errors
///
/// Returns [`TimeKeyError::InvalidFormat`] if either key is malformed.
pub fn week_overlaps_month(week_key: &str, month_key: &str) -> Result<bool, TimeKeyError> {
    let monday = iso_week_monday(week_key)?;
    let sunday = monday + Days::new(6);
    let first = month_first_day(month_key)?;
    let last = month_last_day(month_key)?;
    Ok(monday <= last && sunday >= first)
}
