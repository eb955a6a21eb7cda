use crate::error::{LossValuationError, Result};
use chrono::{Datelike, NaiveDate, Utc};

/// Parses a `DD.MM.YYYY` date string.
///
/// Shape problems (wrong separators, non-digits, wrong field widths) are
/// `FormatError`s. A well-shaped string naming a day that does not exist in
/// that month, such as `31.02.2022`, is a `RangeError`; it is never clamped.
pub fn parse_day_month_year(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();

    if parts.len() != 3 {
        return Err(LossValuationError::FormatError(format!(
            "Invalid date '{}'. Expected DD.MM.YYYY",
            raw
        )));
    }

    let (day_str, month_str, year_str) = (parts[0], parts[1], parts[2]);

    if !is_digits(day_str, 1, 2) || !is_digits(month_str, 1, 2) || !is_digits(year_str, 4, 4) {
        return Err(LossValuationError::FormatError(format!(
            "Invalid date '{}'. Expected DD.MM.YYYY",
            raw
        )));
    }

    let day: u32 = parse_field(day_str, raw)?;
    let month: u32 = parse_field(month_str, raw)?;
    let year: i32 = parse_field(year_str, raw)?;

    if !(1..=12).contains(&month) {
        return Err(LossValuationError::RangeError(format!(
            "Month {} in '{}' must be between 1 and 12",
            month, raw
        )));
    }

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        LossValuationError::RangeError(format!(
            "Day {} does not exist in {:04}-{:02} (input '{}')",
            day, year, month, raw
        ))
    })
}

fn is_digits(field: &str, min_len: usize, max_len: usize) -> bool {
    (min_len..=max_len).contains(&field.len()) && field.bytes().all(|b| b.is_ascii_digit())
}

fn parse_field<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T> {
    field.parse::<T>().map_err(|_| {
        LossValuationError::FormatError(format!("Invalid numeric field '{}' in '{}'", field, raw))
    })
}

/// 1 January of `year`, the anchor of every annual slot.
pub fn year_start(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| LossValuationError::RangeError(format!("Year {} is not representable", year)))
}

pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Rounds to 2 decimal places, halves away from zero.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn format_day_month_year(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}
