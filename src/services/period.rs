//! Month labels (`YYYY-MM`) used as the reporting period key.

use std::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate};

use crate::errors::AppError;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Years a reporting period may fall in.
pub const YEARS: RangeInclusive<i32> = 1900..=9999;

/// Parse a `YYYY-MM` label into `(year, month)`.
pub fn parse_month(label: &str) -> Result<(i32, u32), AppError> {
    let label = label.trim();
    let invalid = || AppError::Validation(format!("Invalid month '{label}', expected YYYY-MM"));

    if label.len() != 7 || label.as_bytes()[4] != b'-' {
        return Err(invalid());
    }
    let date =
        NaiveDate::parse_from_str(&format!("{label}-01"), "%Y-%m-%d").map_err(|_| invalid())?;
    if !YEARS.contains(&date.year()) {
        return Err(invalid());
    }
    Ok((date.year(), date.month()))
}

pub fn month_label(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

/// Reject a year filter outside [`YEARS`].
pub fn check_year(year: i32) -> Result<(), AppError> {
    if YEARS.contains(&year) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Year {year} is out of range ({}-{})",
            YEARS.start(),
            YEARS.end()
        )))
    }
}

/// English month name for 1-based `month`; empty for out-of-range values.
pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .unwrap_or("")
}

/// "March 2026" for `2026-03`.
pub fn display_month(label: &str) -> String {
    match parse_month(label) {
        Ok((year, month)) => format!("{} {year}", month_name(month)),
        Err(_) => label.to_string(),
    }
}

pub fn previous_month(label: &str) -> Result<String, AppError> {
    let (year, month) = parse_month(label)?;
    Ok(if month == 1 {
        month_label(year - 1, 12)
    } else {
        month_label(year, month - 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_labels() {
        assert_eq!(parse_month("2026-03").unwrap(), (2026, 3));
        assert_eq!(parse_month(" 1999-12 ").unwrap(), (1999, 12));
    }

    #[test]
    fn rejects_malformed_labels() {
        for bad in ["2026-13", "2026-3", "March 2026", "", "2026/03", "2026-00", "0000-01"] {
            assert!(parse_month(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn previous_month_wraps_year() {
        assert_eq!(previous_month("2026-01").unwrap(), "2025-12");
        assert_eq!(previous_month("2026-07").unwrap(), "2026-06");
    }

    #[test]
    fn years_are_bounded() {
        assert!(check_year(2026).is_ok());
        for year in [i32::MIN, 0, 1899, 10000, i32::MAX] {
            assert!(matches!(check_year(year), Err(AppError::Validation(_))), "{year}");
        }
        assert_eq!(previous_month("1900-01").unwrap(), "1899-12");
    }

    #[test]
    fn display_names() {
        assert_eq!(display_month("2026-03"), "March 2026");
        assert_eq!(month_name(0), "");
        assert_eq!(month_name(13), "");
    }
}
