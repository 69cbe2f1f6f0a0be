//! Target-name derivation and validation.
//!
//! Saved resources are named `{prefix}_{YYYY-MM-DD}.json`, where the date comes
//! from the text shown next to the row in the listing. Text that does not
//! parse to a real calendar date, month 13 included, becomes [`INVALID_DATE`].
//! [`ERROR_DATE`] is reserved for a parsed date that cannot be written as
//! `YYYY-MM-DD`.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate};
use tracing::warn;

use super::error::DownloadError;

/// Date token used when the row text is not a real date.
pub const INVALID_DATE: &str = "invalid-date";

/// Date token used when a parsed date cannot be rendered.
pub const ERROR_DATE: &str = "error-date";

/// Extension appended to every target name.
pub const TARGET_EXTENSION: &str = "json";

/// Formats accepted for row dates, tried in order after RFC 3339.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%m/%d/%Y"];

/// The date portion of a target name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStamp {
    /// A parsed calendar date with a four-digit year.
    Date(NaiveDate),
    /// The text did not parse to a real date.
    Invalid,
    /// The date parsed but has no `YYYY-MM-DD` rendering.
    Error,
}

impl DateStamp {
    /// Wraps a parsed date, or [`DateStamp::Error`] when its year falls outside `0..=9999`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        if (0..=9999).contains(&date.year()) {
            Self::Date(date)
        } else {
            warn!(%date, "row date has no four-digit year");
            Self::Error
        }
    }
}

impl fmt::Display for DateStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Invalid => f.write_str(INVALID_DATE),
            Self::Error => f.write_str(ERROR_DATE),
        }
    }
}

/// Parses the date text associated with a listing row.
#[must_use]
pub fn parse_row_date(text: &str) -> DateStamp {
    let text = text.trim();
    if text.is_empty() {
        return DateStamp::Invalid;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return DateStamp::from_date(timestamp.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map_or(DateStamp::Invalid, DateStamp::from_date)
}

/// Builds `{prefix}_{YYYY-MM-DD}.json` from a row's date text.
#[must_use]
pub fn target_name_for(prefix: &str, date_text: &str) -> String {
    format!(
        "{prefix}_{}.{TARGET_EXTENSION}",
        parse_row_date(date_text)
    )
}

/// Checks that `name` can be used as a single file name inside the output directory.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidTargetName`] for empty names, dot segments,
/// path separators and control characters.
pub fn validate_target_name(name: &str) -> Result<(), DownloadError> {
    if name.trim().is_empty() {
        return Err(DownloadError::invalid_target_name(name, "must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(DownloadError::invalid_target_name(
            name,
            "must not be a dot segment",
        ));
    }
    if name.contains(['/', '\\']) {
        return Err(DownloadError::invalid_target_name(
            name,
            "must not contain path separators",
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(DownloadError::invalid_target_name(
            name,
            "must not contain control characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> DateStamp {
        DateStamp::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_parse_row_date_iso() {
        assert_eq!(parse_row_date("2024-01-01"), date(2024, 1, 1));
        assert_eq!(parse_row_date("  2024-03-09 \n"), date(2024, 3, 9));
    }

    #[test]
    fn test_parse_row_date_rfc3339() {
        assert_eq!(parse_row_date("2024-06-30T23:10:00Z"), date(2024, 6, 30));
    }

    #[test]
    fn test_parse_row_date_month_names() {
        assert_eq!(parse_row_date("Jan 2, 2024"), date(2024, 1, 2));
        assert_eq!(parse_row_date("January 2, 2024"), date(2024, 1, 2));
        assert_eq!(parse_row_date("2 Jan 2024"), date(2024, 1, 2));
    }

    #[test]
    fn test_parse_row_date_us_numeric() {
        assert_eq!(parse_row_date("01/02/2024"), date(2024, 1, 2));
    }

    #[test]
    fn test_parse_row_date_unrecognized_text_is_invalid() {
        assert_eq!(parse_row_date("yesterday"), DateStamp::Invalid);
        assert_eq!(parse_row_date(""), DateStamp::Invalid);
        assert_eq!(parse_row_date("45 days ago"), DateStamp::Invalid);
    }

    #[test]
    fn test_parse_row_date_out_of_range_is_invalid() {
        assert_eq!(parse_row_date("2024-13-01"), DateStamp::Invalid);
        assert_eq!(parse_row_date("02/45/2024"), DateStamp::Invalid);
        assert_eq!(parse_row_date("Feb 30, 2024"), DateStamp::Invalid);
    }

    #[test]
    fn test_date_stamp_without_four_digit_year_is_error() {
        let far = NaiveDate::from_ymd_opt(10_000, 1, 1).unwrap();
        assert_eq!(DateStamp::from_date(far), DateStamp::Error);
        assert_eq!(DateStamp::Error.to_string(), "error-date");
        assert_eq!(DateStamp::from_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), date(2024, 1, 1));
    }

    #[test]
    fn test_target_name_for_formats() {
        assert_eq!(
            target_name_for("archive", "2024-01-01"),
            "archive_2024-01-01.json"
        );
        assert_eq!(
            target_name_for("bets", "not a date"),
            "bets_invalid-date.json"
        );
        assert_eq!(
            target_name_for("archive", "2024-13-01"),
            "archive_invalid-date.json"
        );
    }

    #[test]
    fn test_validate_target_name_accepts_plain_names() {
        assert!(validate_target_name("archive_2024-01-01.json").is_ok());
        assert!(validate_target_name("archive_invalid-date.json").is_ok());
    }

    #[test]
    fn test_validate_target_name_rejects_traversal() {
        assert!(validate_target_name("").is_err());
        assert!(validate_target_name("..").is_err());
        assert!(validate_target_name("../escape.json").is_err());
        assert!(validate_target_name("dir\\file.json").is_err());
        assert!(validate_target_name("bad\u{0}name").is_err());
    }
}
