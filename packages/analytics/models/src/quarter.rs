//! Calendar quarter keys.
//!
//! A [`QuarterKey`] identifies one 3-month calendar period. Its canonical
//! string form is `"YYYYQn"` with no internal whitespace, which is what it
//! serializes to.

use std::fmt;

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::ParseError;

/// A calendar quarter, ordered by `(year, quarter)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct QuarterKey {
    year: i32,
    quarter: u8,
}

impl QuarterKey {
    /// Creates a key for the given year and quarter number.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidQuarter`] if `quarter` is not in 1-4.
    pub fn new(year: i32, quarter: u8) -> Result<Self, ParseError> {
        match quarter {
            1..=4 => Ok(Self { year, quarter }),
            _ => Err(ParseError::InvalidQuarter { quarter }),
        }
    }

    /// Returns the quarter containing the given date.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            // month0 is 0..=11 so this is always 1..=4
            quarter: (date.month0() / 3 + 1) as u8,
        }
    }

    /// Parses an incident timestamp into the quarter it falls in.
    ///
    /// Accepts `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[.f]`,
    /// `YYYY-MM-DD HH:MM:SS[.f]` and RFC 3339.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidTimestamp`] if none of the formats match.
    pub fn from_timestamp(s: &str) -> Result<Self, ParseError> {
        parse_timestamp_date(s.trim())
            .map(Self::from_date)
            .ok_or_else(|| ParseError::InvalidTimestamp {
                value: s.to_string(),
            })
    }

    /// Parses a survey period label such as `"2023 Q1"`, `"2023q1"`,
    /// `"2023-Q1"` or `"Q1 2023"`.
    ///
    /// Whitespace is stripped and the quarter marker uppercased before
    /// matching.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidPeriod`] if the label is not a quarter,
    /// or [`ParseError::InvalidQuarter`] if the quarter number is out of range.
    pub fn from_label(s: &str) -> Result<Self, ParseError> {
        let canonical = canonicalize_label(s);
        let invalid = || ParseError::InvalidPeriod {
            value: s.to_string(),
        };

        let (year, quarter) = if let Some(rest) = canonical.strip_prefix('Q') {
            // "Q1-2023" / "Q12023"
            let rest = rest.replace('-', "");
            let (quarter, year) = rest.split_at_checked(1).ok_or_else(invalid)?;
            (year.to_string(), quarter.to_string())
        } else {
            let (year, quarter) = canonical.split_once('Q').ok_or_else(invalid)?;
            (year.trim_end_matches('-').to_string(), quarter.to_string())
        };

        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if quarter.is_empty() || !quarter.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let quarter = quarter.parse::<u8>().map_err(|_| invalid())?;
        Self::new(year, quarter)
    }

    /// Returns the quarter `n` steps after this one, rolling Q4 over into
    /// Q1 of the next year. Returns `None` if the year would leave the `i32`
    /// range.
    #[must_use]
    pub fn advance(self, n: u32) -> Option<Self> {
        let index = i64::from(self.year) * 4 + i64::from(self.quarter) - 1 + i64::from(n);
        let year = i32::try_from(index.div_euclid(4)).ok()?;
        let quarter = u8::try_from(index.rem_euclid(4) + 1).ok()?;
        Some(Self { year, quarter })
    }
}

impl fmt::Display for QuarterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

impl std::str::FromStr for QuarterKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

impl TryFrom<String> for QuarterKey {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_label(&value)
    }
}

impl From<QuarterKey> for String {
    fn from(value: QuarterKey) -> Self {
        value.to_string()
    }
}

/// Strips whitespace, uppercases, and normalizes `_`/`/` separators to `-`.
fn canonicalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '_' | '/' => '-',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

fn parse_timestamp_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    // Month-only exports ("2023-01") have no day component.
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(year: i32, quarter: u8) -> QuarterKey {
        QuarterKey::new(year, quarter).unwrap()
    }

    #[test]
    fn rejects_out_of_range_quarter() {
        assert!(QuarterKey::new(2023, 0).is_err());
        assert!(QuarterKey::new(2023, 5).is_err());
        assert!(QuarterKey::new(2023, 4).is_ok());
    }

    #[test]
    fn displays_canonical_form() {
        assert_eq!(key(2023, 1).to_string(), "2023Q1");
        assert_eq!(key(1999, 4).to_string(), "1999Q4");
    }

    #[test]
    fn orders_by_year_then_quarter() {
        assert!(key(2023, 4) < key(2024, 1));
        assert!(key(2024, 1) < key(2024, 2));
        let mut keys = vec![key(2024, 2), key(2023, 3), key(2024, 1)];
        keys.sort();
        assert_eq!(keys, vec![key(2023, 3), key(2024, 1), key(2024, 2)]);
    }

    #[test]
    fn advance_rolls_over_year() {
        assert_eq!(key(2024, 4).advance(1), Some(key(2025, 1)));
        assert_eq!(key(2024, 1).advance(1), Some(key(2024, 2)));
        assert_eq!(key(2024, 4).advance(3), Some(key(2025, 3)));
        assert_eq!(key(2024, 2).advance(0), Some(key(2024, 2)));
        assert_eq!(key(2023, 3).advance(4 * 100 + 1), Some(key(2123, 4)));
        assert_eq!(key(i32::MAX, 4).advance(1), None);
    }

    #[test]
    fn parses_month_timestamps() {
        assert_eq!(QuarterKey::from_timestamp("2023-01").unwrap(), key(2023, 1));
        assert_eq!(QuarterKey::from_timestamp("2023-03").unwrap(), key(2023, 1));
        assert_eq!(QuarterKey::from_timestamp("2023-04").unwrap(), key(2023, 2));
        assert_eq!(QuarterKey::from_timestamp("2023-12").unwrap(), key(2023, 4));
    }

    #[test]
    fn parses_date_and_datetime_timestamps() {
        assert_eq!(
            QuarterKey::from_timestamp("2023-02-10").unwrap(),
            key(2023, 1)
        );
        assert_eq!(
            QuarterKey::from_timestamp("2023-07-01T14:30:00").unwrap(),
            key(2023, 3)
        );
        assert_eq!(
            QuarterKey::from_timestamp("2023-07-01T14:30:00.250").unwrap(),
            key(2023, 3)
        );
        assert_eq!(
            QuarterKey::from_timestamp("2023-10-01 08:00:00").unwrap(),
            key(2023, 4)
        );
        assert_eq!(
            QuarterKey::from_timestamp("2023-09-30T23:00:00+00:00").unwrap(),
            key(2023, 3)
        );
        assert_eq!(
            QuarterKey::from_timestamp(" 2023-05 ").unwrap(),
            key(2023, 2)
        );
    }

    #[test]
    fn rejects_invalid_timestamps() {
        assert!(QuarterKey::from_timestamp("").is_err());
        assert!(QuarterKey::from_timestamp("not-a-date").is_err());
        assert!(QuarterKey::from_timestamp("2023-13").is_err());
        assert!(QuarterKey::from_timestamp("2023-02-30").is_err());
    }

    #[test]
    fn parses_label_variants() {
        for label in [
            "2023Q1", "2023 Q1", "2023 q1", " 2023  Q 1 ", "2023-Q1", "2023_Q1", "Q1 2023",
            "Q1-2023", "q1/2023",
        ] {
            assert_eq!(
                QuarterKey::from_label(label).unwrap(),
                key(2023, 1),
                "label {label:?}"
            );
        }
    }

    #[test]
    fn rejects_invalid_labels() {
        assert!(matches!(
            QuarterKey::from_label("2023 Q5"),
            Err(ParseError::InvalidQuarter { quarter: 5 })
        ));
        for label in ["", "2023", "Q1", "23Q1", "2023Qx", "January 2023", "2023Q12"] {
            assert!(QuarterKey::from_label(label).is_err(), "label {label:?}");
        }
    }

    #[test]
    fn serializes_as_canonical_string() {
        let json = serde_json::to_string(&key(2024, 3)).unwrap();
        assert_eq!(json, "\"2024Q3\"");
        let parsed: QuarterKey = serde_json::from_str("\"2024 Q3\"").unwrap();
        assert_eq!(parsed, key(2024, 3));
        assert!(serde_json::from_str::<QuarterKey>("\"2024 Q9\"").is_err());
    }
}
