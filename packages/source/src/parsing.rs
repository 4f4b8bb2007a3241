//! Shared cell parsing utilities for CSV exports.
//!
//! Government exports mark missing values in several ways (empty cells,
//! `NA`, `..`, `x`); these helpers turn all of them into `None`.

/// Markers that denote a missing or suppressed value.
const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "nan", "null", "-", "..", "x", "[x]", "[c]"];

/// Returns `true` if the cell holds a missing-value marker.
#[must_use]
pub fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    MISSING_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
}

/// Returns the trimmed cell, or `None` if it is a missing-value marker.
#[must_use]
pub fn non_empty(cell: &str) -> Option<String> {
    if is_missing(cell) {
        None
    } else {
        Some(cell.trim().to_string())
    }
}

/// Parses a numeric cell. Returns `None` for missing markers and for
/// values that are not finite numbers.
#[must_use]
pub fn parse_score(cell: &str) -> Option<f64> {
    if is_missing(cell) {
        return None;
    }
    let trimmed = cell.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            log::debug!("Treating non-numeric cell '{trimmed}' as missing");
            None
        }
    }
}

/// Parses lat/lng from optional string cells. Returns `None` if either is
/// missing, unparseable, or zero.
#[must_use]
pub fn parse_lat_lng_str(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let latitude = parse_score(lat?)?;
    let longitude = parse_score(lng?)?;
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some((latitude, longitude))
}
