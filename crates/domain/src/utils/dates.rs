//! Calendar-day helpers
//!
//! Plan dates have whole-day granularity. On the wire they are ISO-8601
//! `YYYY-MM-DD` strings; peers running in a browser sometimes send a full
//! timestamp (`2025-01-05T00:00:00.000Z`), so parsing only looks at the day.

use chrono::NaiveDate;

use crate::constants::ISO_DAY_FORMAT;
use crate::errors::{PlanSyncError, Result};

/// Render a day as `YYYY-MM-DD`.
pub fn format_day(day: NaiveDate) -> String {
    day.format(ISO_DAY_FORMAT).to_string()
}

/// Parse an ISO-8601 day, ignoring any time component.
///
/// # Errors
/// Returns `PlanSyncError::InvalidInput` when the leading ten characters are
/// not a valid `YYYY-MM-DD` day.
pub fn parse_day(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let day_part = match trimmed.get(..10) {
        Some(prefix) if trimmed.len() == 10 || trimmed[10..].starts_with('T') => prefix,
        _ => trimmed,
    };
    NaiveDate::parse_from_str(day_part, ISO_DAY_FORMAT)
        .map_err(|err| PlanSyncError::InvalidInput(format!("Invalid date '{value}': {err}")))
}

/// Every day from `start` to `end`, both included. Empty when `end < start`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|day| *day <= end).collect()
}
