//! Store composite keys
//!
//! The persisted store flattens a plan into independent rows. A date row id
//! is `<planId>_<YYYY-MM-DD>` and an activity row id is
//! `<planId>_<YYYY-MM-DD>_<key>`. Plan ids may themselves contain `_`, so
//! parsing always works from the right.

use chrono::NaiveDate;

use super::dates::parse_day;
use crate::constants::COMPOSITE_KEY_SEPARATOR;
use crate::types::ActivityKey;

/// Day encoded in a date row id (composite or bare).
pub fn parse_date_row_id(id: &str) -> Option<NaiveDate> {
    let last = id.rsplit(COMPOSITE_KEY_SEPARATOR).next()?;
    parse_day(last).ok()
}

/// Key, and parent day when encoded, of an activity row id.
///
/// A bare numeric id yields `(None, key)`; the caller must then rely on an
/// explicit `dateId` field.
pub fn parse_activity_row_id(id: &str) -> Option<(Option<NaiveDate>, ActivityKey)> {
    let mut parts = id.rsplitn(3, COMPOSITE_KEY_SEPARATOR);
    let key = parts.next()?.parse::<ActivityKey>().ok()?;
    let day = parts.next().and_then(|segment| parse_day(segment).ok());
    Some((day, key))
}
