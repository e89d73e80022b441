//! Pure helpers for calendar days and store keys.

pub mod composite_key;
pub mod dates;
