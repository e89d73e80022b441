//! Fractional sort key for activities
//!
//! An activity's key is both its identity and its position inside the owning
//! date. Keys are plain `f64` values on the wire; this newtype gives them a
//! total order so they can live in ordered collections and be hashed.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

/// Numeric fractional key of a [`crate::PlanActivity`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(from = "f64", into = "f64")]
pub struct ActivityKey(f64);

impl ActivityKey {
    /// Wrap a raw key. `-0.0` is folded into `0.0` so equal keys hash alike.
    pub fn new(value: f64) -> Self {
        if value == 0.0 {
            Self(0.0)
        } else {
            Self(value)
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl From<f64> for ActivityKey {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<ActivityKey> for f64 {
    fn from(key: ActivityKey) -> Self {
        key.0
    }
}

impl PartialEq for ActivityKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ActivityKey {}

impl PartialOrd for ActivityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActivityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for ActivityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Integral keys render without a fractional part (`2000`, not `2000.0`),
/// matching how peers address activities in store paths.
impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActivityKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 =
            s.trim().parse().map_err(|_| format!("Invalid activity key: {s}"))?;
        if !value.is_finite() {
            return Err(format!("Activity key must be finite: {s}"));
        }
        Ok(Self::new(value))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn keys_order_numerically() {
        let mut keys = vec![ActivityKey::new(2000.0), ActivityKey::new(-1000.0), ActivityKey::new(500.5)];
        keys.sort();
        assert_eq!(keys, vec![ActivityKey::new(-1000.0), ActivityKey::new(500.5), ActivityKey::new(2000.0)]);
    }

    #[test]
    fn negative_zero_is_the_seed_key() {
        let mut set = HashSet::new();
        set.insert(ActivityKey::new(0.0));
        assert!(set.contains(&ActivityKey::new(-0.0)));
    }

    #[test]
    fn display_drops_trailing_zero_fraction() {
        assert_eq!(ActivityKey::new(2000.0).to_string(), "2000");
        assert_eq!(ActivityKey::new(1500.5).to_string(), "1500.5");
        assert_eq!(ActivityKey::new(-1000.0).to_string(), "-1000");
    }

    #[test]
    fn parse_rejects_non_numbers_and_infinities() {
        assert_eq!("750.25".parse::<ActivityKey>(), Ok(ActivityKey::new(750.25)));
        assert!("abc".parse::<ActivityKey>().is_err());
        assert!("inf".parse::<ActivityKey>().is_err());
    }

    #[test]
    fn serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&ActivityKey::new(1000.5)).unwrap(), "1000.5");
        let parsed: ActivityKey = serde_json::from_str("2000").unwrap();
        assert_eq!(parsed, ActivityKey::new(2000.0));
        let zero: ActivityKey = serde_json::from_str("-0.0").unwrap();
        assert_eq!(zero, ActivityKey::new(0.0));
    }
}
