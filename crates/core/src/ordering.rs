//! Ordering engine - sort keys for insertion between neighbours
//!
//! Activities use numeric fractional keys: appending steps by
//! [`ACTIVITY_KEY_STEP`], inserting between two neighbours takes their
//! midpoint. Dates have no fractional form, so a date insertion targets the
//! adjacent calendar day and fails when that day is taken.

use chrono::NaiveDate;
use plansync_domain::constants::{ACTIVITY_KEY_STEP, SEED_ACTIVITY_KEY};
use plansync_domain::{ActivityKey, InsertDirection, Rejection};

/// Allocate a key strictly between `lower` and `upper`.
///
/// Either bound may be absent (insertion at an end of the sequence). With no
/// bounds at all the seed key is returned.
///
/// # Errors
/// Returns [`Rejection::KeySpaceExhausted`] when `f64` precision no longer
/// yields a value strictly inside the interval.
pub fn allocate_between(
    lower: Option<ActivityKey>,
    upper: Option<ActivityKey>,
) -> Result<ActivityKey, Rejection> {
    let candidate = match (lower, upper) {
        (None, None) => return Ok(ActivityKey::new(SEED_ACTIVITY_KEY)),
        (Some(lower), None) => lower.value() + ACTIVITY_KEY_STEP,
        (None, Some(upper)) => upper.value() - ACTIVITY_KEY_STEP,
        (Some(lower), Some(upper)) => {
            lower.value() + (upper.value() - lower.value()) / 2.0
        }
    };

    let above_lower = lower.map_or(true, |lower| candidate > lower.value());
    let below_upper = upper.map_or(true, |upper| candidate < upper.value());
    if candidate.is_finite() && above_lower && below_upper {
        Ok(ActivityKey::new(candidate))
    } else {
        Err(Rejection::KeySpaceExhausted)
    }
}

/// Key for a new activity placed `direction` of `anchor` within `keys`.
///
/// `keys` must be sorted ascending (as a [`plansync_domain::PlanDate`] keeps
/// them).
///
/// # Errors
/// [`Rejection::UnknownActivity`] if `anchor` is not in `keys`, otherwise
/// whatever [`allocate_between`] reports.
pub fn key_beside(
    keys: &[ActivityKey],
    anchor: ActivityKey,
    direction: InsertDirection,
) -> Result<ActivityKey, Rejection> {
    let idx = keys.binary_search(&anchor).map_err(|_| Rejection::UnknownActivity)?;
    let (lower, upper) = match direction {
        InsertDirection::After => (Some(anchor), keys.get(idx + 1).copied()),
        InsertDirection::Before => (idx.checked_sub(1).map(|prev| keys[prev]), Some(anchor)),
    };
    allocate_between(lower, upper)
}

/// The calendar day immediately `direction` of `anchor`.
pub fn adjacent_day(anchor: NaiveDate, direction: InsertDirection) -> Option<NaiveDate> {
    match direction {
        InsertDirection::After => anchor.succ_opt(),
        InsertDirection::Before => anchor.pred_opt(),
    }
}

/// Day for a new date placed `direction` of `anchor` within sorted `days`.
///
/// # Errors
/// - [`Rejection::UnknownDate`] if `anchor` is not in `days`
/// - [`Rejection::DateExists`] if the adjacent day is already present
/// - [`Rejection::OutOfCalendarRange`] at the edge of chrono's range
pub fn day_beside(
    days: &[NaiveDate],
    anchor: NaiveDate,
    direction: InsertDirection,
) -> Result<NaiveDate, Rejection> {
    if days.binary_search(&anchor).is_err() {
        return Err(Rejection::UnknownDate);
    }
    let target = adjacent_day(anchor, direction).ok_or(Rejection::OutOfCalendarRange)?;
    if days.binary_search(&target).is_ok() {
        return Err(Rejection::DateExists(direction));
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(v: f64) -> ActivityKey {
        ActivityKey::new(v)
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn appending_steps_by_a_thousand() {
        assert_eq!(allocate_between(Some(key(1000.0)), None), Ok(key(2000.0)));
        assert_eq!(allocate_between(None, Some(key(0.0))), Ok(key(-1000.0)));
        assert_eq!(allocate_between(None, None), Ok(key(0.0)));
    }

    #[test]
    fn between_neighbours_takes_the_midpoint() {
        assert_eq!(allocate_between(Some(key(0.0)), Some(key(1000.0))), Ok(key(500.0)));
        assert_eq!(allocate_between(Some(key(-1000.0)), Some(key(0.0))), Ok(key(-500.0)));
    }

    #[test]
    fn repeated_halving_eventually_reports_exhaustion() {
        let lower = key(0.0);
        let mut upper = key(1000.0);
        let mut inserted = 0;
        let outcome = loop {
            match allocate_between(Some(lower), Some(upper)) {
                Ok(next) => {
                    assert!(next > lower && next < upper);
                    upper = next;
                    inserted += 1;
                }
                Err(rejection) => break rejection,
            }
            assert!(inserted < 2_000, "precision never ran out");
        };
        assert_eq!(outcome, Rejection::KeySpaceExhausted);
        // Subnormal floats give well over a thousand halvings towards zero.
        assert!(inserted > 50);
    }

    #[test]
    fn adjacent_keys_without_room_are_rejected() {
        let lower = key(1.0);
        let upper = key(f64::from_bits(1.0_f64.to_bits() + 1));
        assert_eq!(allocate_between(Some(lower), Some(upper)), Err(Rejection::KeySpaceExhausted));
    }

    #[test]
    fn key_beside_uses_anchor_neighbours() {
        let keys = [key(0.0), key(1000.0), key(2000.0)];
        assert_eq!(key_beside(&keys, key(1000.0), InsertDirection::After), Ok(key(1500.0)));
        assert_eq!(key_beside(&keys, key(1000.0), InsertDirection::Before), Ok(key(500.0)));
        assert_eq!(key_beside(&keys, key(2000.0), InsertDirection::After), Ok(key(3000.0)));
        assert_eq!(key_beside(&keys, key(0.0), InsertDirection::Before), Ok(key(-1000.0)));
        assert_eq!(
            key_beside(&keys, key(42.0), InsertDirection::After),
            Err(Rejection::UnknownActivity)
        );
    }

    #[test]
    fn day_beside_rejects_occupied_slot() {
        let days = [day("2025-01-01"), day("2025-01-02"), day("2025-01-05")];
        assert_eq!(
            day_beside(&days, day("2025-01-01"), InsertDirection::After),
            Err(Rejection::DateExists(InsertDirection::After))
        );
        assert_eq!(
            day_beside(&days, day("2025-01-02"), InsertDirection::Before),
            Err(Rejection::DateExists(InsertDirection::Before))
        );
        assert_eq!(day_beside(&days, day("2025-01-02"), InsertDirection::After), Ok(day("2025-01-03")));
        assert_eq!(day_beside(&days, day("2025-01-01"), InsertDirection::Before), Ok(day("2024-12-31")));
        assert_eq!(
            day_beside(&days, day("2025-01-03"), InsertDirection::After),
            Err(Rejection::UnknownDate)
        );
    }

    #[test]
    fn calendar_edges_are_reported() {
        assert_eq!(adjacent_day(NaiveDate::MAX, InsertDirection::After), None);
        assert_eq!(
            day_beside(&[NaiveDate::MIN], NaiveDate::MIN, InsertDirection::Before),
            Err(Rejection::OutOfCalendarRange)
        );
    }
}
