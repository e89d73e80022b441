//! Calendar layout projector
//!
//! Turns the sparse date list into whole weeks (Saturday to Friday) for
//! display. Pure: the same dates always give the same grid.

use std::collections::HashMap;
use std::iter;

use chrono::{Datelike, Days, NaiveDate};
use plansync_domain::constants::DAYS_PER_WEEK;
use plansync_domain::PlanDate;
use serde::Serialize;

/// One cell of the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalendarCell {
    Planned(PlanDate),
    Empty { day: NaiveDate },
}

impl CalendarCell {
    pub fn day(&self) -> NaiveDate {
        match self {
            Self::Planned(date) => date.id,
            Self::Empty { day } => *day,
        }
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }
}

/// Week rows, each seven cells long. Only a week cut off by the limits of
/// the representable calendar is shorter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalendarGrid {
    pub weeks: Vec<Vec<CalendarCell>>,
}

impl CalendarGrid {
    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &CalendarCell> + '_ {
        self.weeks.iter().flatten()
    }
}

/// Days since the most recent Saturday (Saturday itself is 0).
fn days_into_week(day: NaiveDate) -> u64 {
    u64::from((day.weekday().num_days_from_sunday() + 1) % 7)
}

/// Saturday on or before `day`, clamped to [`NaiveDate::MIN`].
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day.checked_sub_days(Days::new(days_into_week(day))).unwrap_or(NaiveDate::MIN)
}

/// Friday on or after `day`, clamped to [`NaiveDate::MAX`].
pub fn week_end(day: NaiveDate) -> NaiveDate {
    day.checked_add_days(Days::new(6 - days_into_week(day))).unwrap_or(NaiveDate::MAX)
}

/// Lay `dates` out as full weeks spanning the earliest to the latest day.
///
/// Input order does not matter; days without a matching date become
/// [`CalendarCell::Empty`].
pub fn project<'a>(dates: impl IntoIterator<Item = &'a PlanDate>) -> CalendarGrid {
    let by_day: HashMap<NaiveDate, &PlanDate> =
        dates.into_iter().map(|date| (date.id, date)).collect();
    let (Some(first), Some(last)) = (by_day.keys().min(), by_day.keys().max()) else {
        return CalendarGrid::default();
    };

    let end = week_end(*last);
    let cells: Vec<CalendarCell> = iter::successors(Some(week_start(*first)), |day| day.succ_opt())
        .take_while(|day| *day <= end)
        .map(|day| match by_day.get(&day) {
            Some(date) => CalendarCell::Planned((*date).clone()),
            None => CalendarCell::Empty { day },
        })
        .collect();

    let weeks = cells.chunks(DAYS_PER_WEEK).map(<[CalendarCell]>::to_vec).collect();
    CalendarGrid { weeks }
}
