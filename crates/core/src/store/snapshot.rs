//! Assemble a [`Plan`] from the store's flat row lists.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use plansync_domain::{
    parse_activity_row_id, parse_date_row_id, Plan, PlanActivity, PlanDate, PlanSnapshot,
};
use tracing::warn;

/// Build the nested, sorted plan out of a `getPlan`/`createPlan` snapshot.
///
/// - dates are sorted ascending; duplicate days keep the first row
/// - an explicit `dateId` wins over the day encoded in an activity's id
/// - activities are sorted by key; duplicate keys keep the first row
/// - activities whose date is unknown are dropped
/// - a date without any activity receives the empty seed activity
pub fn assemble_plan(snapshot: PlanSnapshot) -> Plan {
    let PlanSnapshot { plan: metadata, dates, activities } = snapshot;

    let mut by_day: BTreeMap<NaiveDate, PlanDate> = BTreeMap::new();
    for row in dates {
        let Some(day) = parse_date_row_id(&row.id) else {
            warn!(row_id = %row.id, "Skipping date row with unparsable id");
            continue;
        };
        by_day.entry(day).or_insert_with(|| PlanDate {
            id: day,
            created_by: row.created_by,
            activities: Vec::new(),
        });
    }

    for row in activities {
        let Some((encoded_day, key)) = parse_activity_row_id(&row.id) else {
            warn!(row_id = %row.id, "Skipping activity row with unparsable id");
            continue;
        };
        let day = row.date_id.as_deref().and_then(parse_date_row_id).or(encoded_day);
        let Some(plan_date) = day.and_then(|day| by_day.get_mut(&day)) else {
            warn!(row_id = %row.id, "Dropping activity without a matching date");
            continue;
        };
        if plan_date.activities.iter().any(|existing| existing.id == key) {
            warn!(row_id = %row.id, "Dropping duplicate activity row");
            continue;
        }
        plan_date.activities.push(PlanActivity {
            id: key,
            created_by: row.created_by,
            activity_text: row.activity_text,
            up_voters: row.up_voters.unwrap_or_default(),
            down_voters: row.down_voters.unwrap_or_default(),
        });
    }

    let dates = by_day
        .into_values()
        .map(|mut date| {
            if date.activities.is_empty() {
                date.activities.push(PlanActivity::seed(date.created_by.clone()));
            }
            date.activities.sort_by_key(|activity| activity.id);
            date
        })
        .collect::<Vec<_>>();

    if dates.is_empty() {
        warn!(plan_id = %metadata.id, "Snapshot contains no dates");
    }

    Plan { metadata, dates }
}
