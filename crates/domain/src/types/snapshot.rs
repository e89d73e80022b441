//! Rows exchanged with the persisted store
//!
//! The store keeps dates and activities as flat lists whose ids encode their
//! parent (see [`crate::utils::composite_key`]). These types mirror that shape
//! exactly; assembling them into a [`crate::Plan`] happens in `plansync-core`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::plan::PlanMetadata;
use crate::utils::dates::format_day;

/// A date row as stored: `id` is a composite key or a bare ISO day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRow {
    pub id: String,
    #[serde(default)]
    pub created_by: String,
}

/// An activity row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRow {
    pub id: String,
    /// Explicit parent date; wins over the composite key when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_id: Option<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_voters: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_voters: Option<BTreeSet<String>>,
}

/// Full plan as returned by `getPlan` and `createPlan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSnapshot {
    #[serde(alias = "planMetadata")]
    pub plan: PlanMetadata,
    #[serde(default)]
    pub dates: Vec<DateRow>,
    #[serde(default)]
    pub activities: Vec<ActivityRow>,
}

/// `{ id }` element of the `createPlan` date list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRef {
    pub id: String,
}

/// Body of the `createPlan` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanPayload {
    pub uuid: String,
    pub plan_name: String,
    pub created_by: String,
    pub dates: Vec<DateRef>,
}

impl CreatePlanPayload {
    pub fn new(
        plan_name: impl Into<String>,
        created_by: impl Into<String>,
        days: &[chrono::NaiveDate],
    ) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            plan_name: plan_name.into(),
            created_by: created_by.into(),
            dates: days.iter().map(|day| DateRef { id: format_day(*day) }).collect(),
        }
    }
}

/// Transport bootstrap credentials returned by `negotiate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub url: String,
    pub access_token: String,
}
