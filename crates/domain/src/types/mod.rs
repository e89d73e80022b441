//! Domain types and models
//!
//! The plan mirror (`plan`), its fractional sort key (`key`), the envelopes
//! exchanged over the broadcast channel (`messages`) and the flat rows the
//! persisted store hands back (`snapshot`).

pub mod key;
pub mod messages;
pub mod plan;
pub mod request;
pub mod snapshot;

use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

pub use key::ActivityKey;
pub use messages::{ActivityMsg, DateMsg, EventKind};
pub use plan::{ActivityRef, Plan, PlanActivity, PlanDate, PlanMetadata};
pub use request::PlanRequest;
pub use snapshot::{
    ActivityRow, ConnectionInfo, CreatePlanPayload, DateRef, DateRow, PlanSnapshot,
};

use crate::impl_wire_name_conversions;

/// Where a new item goes relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "UPPERCASE")]
pub enum InsertDirection {
    Before,
    After,
}

impl_wire_name_conversions!(InsertDirection {
    Before => "BEFORE",
    After => "AFTER",
});

/// A participant's vote on one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "UPPERCASE")]
pub enum VoteType {
    Up,
    Down,
    #[default]
    None,
}

impl_wire_name_conversions!(VoteType {
    Up => "UP",
    Down => "DOWN",
    None => "NONE",
});
