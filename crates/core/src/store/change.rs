//! Change notifications emitted by accepted mutations.

use chrono::NaiveDate;
use plansync_domain::ActivityRef;
use serde::{Deserialize, Serialize};

use crate::edit_lock::LockState;

/// One accepted change to the local plan mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanChange {
    DateInserted { date: NaiveDate },
    DateRemoved { date: NaiveDate },
    ActivityInserted { at: ActivityRef },
    ActivityRemoved { at: ActivityRef },
    ActivityTextChanged { at: ActivityRef, is_final: bool },
    VotesChanged { at: ActivityRef },
    LockChanged { at: ActivityRef, state: LockState },
    /// The whole plan was replaced from a store snapshot.
    Resynced,
}

impl PlanChange {
    /// Whether the calendar grid must be recomputed.
    pub const fn affects_layout(&self) -> bool {
        matches!(self, Self::DateInserted { .. } | Self::DateRemoved { .. } | Self::Resynced)
    }
}
