//! Broadcast envelopes
//!
//! Every mutation a participant persists is fanned out by the transport as a
//! named event carrying one of these envelopes. `by_user` tags the origin so
//! a client can recognise (and drop) the echo of its own mutation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;

use super::key::ActivityKey;
use crate::constants::{
    EVENT_ACTIVITY_ADDED, EVENT_ACTIVITY_DELETED, EVENT_ACTIVITY_UPDATED, EVENT_DATE_ADDED,
    EVENT_DATE_DELETED, EVENT_LOCK_ACTIVITY, EVENT_VOTE_ACTIVITY,
};
use crate::impl_wire_name_conversions;

/// Named events the session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    DateAdded,
    DateDeleted,
    ActivityAdded,
    ActivityDeleted,
    ActivityUpdated,
    LockActivity,
    VoteActivity,
}

impl_wire_name_conversions!(EventKind {
    DateAdded => EVENT_DATE_ADDED,
    DateDeleted => EVENT_DATE_DELETED,
    ActivityAdded => EVENT_ACTIVITY_ADDED,
    ActivityDeleted => EVENT_ACTIVITY_DELETED,
    ActivityUpdated => EVENT_ACTIVITY_UPDATED,
    LockActivity => EVENT_LOCK_ACTIVITY,
    VoteActivity => EVENT_VOTE_ACTIVITY,
});

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::DateAdded,
        EventKind::DateDeleted,
        EventKind::ActivityAdded,
        EventKind::ActivityDeleted,
        EventKind::ActivityUpdated,
        EventKind::LockActivity,
        EventKind::VoteActivity,
    ];

    /// Whether the event carries a [`DateMsg`] (otherwise an [`ActivityMsg`]).
    pub const fn is_date_event(self) -> bool {
        matches!(self, EventKind::DateAdded | EventKind::DateDeleted)
    }
}

/// Envelope for `dateAdded` / `dateDeleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct DateMsg {
    /// ISO-8601 day, e.g. `2025-01-05`
    pub id: String,
    pub by_user: String,
}

/// Envelope for every activity-scoped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ActivityMsg {
    pub id: ActivityKey,
    pub date_id: String,
    #[serde(alias = "lockedBy", alias = "updatedBy")]
    pub by_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_voters: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_voters: Option<BTreeSet<String>>,
}

impl ActivityMsg {
    /// Minimal envelope addressing one activity.
    pub fn new(id: ActivityKey, date_id: impl Into<String>, by_user: impl Into<String>) -> Self {
        Self {
            id,
            date_id: date_id.into(),
            by_user: by_user.into(),
            activity_text: None,
            is_final: None,
            up_voters: None,
            down_voters: None,
        }
    }

    pub fn is_final(&self) -> bool {
        self.is_final.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip_through_wire_form() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        }
        assert_eq!(EventKind::LockActivity.to_string(), "lockActivity");
        assert!(EventKind::DateDeleted.is_date_event());
        assert!(!EventKind::VoteActivity.is_date_event());
    }

    #[test]
    fn lock_message_accepts_locked_by() {
        let msg: ActivityMsg = serde_json::from_str(
            r#"{"id":1000,"dateId":"2025-01-01","lockedBy":"alice"}"#,
        )
        .unwrap();
        assert_eq!(msg.by_user, "alice");
        assert!(!msg.is_final());
        assert!(msg.up_voters.is_none());
    }

    #[test]
    fn activity_message_requires_date_id() {
        let result: Result<ActivityMsg, _> =
            serde_json::from_str(r#"{"id":1000,"byUser":"alice"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn update_message_serializes_camel_case() {
        let mut msg = ActivityMsg::new(ActivityKey::new(1500.0), "2025-01-01", "bob");
        msg.activity_text = Some("Museum".into());
        msg.is_final = Some(true);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["dateId"], "2025-01-01");
        assert_eq!(json["byUser"], "bob");
        assert_eq!(json["isFinal"], true);
        assert!(json.get("upVoters").is_none());
    }
}
