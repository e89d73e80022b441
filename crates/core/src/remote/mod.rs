//! Inbound side of the sync engine: transport events, subscriptions and the
//! reconciler that merges peers' mutations into the local mirror.

pub mod reconciler;
pub mod subscriptions;

use plansync_domain::{ActivityMsg, DateMsg, EventKind, PlanSyncError, Result};
use serde_json::Value;

pub use reconciler::{Reconciled, Reconciler};
pub use subscriptions::SubscriptionRegistry;

/// What a broadcast transport reports to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A named event with its (still undecoded) envelope.
    Message { target: String, payload: Value },
    /// The connection dropped; automatic reconnect is in progress.
    Reconnecting { reason: String },
    /// The connection is back under a new connection id.
    Reconnected { connection_id: String },
    /// The transport gave up (`reason` set) or was closed deliberately.
    Closed { reason: Option<String> },
}

/// A decoded peer mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    DateAdded(DateMsg),
    DateDeleted(DateMsg),
    ActivityAdded(ActivityMsg),
    ActivityDeleted(ActivityMsg),
    ActivityUpdated(ActivityMsg),
    LockActivity(ActivityMsg),
    VoteActivity(ActivityMsg),
}

impl InboundEvent {
    /// Decode `payload` as the envelope `kind` carries.
    ///
    /// # Errors
    /// `PlanSyncError::MalformedMessage` when a required field is missing or
    /// has the wrong type.
    pub fn decode(kind: EventKind, payload: Value) -> Result<Self> {
        let malformed = |err: serde_json::Error| PlanSyncError::MalformedMessage {
            event: kind.to_string(),
            reason: err.to_string(),
        };
        if kind.is_date_event() {
            let msg: DateMsg = serde_json::from_value(payload).map_err(malformed)?;
            return Ok(match kind {
                EventKind::DateAdded => Self::DateAdded(msg),
                _ => Self::DateDeleted(msg),
            });
        }
        let msg: ActivityMsg = serde_json::from_value(payload).map_err(malformed)?;
        Ok(match kind {
            EventKind::ActivityAdded => Self::ActivityAdded(msg),
            EventKind::ActivityDeleted => Self::ActivityDeleted(msg),
            EventKind::ActivityUpdated => Self::ActivityUpdated(msg),
            EventKind::LockActivity => Self::LockActivity(msg),
            _ => Self::VoteActivity(msg),
        })
    }

    pub const fn kind(&self) -> EventKind {
        match self {
            Self::DateAdded(_) => EventKind::DateAdded,
            Self::DateDeleted(_) => EventKind::DateDeleted,
            Self::ActivityAdded(_) => EventKind::ActivityAdded,
            Self::ActivityDeleted(_) => EventKind::ActivityDeleted,
            Self::ActivityUpdated(_) => EventKind::ActivityUpdated,
            Self::LockActivity(_) => EventKind::LockActivity,
            Self::VoteActivity(_) => EventKind::VoteActivity,
        }
    }

    pub fn by_user(&self) -> &str {
        match self {
            Self::DateAdded(msg) | Self::DateDeleted(msg) => &msg.by_user,
            Self::ActivityAdded(msg)
            | Self::ActivityDeleted(msg)
            | Self::ActivityUpdated(msg)
            | Self::LockActivity(msg)
            | Self::VoteActivity(msg) => &msg.by_user,
        }
    }
}
