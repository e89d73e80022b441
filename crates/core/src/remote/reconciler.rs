//! Remote event reconciler
//!
//! Merges a peer's broadcast mutation into the local mirror. Own echoes are
//! dropped first; inserts are idempotent; the last date of a plan and the
//! last activity of a date are protected against remote deletes just as they
//! are against local ones.

use chrono::NaiveDate;
use plansync_domain::{
    parse_date_row_id, ActivityMsg, ActivityRef, PlanSyncError, Rejection, Result,
};
use tracing::{debug, info, warn};

use super::InboundEvent;
use crate::edit_lock::EditLockCoordinator;
use crate::store::{PlanChange, PlanStore};

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// Our own mutation coming back.
    Echo,
    Applied(Vec<PlanChange>),
    /// Nothing to do: duplicate insert, unknown target, no-op lock.
    Ignored,
    /// Refused by a local invariant; the user is warned.
    Rejected(Rejection),
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    local_user: String,
}

impl Reconciler {
    pub fn new(local_user: impl Into<String>) -> Self {
        Self { local_user: local_user.into() }
    }

    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    /// Apply one event to `store` and `locks`.
    ///
    /// # Errors
    /// `PlanSyncError::MalformedMessage` when the envelope's day does not
    /// parse. State is untouched in that case.
    pub fn apply(
        &self,
        store: &mut PlanStore,
        locks: &mut EditLockCoordinator,
        event: InboundEvent,
    ) -> Result<Reconciled> {
        let kind = event.kind();
        if event.by_user() == self.local_user {
            debug!(event = %kind, "Dropping echo of own mutation");
            return Ok(Reconciled::Echo);
        }

        let outcome = match event {
            InboundEvent::DateAdded(msg) => {
                let day = parse_event_day(kind.as_str(), &msg.id)?;
                store
                    .insert_date_at(day, &msg.by_user)
                    .map_or(Reconciled::Ignored, |change| Reconciled::Applied(vec![change]))
            }
            InboundEvent::DateDeleted(msg) => {
                let day = parse_event_day(kind.as_str(), &msg.id)?;
                match store.remove_date(day) {
                    Ok(change) => {
                        locks.forget_date(day);
                        Reconciled::Applied(vec![change])
                    }
                    Err(Rejection::UnknownDate) => Reconciled::Ignored,
                    Err(rejection) => Reconciled::Rejected(rejection),
                }
            }
            InboundEvent::ActivityAdded(msg) => {
                let at = activity_ref(kind.as_str(), &msg)?;
                match store.insert_activity_at(at, &msg.by_user) {
                    Ok(Some(change)) => Reconciled::Applied(vec![change]),
                    Ok(None) => Reconciled::Ignored,
                    Err(rejection) => {
                        warn!(%at, %rejection, "Peer added activity to a date we do not have");
                        Reconciled::Ignored
                    }
                }
            }
            InboundEvent::ActivityDeleted(msg) => {
                let at = activity_ref(kind.as_str(), &msg)?;
                match store.remove_activity(at) {
                    Ok(change) => {
                        locks.forget(at);
                        Reconciled::Applied(vec![change])
                    }
                    Err(Rejection::AtLeastOneActivity) => {
                        Reconciled::Rejected(Rejection::AtLeastOneActivity)
                    }
                    Err(_) => Reconciled::Ignored,
                }
            }
            InboundEvent::ActivityUpdated(msg) => {
                let at = activity_ref(kind.as_str(), &msg)?;
                self.apply_update(store, locks, at, &msg)
            }
            InboundEvent::LockActivity(msg) => {
                let at = activity_ref(kind.as_str(), &msg)?;
                if !store.contains_activity(at) {
                    return Ok(Reconciled::Ignored);
                }
                locks
                    .remote_lock(at, &msg.by_user)
                    .map_or(Reconciled::Ignored, |state| {
                        Reconciled::Applied(vec![PlanChange::LockChanged { at, state }])
                    })
            }
            InboundEvent::VoteActivity(msg) => {
                let at = activity_ref(kind.as_str(), &msg)?;
                let up = msg.up_voters.unwrap_or_default();
                let down = msg.down_voters.unwrap_or_default();
                store
                    .replace_votes(at, up, down)
                    .map_or(Reconciled::Ignored, |change| Reconciled::Applied(vec![change]))
            }
        };

        match &outcome {
            Reconciled::Applied(changes) => {
                info!(event = %kind, changes = changes.len(), "Applied peer mutation");
            }
            Reconciled::Rejected(rejection) => {
                warn!(event = %kind, %rejection, "Peer mutation refused locally");
            }
            Reconciled::Ignored => debug!(event = %kind, "Peer mutation had no effect"),
            Reconciled::Echo => {}
        }
        Ok(outcome)
    }

    fn apply_update(
        &self,
        store: &mut PlanStore,
        locks: &mut EditLockCoordinator,
        at: ActivityRef,
        msg: &ActivityMsg,
    ) -> Reconciled {
        if !store.contains_activity(at) {
            return Reconciled::Ignored;
        }
        let effect = locks.remote_update(at, &msg.by_user, msg.is_final());
        let mut changes = Vec::new();
        if effect.apply_text {
            if let Some(text) = msg.activity_text.as_deref() {
                if let Ok(change) = store.set_activity_text(at, text, msg.is_final()) {
                    changes.push(change);
                }
            }
        } else {
            debug!(%at, "Keeping local draft over peer text");
        }
        if let Some(state) = effect.new_state {
            changes.push(PlanChange::LockChanged { at, state });
        }
        if changes.is_empty() {
            Reconciled::Ignored
        } else {
            Reconciled::Applied(changes)
        }
    }
}

fn parse_event_day(event: &str, raw: &str) -> Result<NaiveDate> {
    parse_date_row_id(raw).ok_or_else(|| PlanSyncError::MalformedMessage {
        event: event.to_string(),
        reason: format!("invalid date '{raw}'"),
    })
}

fn activity_ref(event: &str, msg: &ActivityMsg) -> Result<ActivityRef> {
    if !msg.id.is_finite() {
        return Err(PlanSyncError::MalformedMessage {
            event: event.to_string(),
            reason: "activity id is not a finite number".into(),
        });
    }
    Ok(ActivityRef::new(parse_event_day(event, &msg.date_id)?, msg.id))
}
