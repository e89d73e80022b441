//! Plan and session fixtures, plus a tiny relay that plays the store's
//! broadcast role between sessions.

use std::sync::Arc;

use chrono::NaiveDate;
use plansync_core::{
    persist_queue, PendingCommands, PersistCommand, PlanSession, TransportEvent,
};
use plansync_domain::{format_day, ActivityKey, Plan, PlanMetadata, SessionConfig};
use serde_json::{json, Value};

use super::notifier::RecordingNotifier;

pub const PLAN_ID: &str = "invite-1";

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn key(value: f64) -> ActivityKey {
    ActivityKey::new(value)
}

/// Plan created by alice with the seed activity on every day.
pub fn plan(days: &[&str]) -> Plan {
    let metadata =
        PlanMetadata { id: PLAN_ID.into(), name: "Lisbon".into(), created_by: "alice".into() };
    Plan::seeded(metadata, days.iter().map(|d| day(d)))
}

/// One participant: the session, its queued persistence calls and what the
/// user was told.
pub struct Participant {
    pub session: PlanSession,
    pub pending: PendingCommands,
    pub notifier: Arc<RecordingNotifier>,
}

impl Participant {
    pub fn join(user: &str, plan: Plan) -> Self {
        let (queue, pending) = persist_queue();
        let notifier = Arc::new(RecordingNotifier::default());
        let session =
            PlanSession::new(SessionConfig::new(user), plan, queue, notifier.clone());
        Self { session, pending, notifier }
    }

    /// Queued calls, oldest first.
    pub fn drain(&mut self) -> Vec<PersistCommand> {
        std::iter::from_fn(|| self.pending.try_next()).collect()
    }
}

/// Persist everything `from` queued and deliver the resulting broadcasts to
/// every participant in `to`. Returns the calls that were made.
pub fn relay(from: &mut Participant, to: &mut [&mut Participant]) -> Vec<PersistCommand> {
    let commands = from.drain();
    for peer in to.iter_mut() {
        deliver(&commands, peer);
    }
    commands
}

/// Deliver the broadcasts `commands` produce to one participant.
pub fn deliver(commands: &[PersistCommand], to: &mut Participant) {
    for event in commands.iter().filter_map(broadcast_of) {
        to.session.handle_transport_event(event);
    }
}

pub fn message(target: &str, payload: Value) -> TransportEvent {
    TransportEvent::Message { target: target.to_string(), payload }
}

/// What the store broadcasts after persisting `command`.
pub fn broadcast_of(command: &PersistCommand) -> Option<TransportEvent> {
    let event = match command {
        PersistCommand::AddDate { date, created_by } => {
            message("dateAdded", json!({"id": format_day(*date), "byUser": created_by}))
        }
        PersistCommand::DeleteDate { date, user } => {
            message("dateDeleted", json!({"id": format_day(*date), "byUser": user}))
        }
        PersistCommand::AddActivity { at, created_by } => message(
            "activityAdded",
            json!({"id": at.key.value(), "dateId": format_day(at.date), "byUser": created_by}),
        ),
        PersistCommand::DeleteActivity { at, user } => message(
            "activityDeleted",
            json!({"id": at.key.value(), "dateId": format_day(at.date), "byUser": user}),
        ),
        PersistCommand::UpdateActivity { at, text, updated_by, is_final } => message(
            "activityUpdated",
            json!({
                "id": at.key.value(),
                "dateId": format_day(at.date),
                "updatedBy": updated_by,
                "activityText": text,
                "isFinal": is_final,
            }),
        ),
        PersistCommand::LockActivity { at, locked_by } => message(
            "lockActivity",
            json!({"id": at.key.value(), "dateId": format_day(at.date), "lockedBy": locked_by}),
        ),
        PersistCommand::VoteActivity { at, up_voters, down_voters, voter } => message(
            "voteActivity",
            json!({
                "id": at.key.value(),
                "dateId": format_day(at.date),
                "byUser": voter,
                "upVoters": up_voters,
                "downVoters": down_voters,
            }),
        ),
        PersistCommand::RegisterUser { .. } | PersistCommand::FetchPlan => return None,
    };
    Some(event)
}
