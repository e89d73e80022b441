//! Plan session - one participant's live view of one plan
//!
//! [`PlanSession`] is the single owner of the local mirror. Local actions go
//! store first, then onto the persistence queue; transport events go through
//! the subscription registry and the reconciler; persistence outcomes may
//! trigger a full resync. Every accepted change is published to observers.
//!
//! The session itself is synchronous. [`runtime::SessionRuntime`] drives it
//! from a tokio task.

pub mod runtime;

use std::sync::Arc;

use chrono::NaiveDate;
use plansync_domain::constants::{CHANGE_FEED_CAPACITY, OP_GET_PLAN};
use plansync_domain::{
    ActivityKey, ActivityRef, InsertDirection, Plan, PlanSyncError, Rejection, SessionConfig,
    VoteType,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

pub use runtime::{RuntimeConfig, SessionHandle, SessionRuntime};

use crate::calendar::{project, CalendarGrid};
use crate::edit_lock::{EditLockCoordinator, LockState};
use crate::pipeline::{PersistCommand, PersistOutcome, PersistQueue};
use crate::ports::{Notice, UserNotifier};
use crate::remote::{Reconciled, Reconciler, SubscriptionRegistry, TransportEvent};
use crate::store::{assemble_plan, PlanChange, PlanStore};

/// Lifecycle of a session's transport connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "reason", rename_all = "snake_case")]
pub enum SessionPhase {
    Connecting,
    Active,
    Reconnecting,
    Failed(String),
    Closed,
}

impl SessionPhase {
    /// Whether local commands are still accepted.
    pub const fn accepts_commands(&self) -> bool {
        matches!(self, Self::Connecting | Self::Active | Self::Reconnecting)
    }
}

/// Why a local command did not go through.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Refused by a local invariant; the user has been warned.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Session(#[from] PlanSyncError),
}

pub type CommandResult<T> = std::result::Result<T, CommandError>;

pub struct PlanSession {
    user: String,
    config: SessionConfig,
    store: PlanStore,
    locks: EditLockCoordinator,
    subscriptions: SubscriptionRegistry,
    reconciler: Reconciler,
    queue: PersistQueue,
    notifier: Arc<dyn UserNotifier>,
    phase: SessionPhase,
    changes: broadcast::Sender<PlanChange>,
    revision: watch::Sender<u64>,
    /// Mutations queued but not yet answered by the dispatcher.
    unconfirmed: usize,
    /// A snapshot was discarded; fetch again once `unconfirmed` reaches zero.
    refetch_when_settled: bool,
}

impl PlanSession {
    /// Start a session over an already loaded plan, subscribed to every
    /// event.
    pub fn new(
        config: SessionConfig,
        plan: Plan,
        queue: PersistQueue,
        notifier: Arc<dyn UserNotifier>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let (revision, _) = watch::channel(0);
        let mut subscriptions = SubscriptionRegistry::new();
        subscriptions.subscribe_all();
        Self {
            user: config.user_name.clone(),
            reconciler: Reconciler::new(config.user_name.clone()),
            config,
            store: PlanStore::new(plan),
            locks: EditLockCoordinator::new(),
            subscriptions,
            queue,
            notifier,
            phase: SessionPhase::Connecting,
            changes,
            revision,
            unconfirmed: 0,
            refetch_when_settled: false,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn plan(&self) -> &Plan {
        self.store.plan()
    }

    pub fn plan_id(&self) -> &str {
        self.store.plan_id()
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    pub fn lock_state(&self, at: ActivityRef) -> LockState {
        self.locks.state(at)
    }

    pub fn typing_indicator(&self, at: ActivityRef) -> Option<String> {
        self.locks.typing_indicator(at)
    }

    /// Week grid of the current dates.
    pub fn calendar(&self) -> CalendarGrid {
        project(&self.store.plan().dates)
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<PlanChange> {
        self.changes.subscribe()
    }

    /// Counter bumped once per published change.
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Transport is connected and registered.
    pub fn mark_active(&mut self) {
        if self.phase.accepts_commands() {
            self.set_phase(SessionPhase::Active);
        }
    }

    // ---- local actions ----

    /// # Errors
    /// [`CommandError::Rejected`] when the adjacent day already exists.
    pub fn add_date(
        &mut self,
        anchor: NaiveDate,
        direction: InsertDirection,
    ) -> CommandResult<PlanChange> {
        self.ensure_accepting()?;
        let date = self.guard(|session| session.store.insert_date(anchor, direction, &session.user))?;
        self.enqueue(PersistCommand::AddDate { date: date.id, created_by: self.user.clone() });
        info!(date = %date.id, %direction, "Date added");
        Ok(self.publish(PlanChange::DateInserted { date: date.id }))
    }

    /// # Errors
    /// [`CommandError::Rejected`] for the last remaining date.
    pub fn delete_date(&mut self, date: NaiveDate) -> CommandResult<PlanChange> {
        self.ensure_accepting()?;
        let change = self.guard(|session| session.store.remove_date(date))?;
        self.locks.forget_date(date);
        self.enqueue(PersistCommand::DeleteDate { date, user: self.user.clone() });
        info!(%date, "Date deleted");
        Ok(self.publish(change))
    }

    /// # Errors
    /// [`CommandError::Rejected`] when no key fits or the anchor is unknown.
    pub fn add_activity(
        &mut self,
        date: NaiveDate,
        anchor: ActivityKey,
        direction: InsertDirection,
    ) -> CommandResult<PlanChange> {
        self.ensure_accepting()?;
        let activity = self.guard(|session| {
            session.store.insert_activity(date, anchor, direction, &session.user)
        })?;
        let at = ActivityRef::new(date, activity.id);
        self.enqueue(PersistCommand::AddActivity { at, created_by: self.user.clone() });
        info!(%at, %direction, "Activity added");
        Ok(self.publish(PlanChange::ActivityInserted { at }))
    }

    /// # Errors
    /// [`CommandError::Rejected`] for the last activity of a date.
    pub fn delete_activity(&mut self, at: ActivityRef) -> CommandResult<PlanChange> {
        self.ensure_accepting()?;
        let change = self.guard(|session| session.store.remove_activity(at))?;
        self.locks.forget(at);
        self.enqueue(PersistCommand::DeleteActivity { at, user: self.user.clone() });
        info!(%at, "Activity deleted");
        Ok(self.publish(change))
    }

    /// Focus an activity's text field, taking the edit lock.
    ///
    /// `Ok(None)` when the field was already being edited locally.
    ///
    /// # Errors
    /// [`CommandError::Rejected`] while a peer holds the lock.
    pub fn focus_activity(&mut self, at: ActivityRef) -> CommandResult<Option<PlanChange>> {
        self.ensure_accepting()?;
        let current = self.current_text(at)?;
        let newly_locked = self.guard(|session| session.locks.focus(at, &current))?;
        if !newly_locked {
            return Ok(None);
        }
        self.enqueue(PersistCommand::LockActivity { at, locked_by: self.user.clone() });
        debug!(%at, "Edit lock taken");
        Ok(Some(self.publish(PlanChange::LockChanged { at, state: LockState::LocalEditing })))
    }

    /// Local keystroke. Focuses the field first when needed; an appended
    /// trailing space publishes an intermediate, non-final update.
    ///
    /// # Errors
    /// [`CommandError::Rejected`] while a peer holds the lock.
    pub fn edit_activity_text(&mut self, at: ActivityRef, text: &str) -> CommandResult<PlanChange> {
        self.ensure_accepting()?;
        if !self.locks.is_local_editing(at) {
            self.focus_activity(at)?;
        }
        let intermediate = self.guard(|session| session.locks.edit(at, text))?;
        let change = self.guard(|session| session.store.set_activity_text(at, text, false))?;
        if intermediate {
            self.enqueue(PersistCommand::UpdateActivity {
                at,
                text: text.to_string(),
                updated_by: self.user.clone(),
                is_final: false,
            });
        }
        Ok(self.publish(change))
    }

    /// Blur the field: release the lock and publish the final text.
    ///
    /// `Ok(None)` when the field was not being edited locally.
    ///
    /// # Errors
    /// `PlanSyncError::Transport` once the session has ended.
    pub fn blur_activity(&mut self, at: ActivityRef) -> CommandResult<Option<PlanChange>> {
        self.ensure_accepting()?;
        let Some(outcome) = self.locks.blur(at) else {
            return Ok(None);
        };
        if let Ok(change) = self.store.set_activity_text(at, &outcome.final_text, true) {
            self.publish(change);
        }
        self.enqueue(PersistCommand::UpdateActivity {
            at,
            text: outcome.final_text,
            updated_by: self.user.clone(),
            is_final: true,
        });
        debug!(%at, next = ?outcome.next_state, "Edit lock released");
        Ok(Some(self.publish(PlanChange::LockChanged { at, state: outcome.next_state })))
    }

    /// Vote click with toggle semantics.
    ///
    /// # Errors
    /// [`CommandError::Rejected`] for an unknown activity.
    pub fn vote(&mut self, at: ActivityRef, vote: VoteType) -> CommandResult<PlanChange> {
        self.ensure_accepting()?;
        let resulting = self.guard(|session| session.store.set_vote(at, &session.user, vote))?;
        let activity = self.guard(|session| {
            session.store.activity(at).cloned().ok_or(Rejection::UnknownActivity)
        })?;
        self.enqueue(PersistCommand::VoteActivity {
            at,
            up_voters: activity.up_voters,
            down_voters: activity.down_voters,
            voter: self.user.clone(),
        });
        info!(%at, vote = %resulting, "Vote recorded");
        Ok(self.publish(PlanChange::VotesChanged { at }))
    }

    // ---- inbound ----

    /// Handle one event from the broadcast transport.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message { target, payload } => {
                if matches!(self.phase, SessionPhase::Closed | SessionPhase::Failed(_)) {
                    debug!(event_name = %target, "Session ended, dropping message");
                    return;
                }
                self.handle_message(&target, payload);
            }
            TransportEvent::Reconnecting { reason } => {
                warn!(%reason, "Transport connection lost, reconnecting");
                if self.phase.accepts_commands() {
                    self.set_phase(SessionPhase::Reconnecting);
                }
            }
            TransportEvent::Reconnected { connection_id } => {
                info!(%connection_id, "Transport reconnected");
                if !self.phase.accepts_commands() {
                    return;
                }
                self.set_phase(SessionPhase::Active);
                self.enqueue(PersistCommand::RegisterUser { connection_id });
                if self.config.resync_on_reconnect {
                    self.enqueue(PersistCommand::FetchPlan);
                }
            }
            TransportEvent::Closed { reason: Some(reason) } => self.fail(reason),
            TransportEvent::Closed { reason: None } => self.close(),
        }
    }

    fn handle_message(&mut self, target: &str, payload: serde_json::Value) {
        let event = match self.subscriptions.route(target, payload) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "Dropping malformed message");
                self.notifier.notify(Notice::Alert(err.to_string()));
                return;
            }
        };
        match self.reconciler.apply(&mut self.store, &mut self.locks, event) {
            Ok(Reconciled::Applied(changes)) => {
                for change in changes {
                    self.publish(change);
                }
            }
            Ok(Reconciled::Rejected(rejection)) => {
                self.notifier.notify(Notice::Warning(rejection.to_string()));
            }
            Ok(Reconciled::Echo | Reconciled::Ignored) => {}
            Err(err) => {
                warn!(error = %err, "Dropping malformed message");
                self.notifier.notify(Notice::Alert(err.to_string()));
            }
        }
    }

    /// Handle one persistence outcome from the dispatcher.
    pub fn handle_outcome(&mut self, outcome: PersistOutcome) {
        if let Some(message) = outcome.alert_message() {
            self.notifier.notify(Notice::Alert(message));
        }
        if outcome.settles_mutation() {
            self.unconfirmed = self.unconfirmed.saturating_sub(1);
        }
        match outcome {
            PersistOutcome::Completed { operation } => debug!(operation, "Persisted"),
            PersistOutcome::Fetched(snapshot) if self.unconfirmed > 0 => {
                // Calls run in queue order, so the snapshot predates every
                // mutation still unanswered.
                debug!(
                    unconfirmed = self.unconfirmed,
                    plan_id = %snapshot.plan.id,
                    "Snapshot is missing local mutations, refetching once they settle"
                );
                self.refetch_when_settled = true;
            }
            PersistOutcome::Fetched(snapshot) => self.apply_snapshot(assemble_plan(*snapshot)),
            PersistOutcome::Failed { operation, .. } => {
                if self.config.resync_on_failure
                    && operation != OP_GET_PLAN
                    && self.phase.accepts_commands()
                {
                    info!(operation, "Resyncing after persistence failure");
                    self.enqueue(PersistCommand::FetchPlan);
                }
            }
        }
        if self.refetch_when_settled && self.unconfirmed == 0 && self.phase.accepts_commands() {
            self.refetch_when_settled = false;
            self.enqueue(PersistCommand::FetchPlan);
        }
    }

    /// Replace the mirror with a freshly fetched plan.
    ///
    /// Text being typed locally is kept; lock entries for activities that no
    /// longer exist are dropped. A plan without dates is refused.
    pub fn apply_snapshot(&mut self, plan: Plan) {
        if plan.dates.is_empty() {
            warn!(plan_id = %plan.metadata.id, "Ignoring snapshot without dates");
            return;
        }
        let drafts: Vec<(ActivityRef, String)> =
            self.locks.local_drafts().map(|(at, text)| (at, text.to_string())).collect();
        self.store.replace(plan);
        for (at, text) in drafts {
            if self.store.set_activity_text(at, &text, false).is_err() {
                debug!(%at, "Edited activity vanished during resync");
            }
        }
        let store = &self.store;
        self.locks.retain_existing(|at| store.contains_activity(at));
        info!(dates = self.store.plan().dates.len(), "Plan resynchronised");
        self.publish(PlanChange::Resynced);
    }

    /// Fatal transport failure: alert and stop accepting commands.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(%reason, "Session failed");
        self.subscriptions.teardown();
        self.notifier.notify(Notice::Fatal(reason.clone()));
        self.set_phase(SessionPhase::Failed(reason));
    }

    /// Orderly shutdown.
    pub fn close(&mut self) {
        if matches!(self.phase, SessionPhase::Closed | SessionPhase::Failed(_)) {
            return;
        }
        self.subscriptions.teardown();
        self.set_phase(SessionPhase::Closed);
        info!(plan_id = %self.store.plan_id(), "Session closed");
    }

    // ---- helpers ----

    fn ensure_accepting(&self) -> CommandResult<()> {
        if self.phase.accepts_commands() {
            Ok(())
        } else {
            Err(CommandError::Session(PlanSyncError::Transport(format!(
                "session is not active ({:?})",
                self.phase
            ))))
        }
    }

    /// Run a store/lock operation, warning the user when it is refused.
    fn guard<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, Rejection>,
    ) -> CommandResult<T> {
        op(self).map_err(|rejection| {
            warn!(%rejection, "Local mutation rejected");
            self.notifier.notify(Notice::Warning(rejection.to_string()));
            CommandError::Rejected(rejection)
        })
    }

    fn current_text(&mut self, at: ActivityRef) -> CommandResult<String> {
        self.guard(|session| {
            session
                .store
                .activity(at)
                .map(|activity| activity.text().to_string())
                .ok_or(Rejection::UnknownActivity)
        })
    }

    fn enqueue(&mut self, command: PersistCommand) {
        let mutation = command.is_mutation();
        match self.queue.push(command) {
            Ok(()) if mutation => self.unconfirmed = self.unconfirmed.saturating_add(1),
            Ok(()) => {}
            Err(err) => {
                error!(error = %err, "Could not queue persistence call");
                self.notifier.notify(Notice::Alert(err.to_string()));
            }
        }
    }

    fn publish(&self, change: PlanChange) -> PlanChange {
        // No subscribers is fine.
        let _ = self.changes.send(change.clone());
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
        change
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "Session phase changed");
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use plansync_domain::PlanMetadata;

    use super::*;
    use crate::pipeline::{persist_queue, PendingCommands};

    #[derive(Default)]
    struct Notices(Mutex<Vec<Notice>>);

    impl UserNotifier for Notices {
        fn notify(&self, notice: Notice) {
            self.0.lock().unwrap().push(notice);
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn session(days: &[&str]) -> (PlanSession, PendingCommands, Arc<Notices>) {
        let metadata =
            PlanMetadata { id: "p1".into(), name: "Trip".into(), created_by: "alice".into() };
        let plan = Plan::seeded(metadata, days.iter().map(|d| day(d)));
        let (queue, pending) = persist_queue();
        let notices = Arc::new(Notices::default());
        let session = PlanSession::new(SessionConfig::new("alice"), plan, queue, notices.clone());
        (session, pending, notices)
    }

    #[test]
    fn rejected_delete_warns_and_queues_nothing() {
        let (mut session, mut pending, notices) = session(&["2025-01-01"]);
        let result = session.delete_date(day("2025-01-01"));
        assert_eq!(result, Err(CommandError::Rejected(Rejection::AtLeastOneDate)));
        assert_eq!(
            notices.0.lock().unwrap().as_slice(),
            &[Notice::Warning("A plan needs at least one date".into())]
        );
        assert!(pending.try_next().is_none());
    }

    #[test]
    fn failed_session_refuses_commands() {
        let (mut session, _pending, notices) = session(&["2025-01-01"]);
        session.handle_transport_event(TransportEvent::Closed { reason: Some("negotiate failed".into()) });
        assert_eq!(session.phase(), &SessionPhase::Failed("negotiate failed".into()));
        assert!(session.subscriptions().is_empty());
        assert!(matches!(
            session.add_date(day("2025-01-01"), InsertDirection::After),
            Err(CommandError::Session(PlanSyncError::Transport(_)))
        ));
        assert_eq!(notices.0.lock().unwrap().last(), Some(&Notice::Fatal("negotiate failed".into())));
    }

    #[test]
    fn every_change_bumps_revision() {
        let (mut session, _pending, _) = session(&["2025-01-01"]);
        let revision = session.watch_revision();
        session.add_date(day("2025-01-01"), InsertDirection::After).unwrap();
        session.vote(ActivityRef::new(day("2025-01-01"), ActivityKey::new(0.0)), VoteType::Up).unwrap();
        assert_eq!(*revision.borrow(), 2);
    }
}
