//! Session runtime
//!
//! Runs a [`PlanSession`] behind a mutex: one driver task feeds it transport
//! events and persistence outcomes, while [`SessionHandle`]s issue local
//! actions from anywhere. The persistence dispatcher runs alongside.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use plansync_domain::{
    ActivityKey, ActivityRef, InsertDirection, Plan, PlanSyncError, Result, VoteType,
};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CommandResult, PlanSession, SessionPhase};
use crate::calendar::CalendarGrid;
use crate::edit_lock::LockState;
use crate::pipeline::{DispatcherConfig, PendingCommands, PersistOutcome, PersistenceDispatcher};
use crate::ports::PlanPersistence;
use crate::remote::TransportEvent;
use crate::store::PlanChange;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub dispatcher: DispatcherConfig,
    /// Join timeout for the driver task when stopping
    pub join_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { dispatcher: DispatcherConfig::default(), join_timeout: Duration::from_secs(5) }
    }
}

/// Cloneable entry point for local actions and queries.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<PlanSession>>,
}

impl SessionHandle {
    pub async fn add_date(
        &self,
        anchor: NaiveDate,
        direction: InsertDirection,
    ) -> CommandResult<PlanChange> {
        self.session.lock().await.add_date(anchor, direction)
    }

    pub async fn delete_date(&self, date: NaiveDate) -> CommandResult<PlanChange> {
        self.session.lock().await.delete_date(date)
    }

    pub async fn add_activity(
        &self,
        date: NaiveDate,
        anchor: ActivityKey,
        direction: InsertDirection,
    ) -> CommandResult<PlanChange> {
        self.session.lock().await.add_activity(date, anchor, direction)
    }

    pub async fn delete_activity(&self, at: ActivityRef) -> CommandResult<PlanChange> {
        self.session.lock().await.delete_activity(at)
    }

    pub async fn focus_activity(&self, at: ActivityRef) -> CommandResult<Option<PlanChange>> {
        self.session.lock().await.focus_activity(at)
    }

    pub async fn edit_activity_text(
        &self,
        at: ActivityRef,
        text: &str,
    ) -> CommandResult<PlanChange> {
        self.session.lock().await.edit_activity_text(at, text)
    }

    pub async fn blur_activity(&self, at: ActivityRef) -> CommandResult<Option<PlanChange>> {
        self.session.lock().await.blur_activity(at)
    }

    pub async fn vote(&self, at: ActivityRef, vote: VoteType) -> CommandResult<PlanChange> {
        self.session.lock().await.vote(at, vote)
    }

    /// Copy of the current mirror.
    pub async fn plan(&self) -> Plan {
        self.session.lock().await.plan().clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.session.lock().await.phase().clone()
    }

    pub async fn calendar(&self) -> CalendarGrid {
        self.session.lock().await.calendar()
    }

    pub async fn lock_state(&self, at: ActivityRef) -> LockState {
        self.session.lock().await.lock_state(at)
    }

    pub async fn typing_indicator(&self, at: ActivityRef) -> Option<String> {
        self.session.lock().await.typing_indicator(at)
    }

    pub async fn subscribe_changes(&self) -> broadcast::Receiver<PlanChange> {
        self.session.lock().await.subscribe_changes()
    }

    pub async fn watch_revision(&self) -> watch::Receiver<u64> {
        self.session.lock().await.watch_revision()
    }
}

/// Owns the driver task and the persistence dispatcher of one session.
pub struct SessionRuntime {
    handle: SessionHandle,
    dispatcher: PersistenceDispatcher,
    cancellation: CancellationToken,
    driver: Option<JoinHandle<()>>,
    config: RuntimeConfig,
}

impl SessionRuntime {
    /// Start the dispatcher and the driver task.
    ///
    /// # Errors
    /// Returns `PlanSyncError::Internal` if the dispatcher cannot start.
    pub fn start(
        session: PlanSession,
        persistence: Arc<dyn PlanPersistence>,
        pending: PendingCommands,
        events: mpsc::Receiver<TransportEvent>,
        config: RuntimeConfig,
    ) -> Result<Self> {
        let plan_id = session.plan_id().to_string();
        let mut dispatcher =
            PersistenceDispatcher::new(persistence, plan_id.clone(), pending, config.dispatcher.clone());
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        dispatcher.start(outcome_tx)?;

        let session = Arc::new(Mutex::new(session));
        let cancellation = CancellationToken::new();
        let driver = tokio::spawn(Self::drive(
            Arc::clone(&session),
            events,
            outcome_rx,
            cancellation.clone(),
        ));
        info!(%plan_id, "Session runtime started");

        Ok(Self {
            handle: SessionHandle { session },
            dispatcher,
            cancellation,
            driver: Some(driver),
            config,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.driver.as_ref().is_some_and(|driver| !driver.is_finished())
    }

    /// Stop the driver, then the dispatcher, and close the session.
    ///
    /// # Errors
    /// Returns `PlanSyncError::Internal` if either task panicked or timed out.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation.cancel();
        let driver_result = match self.driver.take() {
            Some(driver) => match tokio::time::timeout(self.config.join_timeout, driver).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    warn!("Session driver panicked: {}", e);
                    Err(PlanSyncError::Internal("Session driver panicked".into()))
                }
                Err(_) => {
                    warn!("Session driver did not complete within timeout");
                    Err(PlanSyncError::Internal("Session driver timeout".into()))
                }
            },
            None => Ok(()),
        };
        let dispatcher_result = self.dispatcher.stop().await;
        self.handle.session.lock().await.close();
        driver_result.and(dispatcher_result)
    }

    async fn drive(
        session: Arc<Mutex<PlanSession>>,
        mut events: mpsc::Receiver<TransportEvent>,
        mut outcomes: mpsc::UnboundedReceiver<PersistOutcome>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(outcome) = outcomes.recv() => {
                    session.lock().await.handle_outcome(outcome);
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("Transport event stream ended");
                        session.lock().await.close();
                        break;
                    };
                    let terminal = matches!(event, TransportEvent::Closed { .. });
                    session.lock().await.handle_transport_event(event);
                    if terminal {
                        break;
                    }
                }
            }
        }
        debug!("Session driver exited");
    }
}
