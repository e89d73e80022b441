//! Sequential persistence dispatcher
//!
//! Local mutations are applied immediately and their persistence calls are
//! queued here. A single background task drains the queue in FIFO order, so a
//! call never starts before the calls queued ahead of it have finished (an
//! activity is never addressed before its date exists). Callers never wait:
//! outcomes come back on a channel. Calls are neither retried nor timed out
//! at this level.

use std::sync::Arc;
use std::time::Duration;

use plansync_domain::{PlanSyncError, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::command::{PersistCommand, PersistOutcome};
use crate::ports::PlanPersistence;

/// Create the queue the session writes to and the receiving end the
/// dispatcher drains.
pub fn persist_queue() -> (PersistQueue, PendingCommands) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (PersistQueue { sender }, PendingCommands { receiver })
}

/// Sending side of the persistence queue.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    sender: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistQueue {
    /// Queue a call; never blocks.
    ///
    /// # Errors
    /// Returns `PlanSyncError::Internal` once the dispatcher has shut down.
    pub fn push(&self, command: PersistCommand) -> Result<()> {
        let operation = command.operation();
        self.sender.send(command).map_err(|_| {
            PlanSyncError::Internal(format!("persistence queue closed, dropped {operation}"))
        })
    }
}

/// Receiving side of the persistence queue.
#[derive(Debug)]
pub struct PendingCommands {
    receiver: mpsc::UnboundedReceiver<PersistCommand>,
}

impl PendingCommands {
    /// Take the next queued call without waiting.
    pub fn try_next(&mut self) -> Option<PersistCommand> {
        self.receiver.try_recv().ok()
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { join_timeout: Duration::from_secs(5) }
    }
}

/// Background worker with explicit lifecycle management.
pub struct PersistenceDispatcher {
    persistence: Arc<dyn PlanPersistence>,
    plan_id: String,
    config: DispatcherConfig,
    pending: Option<PendingCommands>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl PersistenceDispatcher {
    pub fn new(
        persistence: Arc<dyn PlanPersistence>,
        plan_id: impl Into<String>,
        pending: PendingCommands,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            persistence,
            plan_id: plan_id.into(),
            config,
            pending: Some(pending),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Spawn the draining task; outcomes are sent to `outcomes`.
    ///
    /// # Errors
    /// Returns `PlanSyncError::Internal` if already started (the queue can only
    /// be drained once).
    #[instrument(skip(self, outcomes), fields(plan_id = %self.plan_id))]
    pub fn start(&mut self, outcomes: mpsc::UnboundedSender<PersistOutcome>) -> Result<()> {
        if self.is_running() {
            return Err(PlanSyncError::Internal("Dispatcher already running".into()));
        }
        let pending = self
            .pending
            .take()
            .ok_or_else(|| PlanSyncError::Internal("Dispatcher queue already consumed".into()))?;

        self.cancellation = CancellationToken::new();
        let persistence = Arc::clone(&self.persistence);
        let plan_id = self.plan_id.clone();
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::process_loop(persistence, plan_id, pending.receiver, outcomes, cancel).await;
        });
        self.task_handle = Some(handle);
        info!("Persistence dispatcher started");
        Ok(())
    }

    /// Stop the worker and wait for the task to finish. Calls still queued
    /// are dropped.
    ///
    /// # Errors
    /// Returns `PlanSyncError::Internal` if the task panicked or did not stop
    /// within the join timeout.
    #[instrument(skip(self), fields(plan_id = %self.plan_id))]
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Ok(());
        };
        self.cancellation.cancel();
        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(())) => {
                info!("Persistence dispatcher stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Dispatcher task panicked: {}", e);
                Err(PlanSyncError::Internal("Dispatcher task panicked".into()))
            }
            Err(_) => {
                warn!("Dispatcher task did not complete within timeout");
                Err(PlanSyncError::Internal("Dispatcher task timeout".into()))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn process_loop(
        persistence: Arc<dyn PlanPersistence>,
        plan_id: String,
        mut receiver: mpsc::UnboundedReceiver<PersistCommand>,
        outcomes: mpsc::UnboundedSender<PersistOutcome>,
        cancel: CancellationToken,
    ) {
        loop {
            let command = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                command = receiver.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            let operation = command.operation();
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(operation, "Dispatcher cancelled mid-call");
                    break;
                }
                result = command.execute(persistence.as_ref(), &plan_id) => result,
            };

            let outcome = match result {
                Ok(Some(snapshot)) => PersistOutcome::Fetched(Box::new(snapshot)),
                Ok(None) => {
                    debug!(operation, "Persistence call completed");
                    PersistOutcome::Completed { operation }
                }
                Err(error) => {
                    warn!(operation, error = %error, kind = error.label(), "Persistence call failed");
                    PersistOutcome::Failed { operation, error }
                }
            };
            if outcomes.send(outcome).is_err() {
                debug!("Outcome receiver dropped, stopping dispatcher");
                break;
            }
        }

        let dropped = {
            let mut count = 0_usize;
            while receiver.try_recv().is_ok() {
                count = count.saturating_add(1);
            }
            count
        };
        if dropped > 0 {
            warn!(dropped, "Dispatcher stopped with calls still queued");
        }
        debug!("Persistence dispatcher loop exited");
    }
}
