//! In-memory `PlanPersistence` that records calls.
//!
//! Operations can be told to fail or to take a while; the mock also tracks
//! how many calls were in flight at once so ordering tests can assert that
//! the dispatcher never overlaps them.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use plansync_core::PlanPersistence;
use plansync_domain::constants::{
    OP_ADD_ACTIVITY, OP_ADD_DATE, OP_CREATE_PLAN, OP_DELETE_ACTIVITY, OP_DELETE_DATE,
    OP_GET_PLAN, OP_LOCK_ACTIVITY, OP_NEGOTIATE, OP_REGISTER_USER, OP_UPDATE_ACTIVITY,
    OP_VOTE_ACTIVITY,
};
use plansync_domain::{
    ActivityRef, ActivityRow, ConnectionInfo, CreatePlanPayload, DateRow, PlanMetadata, PlanSnapshot,
    PlanSyncError, Result as DomainResult,
};

/// One recorded call: the store operation and a short rendering of its
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: &'static str,
    pub detail: String,
}

#[derive(Default)]
pub struct RecordingPersistence {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<&'static str>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    snapshot: Mutex<Option<PlanSnapshot>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot served by `getPlan`.
    pub fn with_snapshot(self, snapshot: PlanSnapshot) -> Self {
        *self.snapshot.lock().unwrap() = Some(snapshot);
        self
    }

    pub fn set_snapshot(&self, snapshot: PlanSnapshot) {
        *self.snapshot.lock().unwrap() = Some(snapshot);
    }

    pub fn fail_on(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn delay(&self, operation: &'static str, delay: Duration) {
        self.delays.lock().unwrap().insert(operation, delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|call| call.operation).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` calls were recorded.
    pub async fn wait_for_calls(&self, count: usize) -> Vec<Call> {
        for _ in 0..200 {
            if self.calls.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.calls()
    }

    async fn record(&self, operation: &'static str, detail: String) -> DomainResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(Call { operation, detail });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(operation) {
            return Err(PlanSyncError::persistence(operation, "rejected by test store"));
        }
        Ok(())
    }
}

#[async_trait]
impl PlanPersistence for RecordingPersistence {
    async fn create_plan(&self, payload: &CreatePlanPayload) -> DomainResult<PlanSnapshot> {
        self.record(OP_CREATE_PLAN, payload.plan_name.clone()).await?;
        Ok(PlanSnapshot {
            plan: PlanMetadata {
                id: "invite-1".into(),
                name: payload.plan_name.clone(),
                created_by: payload.created_by.clone(),
            },
            dates: payload
                .dates
                .iter()
                .map(|date| DateRow { id: date.id.clone(), created_by: payload.created_by.clone() })
                .collect(),
            activities: Vec::new(),
        })
    }

    async fn get_plan(&self, plan_id: &str) -> DomainResult<PlanSnapshot> {
        self.record(OP_GET_PLAN, plan_id.to_string()).await?;
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PlanSyncError::persistence(OP_GET_PLAN, "Plan not found"))
    }

    async fn add_date(&self, _plan_id: &str, date: NaiveDate, created_by: &str) -> DomainResult<()> {
        self.record(OP_ADD_DATE, format!("{date} by {created_by}")).await
    }

    async fn delete_date(&self, _plan_id: &str, date: NaiveDate, user: &str) -> DomainResult<()> {
        self.record(OP_DELETE_DATE, format!("{date} by {user}")).await
    }

    /// Also stored in the served snapshot, so a later `getPlan` sees it.
    async fn add_activity(&self, plan_id: &str, at: ActivityRef, created_by: &str) -> DomainResult<()> {
        self.record(OP_ADD_ACTIVITY, format!("{at} by {created_by}")).await?;
        if let Some(snapshot) = self.snapshot.lock().unwrap().as_mut() {
            snapshot.activities.push(ActivityRow {
                id: format!("{plan_id}_{}_{}", at.date, at.key),
                date_id: None,
                created_by: created_by.to_string(),
                activity_text: None,
                up_voters: None,
                down_voters: None,
            });
        }
        Ok(())
    }

    async fn delete_activity(&self, _plan_id: &str, at: ActivityRef, user: &str) -> DomainResult<()> {
        self.record(OP_DELETE_ACTIVITY, format!("{at} by {user}")).await
    }

    async fn update_activity(
        &self,
        _plan_id: &str,
        at: ActivityRef,
        activity_text: &str,
        updated_by: &str,
        is_final: bool,
    ) -> DomainResult<()> {
        self.record(
            OP_UPDATE_ACTIVITY,
            format!("{at} {activity_text:?} by {updated_by} final={is_final}"),
        )
        .await
    }

    async fn lock_activity(&self, _plan_id: &str, at: ActivityRef, locked_by: &str) -> DomainResult<()> {
        self.record(OP_LOCK_ACTIVITY, format!("{at} by {locked_by}")).await
    }

    async fn vote_activity(
        &self,
        _plan_id: &str,
        at: ActivityRef,
        up_voters: &BTreeSet<String>,
        down_voters: &BTreeSet<String>,
        voter: &str,
    ) -> DomainResult<()> {
        self.record(
            OP_VOTE_ACTIVITY,
            format!("{at} up={up_voters:?} down={down_voters:?} by {voter}"),
        )
        .await
    }

    async fn register_user(&self, plan_id: &str, connection_id: &str) -> DomainResult<()> {
        self.record(OP_REGISTER_USER, format!("{plan_id} {connection_id}")).await
    }

    async fn negotiate(&self) -> DomainResult<ConnectionInfo> {
        self.record(OP_NEGOTIATE, String::new()).await?;
        Ok(ConnectionInfo { url: "http://hub.test/client".into(), access_token: "token".into() })
    }
}
