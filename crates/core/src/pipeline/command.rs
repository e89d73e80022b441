//! Persistence calls issued by the session.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use plansync_domain::constants::{
    OP_ADD_ACTIVITY, OP_ADD_DATE, OP_DELETE_ACTIVITY, OP_DELETE_DATE, OP_GET_PLAN,
    OP_LOCK_ACTIVITY, OP_REGISTER_USER, OP_UPDATE_ACTIVITY, OP_VOTE_ACTIVITY,
};
use plansync_domain::{ActivityRef, PlanSnapshot, PlanSyncError, Result};

use crate::ports::PlanPersistence;

/// One queued call against the persisted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistCommand {
    AddDate { date: NaiveDate, created_by: String },
    DeleteDate { date: NaiveDate, user: String },
    AddActivity { at: ActivityRef, created_by: String },
    DeleteActivity { at: ActivityRef, user: String },
    UpdateActivity { at: ActivityRef, text: String, updated_by: String, is_final: bool },
    LockActivity { at: ActivityRef, locked_by: String },
    VoteActivity {
        at: ActivityRef,
        up_voters: BTreeSet<String>,
        down_voters: BTreeSet<String>,
        voter: String,
    },
    RegisterUser { connection_id: String },
    /// Full re-fetch used for resynchronisation.
    FetchPlan,
}

impl PersistCommand {
    /// Store operation name, as used in alerts.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::AddDate { .. } => OP_ADD_DATE,
            Self::DeleteDate { .. } => OP_DELETE_DATE,
            Self::AddActivity { .. } => OP_ADD_ACTIVITY,
            Self::DeleteActivity { .. } => OP_DELETE_ACTIVITY,
            Self::UpdateActivity { .. } => OP_UPDATE_ACTIVITY,
            Self::LockActivity { .. } => OP_LOCK_ACTIVITY,
            Self::VoteActivity { .. } => OP_VOTE_ACTIVITY,
            Self::RegisterUser { .. } => OP_REGISTER_USER,
            Self::FetchPlan => OP_GET_PLAN,
        }
    }

    /// Whether the call changes the stored plan.
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::RegisterUser { .. } | Self::FetchPlan)
    }

    pub(crate) async fn execute(
        self,
        persistence: &dyn PlanPersistence,
        plan_id: &str,
    ) -> Result<Option<PlanSnapshot>> {
        match self {
            Self::AddDate { date, created_by } => {
                persistence.add_date(plan_id, date, &created_by).await?;
            }
            Self::DeleteDate { date, user } => {
                persistence.delete_date(plan_id, date, &user).await?;
            }
            Self::AddActivity { at, created_by } => {
                persistence.add_activity(plan_id, at, &created_by).await?;
            }
            Self::DeleteActivity { at, user } => {
                persistence.delete_activity(plan_id, at, &user).await?;
            }
            Self::UpdateActivity { at, text, updated_by, is_final } => {
                persistence.update_activity(plan_id, at, &text, &updated_by, is_final).await?;
            }
            Self::LockActivity { at, locked_by } => {
                persistence.lock_activity(plan_id, at, &locked_by).await?;
            }
            Self::VoteActivity { at, up_voters, down_voters, voter } => {
                persistence.vote_activity(plan_id, at, &up_voters, &down_voters, &voter).await?;
            }
            Self::RegisterUser { connection_id } => {
                persistence.register_user(plan_id, &connection_id).await?;
            }
            Self::FetchPlan => return persistence.get_plan(plan_id).await.map(Some),
        }
        Ok(None)
    }
}

/// Result of one dispatched call, fed back into the session.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    Completed { operation: &'static str },
    Fetched(Box<PlanSnapshot>),
    Failed { operation: &'static str, error: PlanSyncError },
}

impl PersistOutcome {
    /// Whether this outcome answers a call that changes the stored plan.
    pub fn settles_mutation(&self) -> bool {
        match self {
            Self::Completed { operation } | Self::Failed { operation, .. } => {
                *operation != OP_GET_PLAN && *operation != OP_REGISTER_USER
            }
            Self::Fetched(_) => false,
        }
    }

    /// Alert text for a failure: `Error received from <op> API: <message>`.
    pub fn alert_message(&self) -> Option<String> {
        match self {
            Self::Failed { error: error @ PlanSyncError::Persistence { .. }, .. } => {
                Some(error.to_string())
            }
            Self::Failed { operation, error } => {
                Some(PlanSyncError::persistence(*operation, error.to_string()).to_string())
            }
            _ => None,
        }
    }
}
