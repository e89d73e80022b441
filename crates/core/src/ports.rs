//! Port interfaces for the sync engine
//!
//! These traits define the boundaries between the plan session and the
//! outside world: the persisted store and the person using the client.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use plansync_domain::{ActivityRef, ConnectionInfo, CreatePlanPayload, PlanSnapshot, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Trait for the persisted plan store
///
/// Every mutation is tagged with the acting user so that its broadcast echo
/// can be recognised.
#[async_trait]
pub trait PlanPersistence: Send + Sync {
    /// Create a plan and return its rows
    async fn create_plan(&self, payload: &CreatePlanPayload) -> Result<PlanSnapshot>;

    /// Fetch the full plan as flat rows
    async fn get_plan(&self, plan_id: &str) -> Result<PlanSnapshot>;

    async fn add_date(&self, plan_id: &str, date: NaiveDate, created_by: &str) -> Result<()>;

    async fn delete_date(&self, plan_id: &str, date: NaiveDate, user: &str) -> Result<()>;

    async fn add_activity(&self, plan_id: &str, at: ActivityRef, created_by: &str) -> Result<()>;

    async fn delete_activity(&self, plan_id: &str, at: ActivityRef, user: &str) -> Result<()>;

    async fn update_activity(
        &self,
        plan_id: &str,
        at: ActivityRef,
        activity_text: &str,
        updated_by: &str,
        is_final: bool,
    ) -> Result<()>;

    /// Broadcast an advisory edit lock
    async fn lock_activity(&self, plan_id: &str, at: ActivityRef, locked_by: &str) -> Result<()>;

    async fn vote_activity(
        &self,
        plan_id: &str,
        at: ActivityRef,
        up_voters: &BTreeSet<String>,
        down_voters: &BTreeSet<String>,
        voter: &str,
    ) -> Result<()>;

    /// Route the plan's broadcasts to a transport connection
    async fn register_user(&self, plan_id: &str, connection_id: &str) -> Result<()>;

    /// Transport bootstrap credentials
    async fn negotiate(&self) -> Result<ConnectionInfo>;
}

/// Something the user must be told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "message", rename_all = "snake_case")]
pub enum Notice {
    /// Local rejection; nothing changed.
    Warning(String),
    /// Failure of a single operation or message; the session carries on.
    Alert(String),
    /// The session cannot continue.
    Fatal(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Self::Warning(message) | Self::Alert(message) | Self::Fatal(message) => message,
        }
    }
}

/// Trait for surfacing notices to the user
pub trait UserNotifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl UserNotifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::Warning(message) => info!(%message, "User warning"),
            Notice::Alert(message) => warn!(%message, "User alert"),
            Notice::Fatal(message) => error!(%message, "Fatal session error"),
        }
    }
}
