//! Session bootstrap
//!
//! Wires the store client, the hub transport and the core session runtime:
//! create or join the plan, negotiate, connect, register the connection with
//! the store, then run.

use std::sync::Arc;

use plansync_core::{
    assemble_plan, persist_queue, Notice, PlanPersistence, PlanSession, RuntimeConfig,
    SessionHandle, SessionRuntime, UserNotifier,
};
use plansync_domain::{
    CreatePlanPayload, Plan, PlanRequest, PlanSyncConfig, PlanSyncError, Result,
};
use tracing::{error, info, instrument, warn};

use crate::api::PlanApiClient;
use crate::transport::{HubConfig, HubTransport};

/// A running collaborative session on one plan.
pub struct PlanSyncClient {
    api: Arc<PlanApiClient>,
    runtime: SessionRuntime,
    transport: HubTransport,
    connection_id: String,
}

impl PlanSyncClient {
    /// Enter a plan and start syncing it.
    ///
    /// The session's user is the one named in `request`.
    ///
    /// # Errors
    /// - `PlanSyncError::InvalidInput` for a request that fails validation
    /// - `PlanSyncError::Persistence` / `Network` when the plan cannot be
    ///   created or fetched
    /// - `PlanSyncError::Transport` when the hub cannot be reached; the
    ///   notifier receives a fatal notice first
    #[instrument(skip_all, fields(user = %request.user_name()))]
    pub async fn open(
        config: &PlanSyncConfig,
        request: PlanRequest,
        notifier: Arc<dyn UserNotifier>,
    ) -> Result<Self> {
        request.validate()?;
        let api = Arc::new(PlanApiClient::new(&config.api)?);
        let plan = load_plan(api.as_ref(), &request).await?;
        let plan_id = plan.metadata.id.clone();
        info!(%plan_id, name = %plan.metadata.name, "plan loaded");

        let mut session_config = config.session.clone();
        session_config.user_name = request.user_name().to_string();
        let hub_config = HubConfig::from_session(&session_config);

        let (queue, pending) = persist_queue();
        let mut session = PlanSession::new(session_config, plan, queue, Arc::clone(&notifier));

        let connected = match api.negotiate().await {
            Ok(info) => {
                let mut transport = HubTransport::new(api.http().clone(), info, hub_config);
                let started = transport.start().await;
                started.map(|(connection_id, events)| (transport, connection_id, events))
            }
            Err(err) => Err(PlanSyncError::Transport(err.to_string())),
        };
        let (transport, connection_id, events) = match connected {
            Ok(connected) => connected,
            Err(err) => {
                error!(error = %err, "transport bootstrap failed");
                session.fail(err.to_string());
                return Err(match err {
                    transport @ PlanSyncError::Transport(_) => transport,
                    other => PlanSyncError::Transport(other.to_string()),
                });
            }
        };

        if let Err(err) = api.register_user(&plan_id, &connection_id).await {
            warn!(error = %err, "registerUser failed; broadcasts may not arrive");
            notifier.notify(Notice::Alert(err.to_string()));
        }

        session.mark_active();
        let persistence: Arc<dyn PlanPersistence> = api.clone();
        let runtime =
            SessionRuntime::start(session, persistence, pending, events, RuntimeConfig::default())?;

        Ok(Self { api, runtime, transport, connection_id })
    }

    pub fn handle(&self) -> SessionHandle {
        self.runtime.handle()
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn api(&self) -> &PlanApiClient {
        &self.api
    }

    /// Stop the transport and the session runtime.
    ///
    /// # Errors
    /// `PlanSyncError::Internal` if a background task panicked or did not
    /// stop in time. Both are stopped regardless.
    pub async fn close(mut self) -> Result<()> {
        let transport = self.transport.stop().await;
        let runtime = self.runtime.stop().await;
        info!(connection_id = %self.connection_id, "plan session closed");
        transport.and(runtime)
    }
}

/// Create the plan or fetch the one being joined.
///
/// # Errors
/// Whatever the store call returns, or `PlanSyncError::NotFound` for a
/// joined plan without any date.
pub async fn load_plan(store: &dyn PlanPersistence, request: &PlanRequest) -> Result<Plan> {
    match request {
        PlanRequest::Create { user_name, plan_name, .. } => {
            let days = request.initial_days();
            let payload = CreatePlanPayload::new(plan_name.clone(), user_name.clone(), &days);
            let snapshot = store.create_plan(&payload).await?;
            if snapshot.dates.is_empty() {
                return Ok(Plan::seeded(snapshot.plan, days));
            }
            Ok(assemble_plan(snapshot))
        }
        PlanRequest::Join { invite_code, .. } => {
            let invite_code = invite_code.trim();
            let plan = assemble_plan(store.get_plan(invite_code).await?);
            if plan.dates.is_empty() {
                return Err(PlanSyncError::NotFound(format!("Plan {invite_code} has no dates")));
            }
            Ok(plan)
        }
    }
}
