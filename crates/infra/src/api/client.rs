//! Persisted-store HTTP client
//!
//! Implements [`PlanPersistence`] over the store's `/api/<operation>` routes.
//! Reads (`getPlan`, `negotiate`) go through the retrying path of
//! [`HttpClient`]; every mutation is sent exactly once.

use std::collections::BTreeSet;
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
    format_day, ActivityRef, ApiConfig, ConnectionInfo, CreatePlanPayload, PlanSnapshot,
    PlanSyncError, Result,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::errors::ApiError;
use crate::http::HttpClient;

/// Client for the persisted plan store.
#[derive(Clone)]
pub struct PlanApiClient {
    http: HttpClient,
    base_url: String,
    read_deadline: Duration,
    write_deadline: Duration,
}

impl PlanApiClient {
    /// Build a client from the API settings.
    ///
    /// # Errors
    /// Returns `PlanSyncError::Config` if the base URL is not an absolute
    /// http(s) URL or the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = HttpClient::from_config(config)?;
        let timeout = Duration::from_secs(config.timeout_secs);
        Self::with_http(&config.base_url, http, timeout, config.read_attempts)
    }

    /// Build a client around an existing [`HttpClient`].
    ///
    /// `timeout` bounds a single attempt; reads get one such budget per
    /// attempt.
    ///
    /// # Errors
    /// Returns `PlanSyncError::Config` for an unusable base URL.
    pub fn with_http(
        base_url: &str,
        http: HttpClient,
        timeout: Duration,
        read_attempts: u32,
    ) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&base_url)
            .map_err(|err| PlanSyncError::Config(format!("invalid store URL {base_url}: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PlanSyncError::Config(format!(
                "store URL must be http(s): {base_url}"
            )));
        }

        Ok(Self {
            http,
            base_url,
            read_deadline: timeout.saturating_mul(read_attempts.max(1)),
            write_deadline: timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client, shared with the hub transport.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// `<base>/api/<operation>/<segment>/...` with each segment percent-encoded.
    fn route(&self, operation: &str, segments: &[&str]) -> String {
        let mut url = format!("{}/api/{operation}", self.base_url);
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    fn activity_route(&self, operation: &str, plan_id: &str, at: ActivityRef) -> String {
        let day = format_day(at.date);
        let key = at.key.to_string();
        self.route(operation, &[plan_id, &day, &key])
    }

    /// Send a request and decode the `{data}` payload. Only idempotent reads
    /// set `retry`.
    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
        retry: bool,
    ) -> Result<T> {
        let deadline = if retry { self.read_deadline } else { self.write_deadline };
        let response = self
            .dispatch(builder, deadline, retry)
            .await
            .map_err(|err| err.into_domain(operation))?;
        let response = ensure_success(response).await.map_err(|err| err.into_domain(operation))?;

        let body = response
            .text()
            .await
            .map_err(|err| ApiError::Network(err.to_string()).into_domain(operation))?;
        decode_data(&body).map_err(|err| err.into_domain(operation))
    }

    /// Send a mutation exactly once; the response body is not inspected.
    async fn write(&self, operation: &'static str, builder: RequestBuilder) -> Result<()> {
        let response = self
            .dispatch(builder, self.write_deadline, false)
            .await
            .map_err(|err| err.into_domain(operation))?;
        ensure_success(response).await.map_err(|err| err.into_domain(operation))?;
        debug!(operation, "store accepted mutation");
        Ok(())
    }

    async fn dispatch(
        &self,
        builder: RequestBuilder,
        deadline: Duration,
        retry: bool,
    ) -> std::result::Result<Response, ApiError> {
        let call = async {
            if retry {
                self.http.send(builder).await
            } else {
                self.http.send_once(builder).await
            }
        };

        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(ApiError::from(err)),
            Err(_) => Err(ApiError::Timeout(deadline)),
        }
    }
}

/// Turn a non-success response into an [`ApiError`] carrying the store's
/// `{"error": ...}` text, the raw body, or the status reason, in that order.
async fn ensure_success(response: Response) -> std::result::Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string());
    warn!(status = status.as_u16(), %message, "store returned an error");
    Err(ApiError::from_status(status.as_u16(), message))
}

fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => match map.get("error") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_string()),
        },
        _ => Some(trimmed.to_string()),
    }
}

/// Unwrap `{"data": ...}`. The payload may itself be JSON encoded as a string.
fn decode_data<T: DeserializeOwned>(body: &str) -> std::result::Result<T, ApiError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| ApiError::InvalidResponse(format!("not JSON: {err}")))?;

    let payload = match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    let payload = match payload {
        Value::String(encoded) => serde_json::from_str(&encoded)
            .map_err(|err| ApiError::InvalidResponse(format!("data is not JSON: {err}")))?,
        other => other,
    };

    serde_json::from_value(payload).map_err(|err| ApiError::InvalidResponse(err.to_string()))
}

#[async_trait]
impl PlanPersistence for PlanApiClient {
    #[instrument(skip(self, payload), fields(plan_name = %payload.plan_name, days = payload.dates.len()))]
    async fn create_plan(&self, payload: &CreatePlanPayload) -> Result<PlanSnapshot> {
        let url = self.route(OP_CREATE_PLAN, &[]);
        let builder = self.http.request(Method::POST, &url).json(payload);

        // A retried create would mint a second plan.
        let snapshot: PlanSnapshot = self.fetch(OP_CREATE_PLAN, builder, false).await?;

        info!(plan_id = %snapshot.plan.id, "plan created");
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    async fn get_plan(&self, plan_id: &str) -> Result<PlanSnapshot> {
        let url = self.route(OP_GET_PLAN, &[plan_id]);
        let snapshot: PlanSnapshot =
            self.fetch(OP_GET_PLAN, self.http.request(Method::GET, &url), true).await?;
        debug!(
            dates = snapshot.dates.len(),
            activities = snapshot.activities.len(),
            "plan fetched"
        );
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    async fn add_date(&self, plan_id: &str, date: NaiveDate, created_by: &str) -> Result<()> {
        let url = self.route(OP_ADD_DATE, &[plan_id]);
        let body = json!({ "id": format_day(date), "createdBy": created_by });
        self.write(OP_ADD_DATE, self.http.request(Method::POST, &url).json(&body)).await
    }

    #[instrument(skip(self))]
    async fn delete_date(&self, plan_id: &str, date: NaiveDate, user: &str) -> Result<()> {
        let day = format_day(date);
        let url = self.route(OP_DELETE_DATE, &[plan_id, &day, user]);
        self.write(OP_DELETE_DATE, self.http.request(Method::DELETE, &url)).await
    }

    #[instrument(skip(self), fields(at = %at))]
    async fn add_activity(&self, plan_id: &str, at: ActivityRef, created_by: &str) -> Result<()> {
        let day = format_day(at.date);
        let url = self.route(OP_ADD_ACTIVITY, &[plan_id, &day]);
        let body = json!({ "id": at.key.value(), "createdBy": created_by });
        self.write(OP_ADD_ACTIVITY, self.http.request(Method::POST, &url).json(&body)).await
    }

    #[instrument(skip(self), fields(at = %at))]
    async fn delete_activity(&self, plan_id: &str, at: ActivityRef, user: &str) -> Result<()> {
        let day = format_day(at.date);
        let key = at.key.to_string();
        let url = self.route(OP_DELETE_ACTIVITY, &[plan_id, &day, &key, user]);
        self.write(OP_DELETE_ACTIVITY, self.http.request(Method::DELETE, &url)).await
    }

    #[instrument(skip(self, activity_text), fields(at = %at, chars = activity_text.chars().count()))]
    async fn update_activity(
        &self,
        plan_id: &str,
        at: ActivityRef,
        activity_text: &str,
        updated_by: &str,
        is_final: bool,
    ) -> Result<()> {
        let url = self.activity_route(OP_UPDATE_ACTIVITY, plan_id, at);
        let body = json!({
            "activityText": activity_text,
            "updatedBy": updated_by,
            "isFinal": is_final,
        });
        self.write(OP_UPDATE_ACTIVITY, self.http.request(Method::PATCH, &url).json(&body)).await
    }

    #[instrument(skip(self), fields(at = %at))]
    async fn lock_activity(&self, plan_id: &str, at: ActivityRef, locked_by: &str) -> Result<()> {
        let url = self.activity_route(OP_LOCK_ACTIVITY, plan_id, at);
        let body = json!({ "lockedBy": locked_by });
        self.write(OP_LOCK_ACTIVITY, self.http.request(Method::PATCH, &url).json(&body)).await
    }

    #[instrument(skip(self, up_voters, down_voters), fields(at = %at))]
    async fn vote_activity(
        &self,
        plan_id: &str,
        at: ActivityRef,
        up_voters: &BTreeSet<String>,
        down_voters: &BTreeSet<String>,
        voter: &str,
    ) -> Result<()> {
        let url = self.activity_route(OP_VOTE_ACTIVITY, plan_id, at);
        let body = json!({
            "upVoters": up_voters,
            "downVoters": down_voters,
            "voter": voter,
        });
        self.write(OP_VOTE_ACTIVITY, self.http.request(Method::PATCH, &url).json(&body)).await
    }

    #[instrument(skip(self))]
    async fn register_user(&self, plan_id: &str, connection_id: &str) -> Result<()> {
        let url = self.route(OP_REGISTER_USER, &[]);
        let builder = self
            .http
            .request(Method::GET, &url)
            .query(&[("planId", plan_id), ("connectionId", connection_id)]);
        self.write(OP_REGISTER_USER, builder).await
    }

    #[instrument(skip(self))]
    async fn negotiate(&self) -> Result<ConnectionInfo> {
        let url = self.route(OP_NEGOTIATE, &[]);
        self.fetch(OP_NEGOTIATE, self.http.request(Method::GET, &url), true).await
    }
}
