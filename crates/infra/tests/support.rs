//! Shared helpers for infra integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use plansync_core::{Notice, UserNotifier};
use plansync_domain::ApiConfig;
use plansync_infra::{HttpClient, PlanApiClient};
use serde_json::{json, Value};

pub const PLAN_ID: &str = "a1b2-c3";

/// Notifier that keeps every notice for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices lock").clone()
    }
}

impl UserNotifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notices lock").push(notice);
    }
}

pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig { base_url: base_url.to_string(), timeout_secs: 5, read_attempts: 3 }
}

/// Store client with fast retry backoff.
pub fn store_client(base_url: &str) -> PlanApiClient {
    let http = HttpClient::builder()
        .max_attempts(3)
        .base_backoff(Duration::from_millis(5))
        .build()
        .expect("http client");
    PlanApiClient::with_http(base_url, http, Duration::from_secs(5), 3).expect("store client")
}

/// `getPlan` body with one extra activity on the first day.
pub fn plan_body() -> Value {
    json!({
        "data": {
            "plan": { "id": PLAN_ID, "planName": "Lisbon", "createdBy": "alice" },
            "dates": [
                { "id": format!("{PLAN_ID}_2025-05-02"), "createdBy": "alice" },
                { "id": format!("{PLAN_ID}_2025-05-01"), "createdBy": "alice" }
            ],
            "activities": [
                { "id": format!("{PLAN_ID}_2025-05-01_0"), "createdBy": "alice", "activityText": "Tram 28" },
                { "id": format!("{PLAN_ID}_2025-05-01_1000"), "createdBy": "bob", "upVoters": ["bob"] },
                { "id": format!("{PLAN_ID}_2025-05-02_0"), "createdBy": "alice" }
            ]
        }
    })
}
