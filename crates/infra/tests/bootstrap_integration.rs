//! Session bootstrap up to the point where the hub is needed.

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use chrono::NaiveDate;
use plansync_core::Notice;
use plansync_domain::{LoggingConfig, PlanRequest, PlanSyncConfig, PlanSyncError, SessionConfig};
use plansync_infra::{load_plan, PlanSyncClient};
use serde_json::json;
use support::{api_config, plan_body, store_client, RecordingNotifier, PLAN_ID};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn config(base_url: &str) -> PlanSyncConfig {
    PlanSyncConfig {
        api: api_config(base_url),
        session: SessionConfig::new("configured-user"),
        logging: LoggingConfig::default(),
    }
}

#[tokio::test]
async fn join_loads_the_plan_by_invite_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/getPlan/{PLAN_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(plan_body()))
        .expect(1)
        .mount(&server)
        .await;

    let request =
        PlanRequest::Join { user_name: "bob".into(), invite_code: format!(" {PLAN_ID} ") };
    let plan = load_plan(&store_client(&server.uri()), &request).await.unwrap();

    assert_eq!(plan.metadata.id, PLAN_ID);
    assert_eq!(plan.days().count(), 2);
}

#[tokio::test]
async fn joining_a_plan_without_dates_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/getPlan/{PLAN_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "plan": { "id": PLAN_ID, "planName": "Empty", "createdBy": "alice" },
                "dates": [],
                "activities": []
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = PlanRequest::Join { user_name: "bob".into(), invite_code: PLAN_ID.into() };
    let err = load_plan(&store_client(&server.uri()), &request).await.unwrap_err();

    assert_eq!(err, PlanSyncError::NotFound(format!("Plan {PLAN_ID} has no dates")));
}

#[tokio::test]
async fn create_seeds_every_day_when_the_store_echoes_no_dates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/createPlan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "plan": { "id": "fresh", "planName": "Alps", "createdBy": "alice" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = PlanRequest::Create {
        user_name: "alice".into(),
        plan_name: "Alps".into(),
        start_date: day("2025-02-27"),
        end_date: day("2025-03-02"),
    };
    let plan = load_plan(&store_client(&server.uri()), &request).await.unwrap();

    let days: Vec<_> = plan.days().collect();
    assert_eq!(
        days,
        vec![day("2025-02-27"), day("2025-02-28"), day("2025-03-01"), day("2025-03-02")]
    );
    assert!(plan.dates.iter().all(|date| date.activities.len() == 1 && date.created_by == "alice"));
}

#[tokio::test]
async fn invalid_request_never_reaches_the_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let request = PlanRequest::Create {
        user_name: "alice".into(),
        plan_name: "Backwards".into(),
        start_date: day("2025-03-02"),
        end_date: day("2025-03-01"),
    };
    let notifier = RecordingNotifier::shared();
    let err = PlanSyncClient::open(&config(&server.uri()), request, notifier.clone())
        .await
        .err()
        .expect("rejected");

    assert_eq!(err, PlanSyncError::InvalidInput("End date cannot be before start date!".into()));
    assert!(notifier.notices().is_empty());
}

#[tokio::test]
async fn unreachable_hub_fails_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/getPlan/{PLAN_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(plan_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/negotiate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "url": format!("{}/hub", server.uri()), "accessToken": "jwt" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/hub/negotiate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/registerUser"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let request = PlanRequest::Join { user_name: "bob".into(), invite_code: PLAN_ID.into() };
    let notifier = RecordingNotifier::shared();
    let err = PlanSyncClient::open(&config(&server.uri()), request, notifier.clone())
        .await
        .err()
        .expect("transport failure");

    assert!(matches!(err, PlanSyncError::Transport(_)), "got {err:?}");
    assert!(matches!(notifier.notices().as_slice(), [Notice::Fatal(_)]));
}
