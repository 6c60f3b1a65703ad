// tests/api_http.rs
//
// HTTP-level tests for the status Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

mod common;

use axum::{
    body::{self, Body},
    Router,
};
use http::{Request, StatusCode};
use chrono::Utc;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use common::{at, record};
use fire_incident_monitor::api::{self, AppState};
use fire_incident_monitor::notify::snapshot::LatestIncidents;
use fire_incident_monitor::notify::{IncidentBatch, IncidentSink};
use fire_incident_monitor::{ClassifiedIncident, SeverityLevel};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router(latest: LatestIncidents) -> Router {
    api::create_router(AppState {
        latest,
        metrics: None,
        monitored_location: "Los Angeles".into(),
    })
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn healthz_returns_ok() {
    let (status, body) = get(test_router(LatestIncidents::new()), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "ok");
}

#[tokio::test]
async fn incidents_is_empty_before_the_first_emission() {
    let (status, body) = get(test_router(LatestIncidents::new()), "/incidents").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["monitored_location"], "Los Angeles");
    assert!(v["checked_at"].is_null());
    assert_eq!(v["count"], 0);
    assert_eq!(v["incidents"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn incidents_serves_the_latest_batch() {
    let latest = LatestIncidents::new();
    let batch = IncidentBatch {
        monitored_location: "Los Angeles".into(),
        checked_at: Utc::now(),
        incidents: vec![ClassifiedIncident {
            record: record("Massive wildfire forces evacuation", "KTLA", "Los Angeles", at(8, 0)),
            severity: SeverityLevel::Critical,
            confidence: 0.22,
            distance_miles: Some(0.0),
        }],
    };
    latest.emit(&batch).await.unwrap();

    let (status, body) = get(test_router(latest), "/incidents").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["count"], 1);
    assert!(v["checked_at"].is_string());
    let first = &v["incidents"][0];
    // record fields are flattened next to the classification
    assert_eq!(first["title"], "Massive wildfire forces evacuation");
    assert_eq!(first["source_name"], "KTLA");
    assert_eq!(first["severity"], "critical");
    assert_eq!(first["distance_miles"], 0.0);
}

#[tokio::test]
async fn metrics_without_recorder_is_503() {
    let (status, body) = get(test_router(LatestIncidents::new()), "/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(String::from_utf8(body).unwrap().contains("not installed"));
}
