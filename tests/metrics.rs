// tests/metrics.rs
// One test per binary: the Prometheus recorder is process-global.
mod common;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::engine_with;
use fire_incident_monitor::api::{self, AppState};
use fire_incident_monitor::ingest::providers::news_search::NewsSearchAdapter;
use fire_incident_monitor::metrics::Metrics;
use fire_incident_monitor::notify::snapshot::LatestIncidents;

#[tokio::test]
async fn metrics_endpoint_exposes_cycle_series() {
    let m = Metrics::install().expect("recorder installs once");

    let xml = std::fs::read_to_string("tests/fixtures/google_news_rss.xml").expect("fixture");
    let mut engine = engine_with(vec![Box::new(NewsSearchAdapter::from_fixture(&xml))]);
    let got = engine.run_cycle("Pasadena", &[], 50.0).await;
    assert_eq!(got.len(), 3);

    let app = api::create_router(AppState {
        latest: LatestIncidents::new(),
        metrics: Some(m.handle.clone()),
        monitored_location: "Pasadena".into(),
    });
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    for needle in [
        "incidents_fetched_total",
        "incidents_kept_total",
        "ingest_parse_ms",
        "cycle_duration_ms",
        "geo_cache_size",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
    assert!(m.render().contains("incidents_kept_total"));
}
