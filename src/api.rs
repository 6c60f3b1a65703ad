use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::engine::ClassifiedIncident;
use crate::notify::snapshot::LatestIncidents;

#[derive(Clone)]
pub struct AppState {
    pub latest: LatestIncidents,
    pub metrics: Option<PrometheusHandle>,
    pub monitored_location: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .route("/incidents", get(incidents))
        .with_state(state)
}

#[derive(Serialize)]
struct IncidentsResp {
    monitored_location: String,
    checked_at: Option<String>,
    count: usize,
    incidents: Vec<ClassifiedIncident>,
}

async fn incidents(State(state): State<AppState>) -> Json<IncidentsResp> {
    let resp = match state.latest.get() {
        Some(b) => IncidentsResp {
            monitored_location: b.monitored_location,
            checked_at: Some(b.checked_at.to_rfc3339()),
            count: b.incidents.len(),
            incidents: b.incidents,
        },
        None => IncidentsResp {
            monitored_location: state.monitored_location.clone(),
            checked_at: None,
            count: 0,
            incidents: Vec::new(),
        },
    };
    Json(resp)
}

async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match &state.metrics {
        Some(h) => (StatusCode::OK, h.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
