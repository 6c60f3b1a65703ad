// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod geo;
pub mod ingest;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod severity;

// ---- Re-exports for stable public API ----
pub use crate::engine::{AggregationEngine, ClassifiedIncident};
pub use crate::monitor::{CancelToken, MonitorLoop, MonitorReport, MonitorSession, StopReason};
pub use crate::severity::{SeverityClassifier, SeverityLevel};

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::MonitorConfig;
use crate::geo::{GeoResolver, NominatimGeocoder};
use crate::ingest::providers::{
    department_rss::DepartmentFeedAdapter, news_search::NewsSearchAdapter,
    reddit::RedditSearchAdapter,
};

/// Shared HTTP client for adapters and the geocoder.
pub fn http_client(cfg: &MonitorConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(Duration::from_secs(20))
        .build()
        .context("building http client")
}

/// Wire an engine from configuration: the department feed for the monitored
/// city (if any), the enabled search adapters, and the Nominatim geocoder.
pub fn build_engine(cfg: &MonitorConfig, client: reqwest::Client) -> AggregationEngine {
    let geo = GeoResolver::new(Box::new(NominatimGeocoder::new(client.clone())));
    let mut engine = AggregationEngine::new(geo, SeverityClassifier::new());

    if let Some((city, url)) = cfg.department_feed() {
        engine.add_adapter(Box::new(DepartmentFeedAdapter::from_url(
            city,
            url,
            client.clone(),
        )));
    }
    if cfg.sources.news_search {
        engine.add_adapter(Box::new(NewsSearchAdapter::google_news(client.clone())));
    }
    if cfg.sources.reddit {
        engine.add_adapter(Box::new(RedditSearchAdapter::public(client)));
    }

    tracing::info!(adapters = ?engine.adapter_names(), "engine wired");
    engine
}
