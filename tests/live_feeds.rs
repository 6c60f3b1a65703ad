// tests/live_feeds.rs
// Hits real services; run with `--features live-http`.
#![cfg(feature = "live-http")]

use fire_incident_monitor::config::MonitorConfig;
use fire_incident_monitor::geo::{GeoResolver, NominatimGeocoder};
use fire_incident_monitor::http_client;
use fire_incident_monitor::ingest::providers::news_search::NewsSearchAdapter;
use fire_incident_monitor::ingest::types::{FetchQuery, SourceAdapter};

#[tokio::test]
async fn google_news_search_answers() {
    let client = http_client(&MonitorConfig::default()).unwrap();
    let recs = NewsSearchAdapter::google_news(client)
        .fetch(&FetchQuery::fire("Los Angeles"))
        .await
        .expect("live fetch");
    assert!(recs.iter().all(|r| !r.title.is_empty()));
}

#[tokio::test]
async fn nominatim_resolves_a_known_city() {
    let client = http_client(&MonitorConfig::default()).unwrap();
    let geo = GeoResolver::new(Box::new(NominatimGeocoder::new(client)));
    let d = geo.distance("Los Angeles", "Pasadena").await.expect("both resolve");
    assert!(d > 5.0 && d < 15.0, "got {d}");
}
