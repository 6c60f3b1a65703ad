// tests/common/mod.rs
// Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fire_incident_monitor::geo::{Coordinates, GeoResolver, Geocoder, StaticGeocoder};
use fire_incident_monitor::ingest::types::{AdapterKind, FetchQuery, IncidentRecord, SourceAdapter};
use fire_incident_monitor::notify::{IncidentBatch, IncidentSink, RecordingSink};
use fire_incident_monitor::{AggregationEngine, CancelToken, SeverityClassifier};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 8, hour, minute, 0).unwrap()
}

pub fn record(title: &str, source: &str, origin: &str, published_at: DateTime<Utc>) -> IncidentRecord {
    IncidentRecord {
        title: title.to_string(),
        source_name: source.to_string(),
        published_at,
        link: format!("https://news.test/{}", title.len()),
        raw_text: String::new(),
        origin_location: origin.to_string(),
    }
}

/// LA basin gazetteer plus Bakersfield (~101 mi from LA).
pub fn gazetteer() -> StaticGeocoder {
    StaticGeocoder::california().with_place("Bakersfield", 35.3733, -119.0187)
}

pub fn engine_with(adapters: Vec<Box<dyn SourceAdapter>>) -> AggregationEngine {
    let mut e = AggregationEngine::new(
        GeoResolver::new(Box::new(gazetteer())),
        SeverityClassifier::new(),
    );
    for a in adapters {
        e.add_adapter(a);
    }
    e
}

/// Returns canned records per queried location (case-insensitive).
pub struct ScriptedAdapter {
    name: String,
    kind: AdapterKind,
    by_location: HashMap<String, Vec<IncidentRecord>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedAdapter {
    pub fn search(name: &str) -> Self {
        Self::new(name, AdapterKind::Search)
    }

    pub fn department(name: &str) -> Self {
        Self::new(name, AdapterKind::Department)
    }

    fn new(name: &str, kind: AdapterKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            by_location: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn on(mut self, location: &str, records: Vec<IncidentRecord>) -> Self {
        self.by_location
            .entry(location.to_lowercase())
            .or_default()
            .extend(records);
        self
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<IncidentRecord>> {
        self.calls.lock().unwrap().push(query.location.clone());
        Ok(self
            .by_location
            .get(&query.location.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AdapterKind {
        self.kind
    }
}

pub struct BrokenAdapter(pub AdapterKind);

#[async_trait]
impl SourceAdapter for BrokenAdapter {
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<IncidentRecord>> {
        Err(anyhow!("connection reset while fetching {}", query.location))
    }

    fn name(&self) -> &str {
        "broken"
    }

    fn kind(&self) -> AdapterKind {
        self.0
    }
}

/// Never answers; used to cancel a cycle in flight.
pub struct HangingAdapter;

#[async_trait]
impl SourceAdapter for HangingAdapter {
    async fn fetch(&self, _query: &FetchQuery) -> Result<Vec<IncidentRecord>> {
        std::future::pending::<()>().await;
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "hanging"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Search
    }
}

/// Counts collaborator calls; fails the first `fail_first` of them.
pub struct CountingGeocoder {
    inner: StaticGeocoder,
    pub calls: Arc<AtomicUsize>,
    fail_first: usize,
}

impl CountingGeocoder {
    pub fn new(inner: StaticGeocoder, fail_first: usize) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
            fail_first,
        }
    }
}

#[async_trait]
impl Geocoder for CountingGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(anyhow!("503 from geocoder"));
        }
        self.inner.geocode(place).await
    }

    async fn reverse_geocode(&self, at: Coordinates) -> Result<String> {
        self.inner.reverse_geocode(at).await
    }
}

/// Records the batch, then asks the loop to stop.
pub struct CancelOnEmit {
    pub inner: Arc<RecordingSink>,
    pub cancel: CancelToken,
}

#[async_trait]
impl IncidentSink for CancelOnEmit {
    async fn emit(&self, batch: &IncidentBatch) -> Result<()> {
        self.inner.emit(batch).await?;
        self.cancel.cancel();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "cancel-on-emit"
    }
}

/// A sink that never completes.
pub struct StuckSink;

#[async_trait]
impl IncidentSink for StuckSink {
    async fn emit(&self, _batch: &IncidentBatch) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stuck"
    }
}
