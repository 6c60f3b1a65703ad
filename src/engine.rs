//! # Aggregation Engine
//! One polling cycle: pull every adapter, drop records already surfaced,
//! attach distance from the monitored location, classify severity, and
//! return a deterministically ranked result set.
//!
//! Policy:
//! - Department feeds are authoritative for the monitored location and are
//!   never radius-filtered.
//! - Search records are excluded only when their distance is known *and*
//!   exceeds the radius. Unknown distance is kept.
//! - One failing adapter is logged and skipped; it never aborts the cycle.
//!
//! Dedup state is only touched after every await point, so dropping a
//! cycle mid-flight (cancellation) leaves the seen-set unchanged.

use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use crate::dedup::Deduplicator;
use crate::geo::GeoResolver;
use crate::ingest::types::{AdapterKind, FetchQuery, IncidentRecord, SourceAdapter};
use crate::metrics::ensure_metrics_described;
use crate::severity::{SeverityClassifier, SeverityLevel};

/// A record after classification; immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedIncident {
    #[serde(flatten)]
    pub record: IncidentRecord,
    pub severity: SeverityLevel,
    pub confidence: f32,
    pub distance_miles: Option<f64>,
}

/// Most severe first, then newest first. Stable: full ties keep arrival order.
pub fn rank(incidents: &mut [ClassifiedIncident]) {
    incidents.sort_by_key(|i| (i.severity, Reverse(i.record.published_at)));
}

/// `{monitored} ∪ neighbors`, case-insensitively de-duplicated, monitored first.
pub fn location_set(monitored: &str, neighbors: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(neighbors.len() + 1);
    for loc in std::iter::once(monitored).chain(neighbors.iter().map(String::as_str)) {
        let loc = loc.trim();
        if loc.is_empty() || out.iter().any(|l| l.eq_ignore_ascii_case(loc)) {
            continue;
        }
        out.push(loc.to_string());
    }
    out
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub fetched: usize,
    pub adapter_errors: usize,
    pub duplicates: usize,
    pub out_of_radius: usize,
    pub kept: usize,
}

struct Pulled {
    record: IncidentRecord,
    geo_filtered: bool,
}

pub struct AggregationEngine {
    adapters: Vec<Box<dyn SourceAdapter>>,
    geo: GeoResolver,
    classifier: SeverityClassifier,
    dedup: Deduplicator,
    last_stats: CycleStats,
}

impl AggregationEngine {
    pub fn new(geo: GeoResolver, classifier: SeverityClassifier) -> Self {
        Self {
            adapters: Vec::new(),
            geo,
            classifier,
            dedup: Deduplicator::new(),
            last_stats: CycleStats::default(),
        }
    }

    pub fn add_adapter(&mut self, adapter: Box<dyn SourceAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn last_stats(&self) -> CycleStats {
        self.last_stats
    }

    /// Run one cycle. An empty result is a normal outcome.
    pub async fn run_cycle(
        &mut self,
        monitored_location: &str,
        neighbor_locations: &[String],
        radius_miles: f64,
    ) -> Vec<ClassifiedIncident> {
        ensure_metrics_described();
        let t0 = std::time::Instant::now();
        let mut stats = CycleStats::default();

        let pulled = self
            .pull_all(monitored_location, neighbor_locations, &mut stats)
            .await;
        stats.fetched = pulled.len();

        // Distance + classification; may await on the geocoder.
        let mut candidates = Vec::with_capacity(pulled.len());
        for Pulled {
            record,
            geo_filtered,
        } in pulled
        {
            if self.dedup.has_seen(&record) {
                stats.duplicates += 1;
                continue;
            }
            let distance = self
                .geo
                .distance(monitored_location, &record.origin_location)
                .await;
            if geo_filtered && distance.is_some_and(|d| d > radius_miles) {
                stats.out_of_radius += 1;
                tracing::debug!(
                    target: "engine",
                    title = %record.title,
                    origin = %record.origin_location,
                    distance = ?distance,
                    "outside radius"
                );
                continue;
            }
            let c = self.classifier.classify(&record.classification_text());
            candidates.push(ClassifiedIncident {
                record,
                severity: c.level,
                confidence: c.confidence,
                distance_miles: distance,
            });
        }

        // No awaits past this point.
        let mut out: Vec<ClassifiedIncident> = candidates
            .into_iter()
            .filter(|c| {
                let fresh = self.dedup.is_new(&c.record);
                if !fresh {
                    stats.duplicates += 1;
                }
                fresh
            })
            .collect();
        rank(&mut out);
        stats.kept = out.len();
        self.last_stats = stats;

        counter!("incidents_kept_total").increment(stats.kept as u64);
        counter!("incidents_dedup_total").increment(stats.duplicates as u64);
        counter!("incidents_out_of_radius_total").increment(stats.out_of_radius as u64);
        histogram!("cycle_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!("geo_cache_size").set(self.geo.cache_len() as f64);

        tracing::info!(
            target: "engine",
            location = monitored_location,
            fetched = stats.fetched,
            kept = stats.kept,
            duplicates = stats.duplicates,
            out_of_radius = stats.out_of_radius,
            adapter_errors = stats.adapter_errors,
            "cycle complete"
        );
        out
    }

    async fn pull_all(
        &self,
        monitored_location: &str,
        neighbor_locations: &[String],
        stats: &mut CycleStats,
    ) -> Vec<Pulled> {
        let mut raw = Vec::new();

        let home = FetchQuery::fire(monitored_location);
        for a in self.adapters.iter().filter(|a| a.kind() == AdapterKind::Department) {
            for record in pull(a.as_ref(), &home, stats).await {
                raw.push(Pulled {
                    record,
                    geo_filtered: false,
                });
            }
        }

        for loc in location_set(monitored_location, neighbor_locations) {
            let q = FetchQuery::fire(&loc);
            for a in self.adapters.iter().filter(|a| a.kind() == AdapterKind::Search) {
                for record in pull(a.as_ref(), &q, stats).await {
                    raw.push(Pulled {
                        record,
                        geo_filtered: true,
                    });
                }
            }
        }
        raw
    }
}

async fn pull(
    adapter: &dyn SourceAdapter,
    query: &FetchQuery,
    stats: &mut CycleStats,
) -> Vec<IncidentRecord> {
    match adapter.fetch(query).await {
        Ok(v) => v,
        Err(e) => {
            stats.adapter_errors += 1;
            tracing::warn!(
                target: "engine",
                adapter = adapter.name(),
                location = %query.location,
                error = ?e,
                "adapter error; continuing without it"
            );
            counter!("adapter_errors_total", "adapter" => adapter.name().to_string()).increment(1);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn inc(title: &str, sev: SeverityLevel, hour: u32) -> ClassifiedIncident {
        ClassifiedIncident {
            record: IncidentRecord {
                title: title.into(),
                source_name: "test".into(),
                published_at: Utc.with_ymd_and_hms(2025, 1, 8, hour, 0, 0).unwrap(),
                link: String::new(),
                raw_text: String::new(),
                origin_location: "Los Angeles".into(),
            },
            severity: sev,
            confidence: 0.5,
            distance_miles: None,
        }
    }

    #[test]
    fn rank_orders_by_severity_then_newest_and_is_stable() {
        let mut v = vec![
            inc("low-old", SeverityLevel::Low, 1),
            inc("unknown", SeverityLevel::Unknown, 9),
            inc("crit-old", SeverityLevel::Critical, 2),
            inc("tie-a", SeverityLevel::High, 5),
            inc("crit-new", SeverityLevel::Critical, 7),
            inc("tie-b", SeverityLevel::High, 5),
        ];
        rank(&mut v);
        let titles: Vec<_> = v.iter().map(|i| i.record.title.as_str()).collect();
        assert_eq!(
            titles,
            ["crit-new", "crit-old", "tie-a", "tie-b", "low-old", "unknown"]
        );
    }

    #[test]
    fn location_set_dedups_case_insensitively() {
        let n = vec!["Pasadena".to_string(), "los angeles".into(), " ".into(), "pasadena".into()];
        assert_eq!(location_set("Los Angeles", &n), ["Los Angeles", "Pasadena"]);
    }
}
