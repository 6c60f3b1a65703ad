use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "incidents_fetched_total",
            "Records parsed from source adapters."
        );
        describe_counter!(
            "incidents_kept_total",
            "Records surfaced by a cycle after dedup and radius filtering."
        );
        describe_counter!(
            "incidents_dedup_total",
            "Records dropped because they were already surfaced."
        );
        describe_counter!(
            "incidents_out_of_radius_total",
            "Search records dropped for lying outside the radius."
        );
        describe_counter!("adapter_errors_total", "Adapter fetch/parse errors.");
        describe_counter!(
            "geocode_failures_total",
            "Geocoding lookups that errored or found nothing."
        );
        describe_counter!("monitor_cycles_total", "Completed monitor cycles.");
        describe_counter!(
            "monitor_emitted_total",
            "Incidents pushed to the sink after the severity threshold."
        );
        describe_histogram!("ingest_parse_ms", "Adapter parse time in milliseconds.");
        describe_histogram!("cycle_duration_ms", "Aggregation cycle time in milliseconds.");
        describe_gauge!(
            "monitor_last_cycle_ts",
            "Unix ts when the monitor last completed a cycle."
        );
        describe_gauge!("geo_cache_size", "Places held in the geocoding cache.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once per process.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}
