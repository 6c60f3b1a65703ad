//! Fire Incident Monitor: Binary Entrypoint
//! Loads configuration, wires adapters, sinks, and the optional status
//! server, then runs the monitor loop until Ctrl-C or the duration budget.

use anyhow::{Context, Result};
use fire_incident_monitor::{
    api::{self, AppState},
    build_engine,
    config::MonitorConfig,
    geo::{Coordinates, GeoResolver, NominatimGeocoder, UNKNOWN_PLACE},
    http_client,
    metrics::Metrics,
    notify::{
        console::ConsoleSink, discord::DiscordSink, snapshot::LatestIncidents, SinkMux,
    },
    CancelToken, MonitorLoop,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fire_incident_monitor=info,monitor=info,engine=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut cfg = MonitorConfig::load().context("loading monitor configuration")?;
    let client = http_client(&cfg)?;

    // "lat,lon" monitored locations are turned into the nearest city name.
    if let Some(at) = Coordinates::parse_pair(&cfg.monitored_location) {
        let resolver = GeoResolver::new(Box::new(NominatimGeocoder::new(client.clone())));
        let city = resolver.closest_place(at).await;
        if city != UNKNOWN_PLACE {
            tracing::info!(lat = at.lat, lon = at.lon, %city, "resolved monitored coordinates");
            cfg.monitored_location = city;
        }
    }

    let metrics = match Metrics::install() {
        Ok(m) => Some(m.handle),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics disabled");
            None
        }
    };

    let session = cfg.session()?;
    let settings = cfg.settings()?;
    let engine = build_engine(&cfg, client);

    let latest = LatestIncidents::new();
    let mut sink = SinkMux::new()
        .with(Box::new(ConsoleSink::new()))
        .with(Box::new(latest.clone()));
    if let Some(url) = cfg.discord_webhook.clone() {
        sink = sink.with(Box::new(
            DiscordSink::new(url).with_budget(settings.sink_timeout),
        ));
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping");
                cancel.cancel();
            }
        });
    }

    if let Some(addr) = cfg.http_addr.clone() {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding status server on {addr}"))?;
        let app = api::create_router(AppState {
            latest,
            metrics,
            monitored_location: session.monitored_location.clone(),
        });
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = served {
                tracing::warn!(error = ?e, "status server stopped");
            }
        });
        tracing::info!(%addr, "status server listening");
    }

    println!(
        "Starting fire monitoring for {} and surrounding {} mile radius",
        session.monitored_location, session.radius_miles
    );
    println!("Minimum severity level: {}", session.min_severity);
    println!("Press Ctrl+C to stop monitoring");

    let mut monitor = MonitorLoop::new(session, settings, engine, sink);
    let report = monitor.run(&cancel).await?;
    // Let the status server wind down with the loop.
    cancel.cancel();

    println!(
        "Monitoring session ended ({:?}, {} cycles, {} incidents reported)",
        report.reason, report.cycles, report.emitted
    );
    Ok(())
}
