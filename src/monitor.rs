//! # Monitor Loop
//! Runs the aggregation engine on a fixed interval, keeps only incidents at
//! or above the session's minimum severity, and pushes them to a sink.
//!
//! States: `Idle → Running → Stopped(Duration | Cancelled)`. `Stopped` is
//! final: `run` on a stopped loop is an error; build a new session instead.
//!
//! Cancellation is observed before each cycle, while a cycle is in flight,
//! while the sink is emitting, and during the inter-cycle sleep.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::engine::{AggregationEngine, ClassifiedIncident};
use crate::notify::{IncidentBatch, IncidentSink};
use crate::severity::SeverityLevel;

/// Cooperative cancellation shared between the loop and whoever stops it.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called (immediately if it already was).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|c| *c).await;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSession {
    pub monitored_location: String,
    pub radius_miles: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub min_severity: SeverityLevel,
}

impl MonitorSession {
    pub fn new(
        monitored_location: &str,
        radius_miles: f64,
        min_severity: SeverityLevel,
    ) -> Result<Self> {
        let loc = monitored_location.trim();
        if loc.is_empty() {
            bail!("monitored location must not be empty");
        }
        if !radius_miles.is_finite() || radius_miles < 0.0 {
            bail!("radius_miles must be a non-negative number, got {radius_miles}");
        }
        Ok(Self {
            monitored_location: loc.to_string(),
            radius_miles,
            start_time: None,
            min_severity,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// `None` runs until cancelled.
    pub duration: Option<Duration>,
    pub neighbors: Vec<String>,
    pub sink_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5 * 60),
            duration: None,
            neighbors: Vec::new(),
            sink_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Duration,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Stopped(StopReason),
}

/// What one cycle produced, from the operator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    NoIncidents,
    BelowThreshold { found: usize },
    Emitted { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorReport {
    pub reason: StopReason,
    pub cycles: u64,
    pub emitted: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

pub struct MonitorLoop<S: IncidentSink> {
    session: MonitorSession,
    settings: MonitorSettings,
    engine: AggregationEngine,
    sink: S,
    state: MonitorState,
}

impl<S: IncidentSink> MonitorLoop<S> {
    pub fn new(
        session: MonitorSession,
        settings: MonitorSettings,
        engine: AggregationEngine,
        sink: S,
    ) -> Self {
        Self {
            session,
            settings,
            engine,
            sink,
            state: MonitorState::Idle,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn session(&self) -> &MonitorSession {
        &self.session
    }

    pub async fn run(&mut self, cancel: &CancelToken) -> Result<MonitorReport> {
        match self.state {
            MonitorState::Idle => {}
            MonitorState::Running => bail!("monitor loop is already running"),
            MonitorState::Stopped(reason) => {
                bail!("monitor loop already stopped ({reason:?}); start a new session")
            }
        }
        self.state = MonitorState::Running;
        let started_at = Utc::now();
        let started = Instant::now();
        self.session.start_time = Some(started_at);
        let threshold_index = self.session.min_severity.rank();

        tracing::info!(
            target: "monitor",
            location = %self.session.monitored_location,
            radius_miles = self.session.radius_miles,
            min_severity = %self.session.min_severity,
            threshold_index,
            interval_secs = self.settings.poll_interval.as_secs_f64(),
            duration_secs = ?self.settings.duration.map(|d| d.as_secs_f64()),
            "starting fire monitoring"
        );

        let mut cycles: u64 = 0;
        let mut emitted: u64 = 0;

        let reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if let Some(budget) = self.settings.duration {
                if started.elapsed() >= budget {
                    break StopReason::Duration;
                }
            }

            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                r = self.engine.run_cycle(
                    &self.session.monitored_location,
                    &self.settings.neighbors,
                    self.session.radius_miles,
                ) => r,
            };
            cycles += 1;
            counter!("monitor_cycles_total").increment(1);
            gauge!("monitor_last_cycle_ts").set(Utc::now().timestamp() as f64);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                o = self.deliver(results) => o,
            };
            if let CycleOutcome::Emitted { count } = outcome {
                emitted += count as u64;
            }

            // Never sleep past the duration budget.
            let nap = match self.settings.duration {
                Some(budget) => self
                    .settings
                    .poll_interval
                    .min(budget.saturating_sub(started.elapsed())),
                None => self.settings.poll_interval,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = tokio::time::sleep(nap) => {}
            }
        };

        self.state = MonitorState::Stopped(reason);
        let report = MonitorReport {
            reason,
            cycles,
            emitted,
            started_at,
            ended_at: Utc::now(),
        };
        match reason {
            StopReason::Cancelled => tracing::info!(target: "monitor", cycles, emitted, "monitoring stopped by user"),
            StopReason::Duration => tracing::info!(target: "monitor", cycles, emitted, "monitoring duration elapsed"),
        }
        Ok(report)
    }

    async fn deliver(&self, results: Vec<ClassifiedIncident>) -> CycleOutcome {
        if results.is_empty() {
            tracing::info!(target: "monitor", "no new fire incidents found");
            return CycleOutcome::NoIncidents;
        }
        let found = results.len();
        let filtered = filter_by_severity(results, self.session.min_severity);
        if filtered.is_empty() {
            tracing::info!(
                target: "monitor",
                found,
                min_severity = %self.session.min_severity,
                "no new incidents meeting minimum severity threshold"
            );
            return CycleOutcome::BelowThreshold { found };
        }

        let count = filtered.len();
        let batch = IncidentBatch {
            monitored_location: self.session.monitored_location.clone(),
            checked_at: Utc::now(),
            incidents: filtered,
        };
        match tokio::time::timeout(self.settings.sink_timeout, self.sink.emit(&batch)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(target: "monitor", sink = self.sink.name(), error = ?e, "sink emit failed")
            }
            Err(_) => tracing::warn!(
                target: "monitor",
                sink = self.sink.name(),
                timeout_secs = self.settings.sink_timeout.as_secs_f64(),
                "sink emit timed out"
            ),
        }
        counter!("monitor_emitted_total").increment(count as u64);
        tracing::info!(target: "monitor", count, "relevant fire incidents found");
        CycleOutcome::Emitted { count }
    }
}

/// Keep incidents at or above `min`, preserving order.
pub fn filter_by_severity(
    incidents: Vec<ClassifiedIncident>,
    min: SeverityLevel,
) -> Vec<ClassifiedIncident> {
    incidents
        .into_iter()
        .filter(|i| i.severity.meets(min))
        .collect()
}
