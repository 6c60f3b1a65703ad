//! Sinks: where ranked, threshold-filtered incidents go after each cycle.

pub mod console;
pub mod discord;
pub mod snapshot;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::engine::ClassifiedIncident;

/// One emission: the already-sorted incidents of a cycle plus context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentBatch {
    pub monitored_location: String,
    pub checked_at: DateTime<Utc>,
    pub incidents: Vec<ClassifiedIncident>,
}

#[async_trait::async_trait]
pub trait IncidentSink: Send + Sync {
    async fn emit(&self, batch: &IncidentBatch) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one batch out to several sinks. A failing sink is logged and the
/// rest still receive the batch.
#[derive(Default)]
pub struct SinkMux {
    sinks: Vec<Box<dyn IncidentSink>>,
}

impl SinkMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Box<dyn IncidentSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait::async_trait]
impl IncidentSink for SinkMux {
    async fn emit(&self, batch: &IncidentBatch) -> Result<()> {
        for s in &self.sinks {
            if let Err(e) = s.emit(batch).await {
                tracing::warn!(sink = s.name(), error = ?e, "sink emit failed");
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}

// --- Test helper ---
/// Keeps every batch it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<IncidentBatch>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn taken(&self) -> Vec<IncidentBatch> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl IncidentSink for RecordingSink {
    async fn emit(&self, batch: &IncidentBatch) -> Result<()> {
        if let Ok(mut b) = self.batches.lock() {
            b.push(batch.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[async_trait::async_trait]
impl<T: IncidentSink + ?Sized> IncidentSink for std::sync::Arc<T> {
    async fn emit(&self, batch: &IncidentBatch) -> Result<()> {
        (**self).emit(batch).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
