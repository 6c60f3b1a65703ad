use anyhow::Result;
use std::fmt::Write as _;

use super::{IncidentBatch, IncidentSink};

/// Operator-facing plain-text report on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

/// Render a batch the way the operator reads it: one block per incident.
pub fn render_report(batch: &IncidentBatch) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Found {} relevant fire incidents ({}):",
        batch.incidents.len(),
        batch.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for inc in &batch.incidents {
        let r = &inc.record;
        let _ = writeln!(out);
        let _ = writeln!(out, "Title: {}", r.title);
        let _ = writeln!(out, "Location: {}", r.origin_location);
        if let Some(d) = inc.distance_miles {
            let _ = writeln!(out, "Distance: {d:.1} miles from {}", batch.monitored_location);
        }
        let _ = writeln!(
            out,
            "Severity: {} (Confidence: {:.2})",
            inc.severity.as_str().to_uppercase(),
            inc.confidence
        );
        let _ = writeln!(out, "Source: {}", r.source_name);
        let _ = writeln!(out, "Date: {}", r.published_at.to_rfc3339());
        if !r.link.is_empty() {
            let _ = writeln!(out, "Link: {}", r.link);
        }
        let _ = writeln!(out, "{}", "-".repeat(80));
    }
    out
}

#[async_trait::async_trait]
impl IncidentSink for ConsoleSink {
    async fn emit(&self, batch: &IncidentBatch) -> Result<()> {
        println!("{}", render_report(batch));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
