use anyhow::Result;
use std::sync::{Arc, RwLock};

use super::{IncidentBatch, IncidentSink};

/// Holds the most recent batch for the `/incidents` route.
#[derive(Clone, Default)]
pub struct LatestIncidents {
    inner: Arc<RwLock<Option<IncidentBatch>>>,
}

impl LatestIncidents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<IncidentBatch> {
        self.inner.read().ok().and_then(|g| g.clone())
    }
}

#[async_trait::async_trait]
impl IncidentSink for LatestIncidents {
    async fn emit(&self, batch: &IncidentBatch) -> Result<()> {
        if let Ok(mut g) = self.inner.write() {
            *g = Some(batch.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "snapshot"
    }
}
