// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

/// One raw incident report as produced by a source adapter.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct IncidentRecord {
    pub title: String,
    pub source_name: String, // e.g. "Los Angeles Fire Department", "KTLA"
    pub published_at: DateTime<Utc>,
    pub link: String,
    pub raw_text: String, // normalized body/description, may be empty
    pub origin_location: String,
}

impl IncidentRecord {
    /// Text the classifier scores: title plus body.
    pub fn classification_text(&self) -> String {
        if self.raw_text.is_empty() {
            self.title.clone()
        } else {
            format!("{}. {}", self.title, self.raw_text)
        }
    }
}

/// How the engine drives an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Authoritative feed bound to the monitored location; asked once per
    /// cycle and never geo-filtered.
    Department,
    /// Search surface; asked once per location (monitored + neighbors).
    Search,
}

/// What an adapter is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    pub topic: String,
    pub location: String,
}

impl FetchQuery {
    pub fn fire(location: &str) -> Self {
        Self {
            topic: "fire".to_string(),
            location: location.to_string(),
        }
    }

    /// Free-text search terms, e.g. `"fire Pasadena"`.
    pub fn search_terms(&self) -> String {
        format!("{} {}", self.topic, self.location)
    }
}

#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<IncidentRecord>>;
    fn name(&self) -> &str;
    fn kind(&self) -> AdapterKind;
}
