use super::{IncidentBatch, IncidentSink};
use crate::engine::ClassifiedIncident;
use crate::severity::SeverityLevel;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Discord caps a webhook message at 10 embeds.
const MAX_EMBEDS: usize = 10;
/// Upper bound on attempts per message; keeps the backoff shift small.
const MAX_ATTEMPTS: u8 = 5;

/// Attempts and per-request timeout that fit one message into a time budget,
/// backoff sleeps included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPlan {
    pub attempts: u8,
    pub per_try: Duration,
}

impl RetryPlan {
    /// Drop attempts until their backoff leaves room for requests, then split
    /// what remains evenly between them.
    pub fn fit(budget: Duration, max_attempts: u8) -> Self {
        let mut attempts = max_attempts.clamp(1, MAX_ATTEMPTS);
        while attempts > 1 && backoff_total(attempts) >= budget {
            attempts -= 1;
        }
        let per_try = budget.saturating_sub(backoff_total(attempts)) / u32::from(attempts);
        Self { attempts, per_try }
    }

    /// Longest a message can take under this plan.
    pub fn worst_case(&self) -> Duration {
        self.per_try * u32::from(self.attempts) + backoff_total(self.attempts)
    }
}

/// Sleep after failed attempt `n` (1-based): 0.5s, 1s, 2s, ...
fn backoff(n: u8) -> Duration {
    Duration::from_millis(500u64 << (n - 1))
}

fn backoff_total(attempts: u8) -> Duration {
    (1..attempts).map(backoff).sum()
}

#[derive(Clone)]
pub struct DiscordSink {
    webhook: String,
    client: Client,
    budget: Duration,
    max_attempts: u8,
}

impl DiscordSink {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            budget: Duration::from_secs(10),
            max_attempts: 3,
        }
    }

    /// Whole-emit time budget; should match the monitor's sink timeout so
    /// the last retry is never cut off.
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    fn plan_for(&self, messages: usize) -> RetryPlan {
        let messages = u32::try_from(messages.max(1)).unwrap_or(u32::MAX);
        RetryPlan::fit(self.budget / messages, self.max_attempts)
    }

    async fn post(&self, payload: &DiscordWebhookPayload, plan: RetryPlan) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(plan.per_try)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord webhook request failed: {e}"),
            };
            if attempt >= plan.attempts {
                return Err(err);
            }
            tokio::time::sleep(backoff(attempt)).await;
        }
    }
}

#[async_trait::async_trait]
impl IncidentSink for DiscordSink {
    async fn emit(&self, batch: &IncidentBatch) -> Result<()> {
        let plan = self.plan_for(batch.incidents.len().div_ceil(MAX_EMBEDS));
        for chunk in batch.incidents.chunks(MAX_EMBEDS) {
            let payload = DiscordWebhookPayload {
                content: Some(format!(
                    "Fire incidents near {} ({} new)",
                    batch.monitored_location,
                    batch.incidents.len()
                )),
                embeds: chunk
                    .iter()
                    .map(|i| DiscordEmbed::from_incident(i, &batch.monitored_location))
                    .collect(),
            };
            self.post(&payload, plan).await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    color: u32,
    timestamp: String,
}

impl DiscordEmbed {
    fn from_incident(i: &ClassifiedIncident, monitored: &str) -> Self {
        let distance = match i.distance_miles {
            Some(d) => format!("{d:.1} mi from {monitored}"),
            None => "distance unknown".to_string(),
        };
        let description = format!(
            "**Severity:** {} ({:.0}%)\n**Location:** {} · {}\n**Source:** {}",
            i.severity.as_str().to_uppercase(),
            i.confidence * 100.0,
            i.record.origin_location,
            distance,
            i.record.source_name
        );
        Self {
            title: truncate(&i.record.title, 256),
            description,
            url: (!i.record.link.is_empty()).then(|| i.record.link.clone()),
            color: severity_color(i.severity),
            timestamp: i.record.published_at.to_rfc3339(),
        }
    }
}

fn severity_color(level: SeverityLevel) -> u32 {
    match level {
        SeverityLevel::Critical => 0xB71C1C,
        SeverityLevel::High => 0xE65100,
        SeverityLevel::Medium => 0xF9A825,
        SeverityLevel::Low => 0x2E7D32,
        SeverityLevel::Unknown => 0x607D8B,
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[derive(Debug, Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}
