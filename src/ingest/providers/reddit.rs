// src/ingest/providers/reddit.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::ingest::types::{AdapterKind, FetchQuery, IncidentRecord, SourceAdapter};
use crate::ingest::{normalize_text, published_or_now};

pub const REDDIT_SEARCH_URL: &str = "https://www.reddit.com/search.json";
const REDDIT_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    subreddit: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    created_utc: Option<f64>,
}

/// City-scoped search over public Reddit posts (no OAuth).
pub struct RedditSearchAdapter {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RedditSearchAdapter {
    pub fn from_fixture(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
        }
    }

    pub fn public(client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                url: REDDIT_SEARCH_URL.to_string(),
                client,
            },
        }
    }

    fn parse_listing(s: &str, location: &str) -> Result<Vec<IncidentRecord>> {
        let t0 = std::time::Instant::now();
        let listing: Listing = serde_json::from_str(s).context("parsing reddit search json")?;

        let mut out = Vec::with_capacity(listing.data.children.len());
        for Child { data: post } in listing.data.children {
            let title = normalize_text(&post.title);
            if title.is_empty() {
                continue;
            }
            let source_name = match post.subreddit.as_deref() {
                Some(sub) if !sub.is_empty() => format!("Reddit r/{sub}"),
                _ => "Reddit".to_string(),
            };
            let link = match (post.permalink, post.url) {
                (Some(p), _) if p.starts_with('/') => format!("{REDDIT_BASE}{p}"),
                (Some(p), _) => p,
                (None, Some(u)) => u,
                (None, None) => String::new(),
            };
            let published = post
                .created_utc
                .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single());

            out.push(IncidentRecord {
                title,
                source_name,
                published_at: published_or_now(published),
                link,
                raw_text: normalize_text(&post.selftext),
                origin_location: location.to_string(),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("incidents_fetched_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for RedditSearchAdapter {
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<IncidentRecord>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_listing(s, &query.location),
            Mode::Http { url, client } => {
                let terms = query.search_terms();
                let body = client
                    .get(url)
                    .query(&[("q", terms.as_str()), ("sort", "new"), ("limit", "50")])
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("reddit search GET for {terms:?}"))?
                    .text()
                    .await
                    .context("reddit search .text()")?;
                Self::parse_listing(&body, &query.location)
            }
        }
    }

    fn name(&self) -> &str {
        "reddit-search"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Search
    }
}
