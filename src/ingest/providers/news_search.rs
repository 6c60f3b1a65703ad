// src/ingest/providers/news_search.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{AdapterKind, FetchQuery, IncidentRecord, SourceAdapter};
use crate::ingest::{normalize_text, parse_rfc2822, published_or_now};

pub const GOOGLE_NEWS_RSS_SEARCH: &str = "https://news.google.com/rss/search";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<Publisher>,
}

#[derive(Debug, Deserialize)]
struct Publisher {
    #[serde(rename = "$text", default)]
    name: Option<String>,
}

/// Google News search results for `"fire <location>"`, read from the RSS
/// rendition of the search page.
pub struct NewsSearchAdapter {
    mode: Mode,
}

enum Mode {
    /// Same document for every query; handy for tests.
    Fixture(String),
    Http {
        base_url: String,
        client: reqwest::Client,
    },
}

impl NewsSearchAdapter {
    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn google_news(client: reqwest::Client) -> Self {
        Self::with_base_url(GOOGLE_NEWS_RSS_SEARCH, client)
    }

    pub fn with_base_url(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                base_url: base_url.to_string(),
                client,
            },
        }
    }

    fn parse_items_from_str(s: &str, location: &str) -> Result<Vec<IncidentRecord>> {
        let t0 = std::time::Instant::now();
        let rss: Rss = from_str(s).context("parsing news search rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let publisher = it
                .source
                .and_then(|p| p.name)
                .map(|n| normalize_text(&n))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Google News".to_string());
            let title = strip_publisher_suffix(
                &normalize_text(it.title.as_deref().unwrap_or_default()),
                &publisher,
            );
            if title.is_empty() {
                continue;
            }
            out.push(IncidentRecord {
                title,
                source_name: publisher,
                published_at: published_or_now(it.pub_date.as_deref().and_then(parse_rfc2822)),
                link: it.link.unwrap_or_default().trim().to_string(),
                raw_text: normalize_text(it.description.as_deref().unwrap_or_default()),
                origin_location: location.to_string(),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("incidents_fetched_total").increment(out.len() as u64);
        Ok(out)
    }
}

/// Google News titles read "Headline - Publisher"; keep the headline.
fn strip_publisher_suffix(title: &str, publisher: &str) -> String {
    let suffix = format!(" - {publisher}");
    title
        .strip_suffix(suffix.as_str())
        .unwrap_or(title)
        .trim()
        .to_string()
}

#[async_trait]
impl SourceAdapter for NewsSearchAdapter {
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<IncidentRecord>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s, &query.location),
            Mode::Http { base_url, client } => {
                let terms = query.search_terms();
                let body = client
                    .get(base_url)
                    .query(&[
                        ("q", terms.as_str()),
                        ("hl", "en-US"),
                        ("gl", "US"),
                        ("ceid", "US:en"),
                    ])
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("news search GET for {terms:?}"))?
                    .text()
                    .await
                    .context("news search .text()")?;
                Self::parse_items_from_str(&body, &query.location)
            }
        }
    }

    fn name(&self) -> &str {
        "news-search"
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Search
    }
}
