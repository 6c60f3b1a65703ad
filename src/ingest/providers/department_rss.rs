use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{AdapterKind, FetchQuery, IncidentRecord, SourceAdapter};
use crate::ingest::{normalize_text, parse_rfc2822, published_or_now};

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
}

/// RSS alert feed published by one city's fire department.
pub struct DepartmentFeedAdapter {
    city: String,
    source_name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl DepartmentFeedAdapter {
    pub fn from_fixture(city: &str, xml: &str) -> Self {
        Self::with_mode(city, Mode::Fixture(xml.to_string()))
    }

    pub fn from_url(city: &str, url: &str, client: reqwest::Client) -> Self {
        Self::with_mode(
            city,
            Mode::Http {
                url: url.to_string(),
                client,
            },
        )
    }

    fn with_mode(city: &str, mode: Mode) -> Self {
        Self {
            city: city.to_string(),
            source_name: format!("{city} Fire Department"),
            mode,
        }
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<IncidentRecord>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .with_context(|| format!("parsing {} rss xml", self.source_name))?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            out.push(IncidentRecord {
                title,
                source_name: self.source_name.clone(),
                published_at: published_or_now(it.pub_date.as_deref().and_then(parse_rfc2822)),
                link: it.link.unwrap_or_default().trim().to_string(),
                raw_text: normalize_text(it.description.as_deref().unwrap_or_default()),
                origin_location: self.city.clone(),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("incidents_fetched_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for DepartmentFeedAdapter {
    async fn fetch(&self, query: &FetchQuery) -> Result<Vec<IncidentRecord>> {
        // Bound to one city; anything else is simply not ours.
        if !query.location.eq_ignore_ascii_case(&self.city) {
            return Ok(Vec::new());
        }
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("department feed GET {url}"))?
                    .text()
                    .await
                    .context("department feed .text()")?;
                self.parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.source_name
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Department
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>LAFD Alerts</title>
<item>
  <title>Major Emergency Structure Fire&nbsp;- Boyle Heights</title>
  <link>https://lafd.test/alert/1</link>
  <pubDate>Wed, 08 Jan 2025 06:30:00 -0800</pubDate>
  <description>Multiple alarm response, no injuries reported</description>
</item>
<item>
  <title></title>
  <link>https://lafd.test/alert/2</link>
</item>
</channel></rss>"#;

    #[tokio::test]
    async fn answers_only_for_its_city() {
        let a = DepartmentFeedAdapter::from_fixture("Los Angeles", XML);
        let other = a.fetch(&FetchQuery::fire("Oakland")).await.unwrap();
        assert!(other.is_empty());

        let got = a.fetch(&FetchQuery::fire("los angeles")).await.unwrap();
        assert_eq!(got.len(), 1, "blank titles are skipped");
        assert_eq!(got[0].title, "Major Emergency Structure Fire - Boyle Heights");
        assert_eq!(got[0].source_name, "Los Angeles Fire Department");
        assert_eq!(got[0].origin_location, "Los Angeles");
        assert_eq!(got[0].published_at.to_rfc3339(), "2025-01-08T14:30:00+00:00");
    }

    #[tokio::test]
    async fn malformed_xml_is_an_error() {
        let a = DepartmentFeedAdapter::from_fixture("Los Angeles", "<rss><channel>");
        assert!(a.fetch(&FetchQuery::fire("Los Angeles")).await.is_err());
    }
}
