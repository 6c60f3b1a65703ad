// src/config.rs
//! Operator configuration.
//!
//! Lookup order: explicit path, `$FIRE_MONITOR_CONFIG`, `config/monitor.toml`,
//! `config/monitor.json`, built-in defaults. Environment overrides are applied
//! on top, then everything is validated before the monitor starts.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::monitor::{MonitorSession, MonitorSettings};
use crate::severity::SeverityLevel;

pub const ENV_CONFIG_PATH: &str = "FIRE_MONITOR_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/monitor.toml";
pub const DEFAULT_JSON_PATH: &str = "config/monitor.json";

pub const DEFAULT_USER_AGENT: &str = "fire-incident-monitor/0.1 (+https://github.com/)";

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

fn default_location() -> String {
    "Los Angeles".to_string()
}
fn default_radius() -> f64 {
    50.0
}
fn default_interval() -> f64 {
    5.0
}
fn default_min_severity() -> String {
    "low".to_string()
}
fn default_sink_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_true() -> bool {
    true
}


/// Built-in neighbor table; case-insensitive on the city name.
pub fn default_neighbors(city: &str) -> Vec<String> {
    let table: [(&str, [&str; 3]); 2] = [
        ("San Francisco", ["Oakland", "San Jose", "Berkeley"]),
        ("Los Angeles", ["Long Beach", "Pasadena", "Glendale"]),
    ];
    table
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(city.trim()))
        .map(|(_, n)| n.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesCfg {
    #[serde(default = "default_true")]
    pub news_search: bool,
    #[serde(default)]
    pub reddit: bool,
}

impl Default for SourcesCfg {
    fn default() -> Self {
        Self {
            news_search: true,
            reddit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_location")]
    pub monitored_location: String,
    #[serde(default = "default_radius")]
    pub radius_miles: f64,
    #[serde(default = "default_interval")]
    pub poll_interval_minutes: f64,
    /// `None` = indefinite.
    #[serde(default)]
    pub duration_hours: Option<f64>,
    #[serde(default = "default_min_severity")]
    pub min_severity: String,
    /// Overrides the built-in neighbor table when set.
    #[serde(default)]
    pub neighbors: Option<Vec<String>>,
    /// City -> RSS 2.0 alert feed URL. Empty by default: department alert
    /// pages such as lafd.org/alerts are HTML, and the adapter only reads RSS.
    #[serde(default)]
    pub department_feeds: BTreeMap<String, String>,
    #[serde(default)]
    pub sources: SourcesCfg,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_sink_timeout")]
    pub sink_timeout_secs: u64,
    #[serde(default)]
    pub discord_webhook: Option<String>,
    #[serde(default)]
    pub http_addr: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitored_location: default_location(),
            radius_miles: default_radius(),
            poll_interval_minutes: default_interval(),
            duration_hours: None,
            min_severity: default_min_severity(),
            neighbors: None,
            department_feeds: BTreeMap::new(),
            sources: SourcesCfg::default(),
            user_agent: default_user_agent(),
            sink_timeout_secs: default_sink_timeout(),
            discord_webhook: None,
            http_addr: None,
        }
    }
}

impl MonitorConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension with a
    /// content-sniffing fallback.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, &ext)
            .with_context(|| format!("parsing monitor config {}", path.display()))
    }

    /// File lookup only (no env overrides, no validation).
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    /// Full load used by the binary: files, env overrides, validation.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_default()?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_nonempty("MONITORED_LOCATION") {
            self.monitored_location = v;
        }
        if let Some(v) = env_nonempty("RADIUS_MILES") {
            self.radius_miles = v
                .parse()
                .with_context(|| format!("RADIUS_MILES={v:?} is not a number"))?;
        }
        if let Some(v) = env_nonempty("POLL_INTERVAL_MINUTES") {
            self.poll_interval_minutes = v
                .parse()
                .with_context(|| format!("POLL_INTERVAL_MINUTES={v:?} is not a number"))?;
        }
        if let Ok(v) = std::env::var("DURATION_HOURS") {
            self.duration_hours = parse_duration_hours(&v)?;
        }
        if let Some(v) = env_nonempty("MIN_SEVERITY") {
            self.min_severity = v;
        }
        if let Some(v) = env_nonempty("DISCORD_WEBHOOK_URL") {
            self.discord_webhook = Some(v);
        }
        if let Some(v) = env_nonempty("HTTP_ADDR") {
            self.http_addr = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.session()?;
        self.settings()?;
        Ok(())
    }

    pub fn min_severity_level(&self) -> Result<SeverityLevel> {
        self.min_severity.parse()
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        let m = self.poll_interval_minutes;
        if !m.is_finite() || m <= 0.0 {
            bail!("poll_interval_minutes must be > 0, got {m}");
        }
        let d = Duration::try_from_secs_f64(m * 60.0)
            .map_err(|e| anyhow!("poll_interval_minutes={m} is out of range: {e}"))?;
        if d < MIN_POLL_INTERVAL {
            bail!(
                "poll_interval_minutes={m} is below the {}s floor",
                MIN_POLL_INTERVAL.as_secs()
            );
        }
        Ok(d)
    }

    pub fn duration(&self) -> Result<Option<Duration>> {
        match self.duration_hours {
            None => Ok(None),
            Some(h) if h.is_finite() && h >= 0.0 => Duration::try_from_secs_f64(h * 3600.0)
                .map(Some)
                .map_err(|e| anyhow!("duration_hours={h} is out of range: {e}")),
            Some(h) => bail!("duration_hours must be >= 0, got {h}"),
        }
    }

    pub fn neighbor_list(&self) -> Vec<String> {
        match &self.neighbors {
            Some(n) => clean_list(n.clone()),
            None => default_neighbors(&self.monitored_location),
        }
    }

    /// Feed URL for the monitored city, if one is configured.
    pub fn department_feed(&self) -> Option<(&str, &str)> {
        let city = self.monitored_location.trim();
        self.department_feeds
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(city))
            .map(|(c, u)| (c.as_str(), u.as_str()))
    }

    pub fn session(&self) -> Result<MonitorSession> {
        MonitorSession::new(
            &self.monitored_location,
            self.radius_miles,
            self.min_severity_level()?,
        )
    }

    pub fn settings(&self) -> Result<MonitorSettings> {
        Ok(MonitorSettings {
            poll_interval: self.poll_interval()?,
            duration: self.duration()?,
            neighbors: self.neighbor_list(),
            sink_timeout: Duration::from_secs(self.sink_timeout_secs.max(1)),
        })
    }
}

/// `""` / `"indefinite"` / `"none"` → no budget.
pub fn parse_duration_hours(raw: &str) -> Result<Option<f64>> {
    let t = raw.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("indefinite") || t.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let h: f64 = t
        .parse()
        .with_context(|| format!("DURATION_HOURS={raw:?} is not a number"))?;
    Ok(Some(h))
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<MonitorConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("invalid JSON config");
    }
    if hint_ext == "toml" {
        return toml::from_str(s).context("invalid TOML config");
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Ok(v);
    }
    toml::from_str(s).map_err(|e| anyhow!("unsupported config format: {e}"))
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(t)) {
            out.push(t.to_string());
        }
    }
    out
}
