//! # Geo Resolver
//! Place name → coordinates with a memoizing cache, and great-circle
//! distance between two place names.
//!
//! Lookups never fail outward: collaborator errors are logged, counted, and
//! turned into `None`. Only successful lookups are cached, so a failed place
//! is retried on the next call. The cache has no eviction; place-name
//! cardinality is bounded by the monitored cities and their neighbors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Mean Earth radius in statute miles.
pub const EARTH_RADIUS_MILES: f64 = 3958.7613;

pub const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Returned by reverse geocoding when nothing sensible is found.
pub const UNKNOWN_PLACE: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine distance in miles.
    pub fn miles_to(&self, other: &Coordinates) -> f64 {
        let (phi1, phi2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_phi = (other.lat - self.lat).to_radians();
        let d_lambda = (other.lon - self.lon).to_radians();

        let a = (d_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_MILES * c
    }

    /// Parse `"lat,lon"` (whitespace tolerated). Used for coordinate-style
    /// monitored locations.
    pub fn parse_pair(s: &str) -> Option<Self> {
        let (lat, lon) = s.split_once(',')?;
        let lat: f64 = lat.trim().parse().ok()?;
        let lon: f64 = lon.trim().parse().ok()?;
        ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon))
            .then_some(Self { lat, lon })
    }
}

/// External geocoding service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the service has no match.
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>>;
    /// Nearest city/town/village name, or [`UNKNOWN_PLACE`].
    async fn reverse_geocode(&self, at: Coordinates) -> Result<String>;
}

/// OpenStreetMap Nominatim over HTTP. The client must carry a real
/// User-Agent; Nominatim rejects anonymous traffic.
pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(NOMINATIM_BASE_URL, client)
    }

    pub fn with_base_url(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>> {
        let hits: Vec<SearchHit> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", place), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("nominatim search for {place:?}"))?
            .json()
            .await
            .context("nominatim search json")?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };
        let lat = hit.lat.parse::<f64>().context("nominatim lat")?;
        let lon = hit.lon.parse::<f64>().context("nominatim lon")?;
        Ok(Some(Coordinates { lat, lon }))
    }

    async fn reverse_geocode(&self, at: Coordinates) -> Result<String> {
        let hit: ReverseHit = self
            .client
            .get(format!("{}/reverse", self.base_url))
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lon.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .context("nominatim reverse")?
            .json()
            .await
            .context("nominatim reverse json")?;

        Ok(hit
            .address
            .and_then(|a| a.city.or(a.town).or(a.village))
            .unwrap_or_else(|| UNKNOWN_PLACE.to_string()))
    }
}

/// Fixed gazetteer; names match case-insensitively. Useful offline and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    places: Vec<(String, Coordinates)>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(mut self, name: &str, lat: f64, lon: f64) -> Self {
        self.places.push((name.to_string(), Coordinates { lat, lon }));
        self
    }

    /// The cities the built-in neighbor table knows about.
    pub fn california() -> Self {
        Self::new()
            .with_place("Los Angeles", 34.0522, -118.2437)
            .with_place("Long Beach", 33.7701, -118.1937)
            .with_place("Pasadena", 34.1478, -118.1445)
            .with_place("Glendale", 34.1425, -118.2551)
            .with_place("San Francisco", 37.7749, -122.4194)
            .with_place("Oakland", 37.8044, -122.2712)
            .with_place("San Jose", 37.3382, -121.8863)
            .with_place("Berkeley", 37.8715, -122.2730)
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinates>> {
        let needle = place.trim();
        Ok(self
            .places
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(needle))
            .map(|(_, c)| *c))
    }

    async fn reverse_geocode(&self, at: Coordinates) -> Result<String> {
        Ok(self
            .places
            .iter()
            .map(|(n, c)| (n, c.miles_to(&at)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| n.clone())
            .unwrap_or_else(|| UNKNOWN_PLACE.to_string()))
    }
}

pub struct GeoResolver {
    geocoder: Box<dyn Geocoder>,
    cache: Mutex<HashMap<String, Coordinates>>,
}

impl GeoResolver {
    pub fn new(geocoder: Box<dyn Geocoder>) -> Self {
        Self {
            geocoder,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, place: &str) -> Option<Coordinates> {
        self.cache
            .lock()
            .ok()
            .and_then(|c| c.get(place).copied())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Cache first, then the collaborator. Failures are logged, not cached.
    pub async fn resolve(&self, place: &str) -> Option<Coordinates> {
        if let Some(c) = self.cached(place) {
            return Some(c);
        }
        if let Some(c) = Coordinates::parse_pair(place) {
            return Some(c);
        }

        match self.geocoder.geocode(place).await {
            Ok(Some(coords)) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(place.to_string(), coords);
                    gauge!("geo_cache_size").set(cache.len() as f64);
                }
                Some(coords)
            }
            Ok(None) => {
                tracing::debug!(target: "geo", place, "no geocoding match");
                counter!("geocode_failures_total").increment(1);
                None
            }
            Err(e) => {
                tracing::warn!(target: "geo", place, error = ?e, "geocoding error");
                counter!("geocode_failures_total").increment(1);
                None
            }
        }
    }

    /// Great-circle miles between two places, one decimal. `None` if either
    /// side does not resolve; callers treat that as "distance unknown".
    pub async fn distance(&self, a: &str, b: &str) -> Option<f64> {
        let ca = self.resolve(a).await?;
        let cb = self.resolve(b).await?;
        Some(round1(ca.miles_to(&cb)))
    }

    /// Closest named place to `at`, or `"Unknown"`.
    pub async fn closest_place(&self, at: Coordinates) -> String {
        match self.geocoder.reverse_geocode(at).await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => UNKNOWN_PLACE.to_string(),
            Err(e) => {
                tracing::warn!(target: "geo", lat = at.lat, lon = at.lon, error = ?e, "reverse geocoding error");
                UNKNOWN_PLACE.to_string()
            }
        }
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
