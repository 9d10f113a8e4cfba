//! Google Maps Platform clients: Places Text Search and Geocoding.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use super::{Geocoder, LookupError, PlaceQuery, PlaceResult, PlacesLookup};
use crate::coords::Coordinates;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    status: String,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct PlaceHit {
    name: String,
    geometry: Geometry,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    price_level: Option<u8>,
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    vicinity: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    geometry: Geometry,
}

impl From<PlaceHit> for PlaceResult {
    fn from(hit: PlaceHit) -> Self {
        Self {
            name: hit.name,
            location: Coordinates::new(hit.geometry.location.lat, hit.geometry.location.lng),
            rating: hit.rating,
            price_level: hit.price_level,
            place_id: hit.place_id,
            vicinity: hit.vicinity.or(hit.formatted_address),
            types: hit.types,
        }
    }
}

/// Shared GET + status handling for both endpoints.
async fn fetch<T>(
    client: &reqwest::Client,
    url: Url,
) -> Result<Vec<T>, LookupError>
where
    T: for<'de> Deserialize<'de>,
{
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LookupError::Http(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16().to_string();
        let message = response.text().await.unwrap_or_default();
        return Err(LookupError::Status { status, message });
    }

    let body: SearchResponse<T> = response
        .json()
        .await
        .map_err(|e| LookupError::Malformed(e.to_string()))?;

    match body.status.as_str() {
        "OK" => Ok(body.results),
        "ZERO_RESULTS" => Ok(Vec::new()),
        _ => Err(LookupError::Status {
            message: body.error_message.unwrap_or_default(),
            status: body.status,
        }),
    }
}

fn endpoint(base_url: &str, path: &str, params: &[(&str, String)]) -> Result<Url, LookupError> {
    let raw = format!("{}/{}", base_url.trim_end_matches('/'), path);
    Url::parse_with_params(&raw, params).map_err(|e| LookupError::Http(e.to_string()))
}

// ── Places ────────────────────────────────────────────────────────────────────

/// Places Text Search (`/place/textsearch/json`).
#[derive(Debug, Clone)]
pub struct GooglePlaces {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GooglePlaces {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(api_key, reqwest::Client::new())
    }

    pub fn with_client(api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PlacesLookup for GooglePlaces {
    async fn search(&self, query: &PlaceQuery) -> Result<Vec<PlaceResult>, LookupError> {
        let mut params = vec![
            ("query", query.text.clone()),
            ("key", self.api_key.clone()),
        ];
        if let Some(center) = query.center {
            params.push(("location", format!("{},{}", center.lat, center.lng)));
        }
        if let Some(radius) = query.radius_m {
            params.push(("radius", radius.to_string()));
        }
        if let Some(category) = &query.category {
            params.push(("type", category.clone()));
        }
        let url = endpoint(&self.base_url, "place/textsearch/json", &params)?;
        let hits: Vec<PlaceHit> = fetch(&self.client, url).await?;
        debug!(query = %query.text, hits = hits.len(), "place search");
        Ok(hits.into_iter().map(PlaceResult::from).collect())
    }
}

// ── Geocoding ─────────────────────────────────────────────────────────────────

/// Geocoding API (`/geocode/json`).
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(api_key, reqwest::Client::new())
    }

    pub fn with_client(api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, LookupError> {
        let params = [("address", address.to_owned()), ("key", self.api_key.clone())];
        let url = endpoint(&self.base_url, "geocode/json", &params)?;
        let hits: Vec<GeocodeHit> = fetch(&self.client, url).await?;
        Ok(hits
            .into_iter()
            .next()
            .map(|h| Coordinates::new(h.geometry.location.lat, h.geometry.location.lng)))
    }
}
