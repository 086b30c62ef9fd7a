//! services/api/src/adapters/geocoder.rs
//!
//! City lookup against a Nominatim-compatible `/search` endpoint.

use async_trait::async_trait;
use kova_core::ports::{GeocodingService, PortError, PortResult};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("kova-api/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

/// Only the fields we read from a search hit.
#[derive(Debug, Deserialize)]
struct Place {
    #[serde(default)]
    addresstype: Option<String>,
    #[serde(default)]
    display_name: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

/// A hit counts when it is a settlement, or when the service did not say what it is.
fn is_settlement(place: &Place) -> bool {
    match place.addresstype.as_deref() {
        None => true,
        Some(kind) => matches!(
            kind,
            "city" | "town" | "village" | "hamlet" | "municipality" | "suburb" | "borough"
        ),
    }
}

#[async_trait]
impl GeocodingService for NominatimGeocoder {
    async fn verify(&self, city: &str, state: Option<&str>) -> PortResult<bool> {
        let mut query = vec![
            ("city", city.trim()),
            ("countrycodes", "us"),
            ("format", "jsonv2"),
            ("limit", "5"),
        ];
        if let Some(state) = state.filter(|s| !s.trim().is_empty()) {
            query.push(("state", state.trim()));
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Network(format!(
                "Geocoder responded with {}",
                response.status()
            )));
        }

        let places: Vec<Place> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to parse geocoder response: {e}")))?;
        debug!(
            "Geocoder returned {} hits for {}: {:?}",
            places.len(),
            city,
            places.first().map(|p| &p.display_name)
        );
        Ok(places.iter().any(is_settlement))
    }
}
