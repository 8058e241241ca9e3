//! Geocoding adapter

use crate::error::{AppError, Result};
use crate::external::types::GeocodedAddress;
use crate::external::Geocoder;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// HTTP geocoder against a places API
pub struct HttpGeocoder {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpGeocoder {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
            api_key,
        }
    }

    /// Configured from `PLACES_API_URL` / `PLACES_API_KEY`
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("PLACES_API_URL").ok()?;
        let api_key = std::env::var("PLACES_API_KEY").ok()?;
        Some(Self::new(base_url, api_key))
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    lat: f64,
    lng: f64,
    formatted_address: Option<String>,
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    fn id(&self) -> &'static str {
        "places-http"
    }

    async fn geocode(&self, address: &str) -> Result<GeocodedAddress> {
        if address.trim().is_empty() {
            return Err(AppError::Validation("address is empty".to_string()));
        }

        let response = self
            .client
            .get(format!("{}/geocode", self.base_url))
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "geocoder returned {}",
                response.status()
            )));
        }

        let body: GeocodeResponse = response.json().await?;
        Ok(GeocodedAddress {
            lat: body.lat,
            lng: body.lng,
            formatted_address: body.formatted_address.unwrap_or_else(|| address.to_string()),
        })
    }
}

/// Stand-in used when no places API is configured
pub struct OfflineGeocoder;

#[async_trait]
impl Geocoder for OfflineGeocoder {
    fn id(&self) -> &'static str {
        "places-offline"
    }

    async fn geocode(&self, _address: &str) -> Result<GeocodedAddress> {
        Err(AppError::ExternalService(
            "geocoder is not configured".to_string(),
        ))
    }
}
