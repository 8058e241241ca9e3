//! Provider Service
//!
//! Registration, relocation and status updates for professionals. The
//! spatial hash is derived from coordinates in the database layer, so a
//! relocation here is a plain coordinate update.

use crate::db::sqlite::models::{Provider, Review};
use crate::db::sqlite::NewProvider;
use crate::error::{AppError, Result};
use crate::state::AppState;
use serde::Deserialize;
use tracing::info;

/// Registration parameters
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterProviderRequest {
    pub user_id: String,
    pub display_name: String,
    pub categories: Vec<String>,
    pub base_price: f64,
    /// Coordinates, or an address to geocode when they are absent
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub address: Option<String>,
}

/// Provider service for business logic
pub struct ProviderService;

impl ProviderService {
    /// Register a provider. Base location comes from explicit coordinates
    /// or from geocoding the given address.
    pub async fn register(state: &AppState, req: &RegisterProviderRequest) -> Result<Provider> {
        let (lat, lng) = Self::resolve_location(state, req.lat, req.lng, req.address.as_deref())
            .await?;

        let provider = state.sqlite.create_provider(&NewProvider {
            user_id: req.user_id.clone(),
            display_name: req.display_name.clone(),
            categories: req.categories.clone(),
            base_price: req.base_price,
            lat,
            lng,
        })?;

        info!("Registered provider {} at ({}, {})", provider.id, lat, lng);
        state.publish_change_with("providers", &provider.id, "created", &provider);
        Ok(provider)
    }

    pub fn get(state: &AppState, id: &str) -> Result<Provider> {
        state.sqlite.get_provider(id)
    }

    pub fn list(state: &AppState) -> Result<Vec<Provider>> {
        state.sqlite.list_providers()
    }

    /// Move a provider's base location
    pub async fn relocate(
        state: &AppState,
        id: &str,
        lat: Option<f64>,
        lng: Option<f64>,
        address: Option<&str>,
    ) -> Result<Provider> {
        let (lat, lng) = Self::resolve_location(state, lat, lng, address).await?;
        let provider = state.sqlite.set_provider_location(id, lat, lng)?;
        state.publish_change_with("providers", id, "updated", &provider);
        Ok(provider)
    }

    /// Online/busy flags from the liveness feed
    pub fn set_status(state: &AppState, id: &str, online: bool, busy: bool) -> Result<Provider> {
        let provider = state.sqlite.set_provider_status(id, online, busy)?;
        state.publish_change_with("providers", id, "updated", &provider);
        Ok(provider)
    }

    pub fn reviews(state: &AppState, host_id: &str) -> Result<Vec<Review>> {
        state.sqlite.list_reviews_for_host(host_id)
    }

    async fn resolve_location(
        state: &AppState,
        lat: Option<f64>,
        lng: Option<f64>,
        address: Option<&str>,
    ) -> Result<(f64, f64)> {
        match (lat, lng, address) {
            (Some(lat), Some(lng), _) => Ok((lat, lng)),
            (_, _, Some(address)) => {
                let geocoded = state.geocode_cached(address).await?;
                Ok((geocoded.lat, geocoded.lng))
            }
            _ => Err(AppError::Validation(
                "Either coordinates or an address is required".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request() -> RegisterProviderRequest {
        RegisterProviderRequest {
            user_id: "u-1".to_string(),
            display_name: "Jan Kowalski".to_string(),
            categories: vec!["Hydraulik".to_string()],
            base_price: 150.0,
            lat: Some(52.4064),
            lng: Some(16.9252),
            address: None,
        }
    }

    #[tokio::test]
    async fn test_register_and_relocate() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let provider = ProviderService::register(&state, &request()).await.unwrap();
        assert!(!provider.geohash.is_empty());

        let moved = ProviderService::relocate(&state, &provider.id, Some(50.0647), Some(19.9450), None)
            .await
            .unwrap();
        assert_ne!(moved.geohash, provider.geohash);
    }

    #[tokio::test]
    async fn test_register_needs_location() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let mut req = request();
        req.lat = None;
        req.lng = None;
        // No address either, and the offline geocoder cannot help.
        let result = ProviderService::register(&state, &req).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_status_flags() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let provider = ProviderService::register(&state, &request()).await.unwrap();
        let updated = ProviderService::set_status(&state, &provider.id, true, false).unwrap();
        assert!(updated.online);
        assert!(!updated.busy);
    }
}
