//! Application state management

use crate::db::sqlite::SqliteDb;
use crate::error::{AppError, Result};
use crate::external::types::GeocodedAddress;
use crate::external::ExternalRegistry;
use crate::websocket::{ChangeEvent, ChangeHub};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state behind every handler and scheduler
pub struct AppState {
    /// SQLite database connection
    pub sqlite: Arc<SqliteDb>,

    /// External service adapters (geocoding, assistant, payments)
    pub external: Arc<ExternalRegistry>,

    /// Live change feed hub
    pub hub: Arc<ChangeHub>,

    /// Geocoding result cache (address -> coordinates)
    pub geocode_cache: DashMap<String, GeocodedAddress>,

    /// Application data directory
    pub data_dir: PathBuf,
}

impl AppState {
    /// Create new application state
    ///
    /// The data directory comes from `USLUGO_DATA_DIR`, defaulting to
    /// `./data` for local runs.
    pub fn new() -> Result<Self> {
        let data_dir = match std::env::var("USLUGO_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => PathBuf::from("data"),
        };

        std::fs::create_dir_all(&data_dir)
            .map_err(|e| AppError::Config(format!("Failed to create data directory: {}", e)))?;

        tracing::info!("Data directory: {:?}", data_dir);

        let sqlite_path = data_dir.join("uslugo.db");
        let sqlite = Arc::new(SqliteDb::new(&sqlite_path)?);

        let external = Arc::new(ExternalRegistry::from_env());
        let hub = Arc::new(ChangeHub::new());

        Ok(Self {
            sqlite,
            external,
            hub,
            geocode_cache: DashMap::new(),
            data_dir,
        })
    }

    /// Geocode an address, serving repeats from the in-memory cache.
    pub async fn geocode_cached(&self, address: &str) -> Result<GeocodedAddress> {
        if let Some(hit) = self.geocode_cache.get(address) {
            return Ok(hit.clone());
        }
        let geocoded = self.external.geocoder.geocode(address).await?;
        self.geocode_cache
            .insert(address.to_string(), geocoded.clone());
        Ok(geocoded)
    }

    /// Publish a change event for a committed write.
    pub fn publish_change(&self, collection: &str, id: &str, action: &str) {
        self.hub.publish(ChangeEvent::new(collection, id, action));
    }

    /// Publish a change event carrying the record state.
    pub fn publish_change_with<T: serde::Serialize>(
        &self,
        collection: &str,
        id: &str,
        action: &str,
        record: &T,
    ) {
        let event = match serde_json::to_value(record) {
            Ok(payload) => ChangeEvent::new(collection, id, action).with_payload(payload),
            Err(_) => ChangeEvent::new(collection, id, action),
        };
        self.hub.publish(event);
    }

    #[cfg(test)]
    pub fn for_tests(dir: &std::path::Path) -> Self {
        let sqlite_path = dir.join("uslugo.db");
        Self {
            sqlite: Arc::new(SqliteDb::new(&sqlite_path).unwrap()),
            external: Arc::new(ExternalRegistry::offline()),
            hub: Arc::new(ChangeHub::new()),
            geocode_cache: DashMap::new(),
            data_dir: dir.to_path_buf(),
        }
    }
}
