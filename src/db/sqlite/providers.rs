//! Provider collection
//!
//! Base locations are indexed by spatial hash. The hash column is derived
//! here on every coordinate write; callers never supply it, so it cannot
//! go stale.

use super::models::Provider;
use crate::error::{AppError, Result};
use crate::geo;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

/// Input for provider registration
#[derive(Debug, Clone)]
pub struct NewProvider {
    pub user_id: String,
    pub display_name: String,
    pub categories: Vec<String>,
    pub base_price: f64,
    pub lat: f64,
    pub lng: f64,
}

const SELECT_COLUMNS: &str = "id, user_id, display_name, categories, base_price, rating, \
                              review_count, online, busy, lat, lng, geohash, created_at, updated_at";

fn row_to_provider(row: &Row<'_>) -> rusqlite::Result<Provider> {
    let categories: String = row.get(3)?;
    Ok(Provider {
        id: row.get(0)?,
        user_id: row.get(1)?,
        display_name: row.get(2)?,
        categories: serde_json::from_str(&categories).unwrap_or_default(),
        base_price: row.get(4)?,
        rating: row.get(5)?,
        review_count: row.get(6)?,
        online: row.get(7)?,
        busy: row.get(8)?,
        lat: row.get(9)?,
        lng: row.get(10)?,
        geohash: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Register a new provider
pub fn create(conn: &Connection, new: &NewProvider) -> Result<Provider> {
    if new.display_name.trim().is_empty() {
        return Err(AppError::Validation("display_name is required".to_string()));
    }
    if !(-90.0..=90.0).contains(&new.lat) || !(-180.0..=180.0).contains(&new.lng) {
        return Err(AppError::Validation(format!(
            "coordinates out of range: ({}, {})",
            new.lat, new.lng
        )));
    }

    let id = Uuid::new_v4().to_string();
    let geohash = geo::encode(new.lat, new.lng, geo::DEFAULT_PRECISION);
    let categories = serde_json::to_string(&new.categories)?;

    conn.execute(
        r#"
        INSERT INTO providers (id, user_id, display_name, categories, base_price, lat, lng, geohash)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            id,
            new.user_id,
            new.display_name,
            categories,
            new.base_price,
            new.lat,
            new.lng,
            geohash
        ],
    )?;

    tracing::debug!("Registered provider {} at {}", id, geohash);
    get(conn, &id)
}

/// Get provider by id
pub fn get(conn: &Connection, id: &str) -> Result<Provider> {
    conn.query_row(
        &format!("SELECT {} FROM providers WHERE id = ?1", SELECT_COLUMNS),
        params![id],
        row_to_provider,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("provider {}", id))
        }
        other => other.into(),
    })
}

/// Move a provider's base location, regenerating the spatial hash
pub fn set_location(conn: &Connection, id: &str, lat: f64, lng: f64) -> Result<Provider> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::Validation(format!(
            "coordinates out of range: ({}, {})",
            lat, lng
        )));
    }

    let geohash = geo::encode(lat, lng, geo::DEFAULT_PRECISION);
    let rows = conn.execute(
        "UPDATE providers SET lat = ?2, lng = ?3, geohash = ?4, updated_at = datetime('now')
         WHERE id = ?1",
        params![id, lat, lng, geohash],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("provider {}", id)));
    }

    get(conn, id)
}

/// Update the liveness flags maintained by the status feed
pub fn set_status(conn: &Connection, id: &str, online: bool, busy: bool) -> Result<Provider> {
    let rows = conn.execute(
        "UPDATE providers SET online = ?2, busy = ?3, updated_at = datetime('now') WHERE id = ?1",
        params![id, online, busy],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("provider {}", id)));
    }

    get(conn, id)
}

/// Indexed range scan over the spatial hash, ordered by hash.
///
/// This is the superset filter a proximity search starts from; the search
/// service still post-filters by true distance.
pub fn find_in_hash_range(
    conn: &Connection,
    lo: &str,
    hi: &str,
    category: Option<&str>,
) -> Result<Vec<Provider>> {
    let sql = format!(
        "SELECT {} FROM providers
         WHERE geohash BETWEEN ?1 AND ?2 {}
         ORDER BY geohash",
        SELECT_COLUMNS,
        if category.is_some() {
            "AND categories LIKE '%\"' || ?3 || '\"%'"
        } else {
            ""
        }
    );

    let mut stmt = conn.prepare(&sql)?;
    let providers = if let Some(cat) = category {
        stmt.query_map(params![lo, hi, cat], row_to_provider)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        stmt.query_map(params![lo, hi], row_to_provider)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    Ok(providers)
}

/// List all providers (admin/simulator surface)
pub fn list(conn: &Connection) -> Result<Vec<Provider>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM providers ORDER BY created_at",
        SELECT_COLUMNS
    ))?;
    let providers = stmt
        .query_map([], row_to_provider)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(providers)
}

/// Recompute a provider's aggregate rating from its reviews.
///
/// Runs inside the review-submission transaction.
pub(super) fn refresh_rating(conn: &Connection, host_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE providers SET
            rating = COALESCE((SELECT AVG(rating) FROM reviews WHERE host_id = ?1), 0),
            review_count = (SELECT COUNT(*) FROM reviews WHERE host_id = ?1),
            updated_at = datetime('now')
         WHERE id = ?1",
        params![host_id],
    )?;
    Ok(())
}
