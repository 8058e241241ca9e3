//! Booking collection
//!
//! One table backs both the direct and marketplace paths, discriminated by
//! `source`. Status writes are compare-and-swap on the current status so a
//! racing accept/cancel pair resolves to exactly one winner instead of
//! last-writer-wins. Bookings are never deleted, only terminalized.

use super::models::Booking;
use crate::error::{AppError, Result};
use crate::lifecycle::{BookingSource, BookingStatus};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

/// Input for booking creation
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub source: BookingSource,
    pub client_id: String,
    pub host_id: Option<String>,
    pub category: String,
    pub description: String,
    pub total_amount: f64,
    pub client_snapshot: serde_json::Value,
    pub host_snapshot: Option<serde_json::Value>,
    pub listing_snapshot: Option<serde_json::Value>,
    pub service_lat: f64,
    pub service_lng: f64,
    pub service_address: String,
    pub validity_days: i64,
}

const SELECT_COLUMNS: &str = "id, source, client_id, host_id, category, description, status, \
                              total_amount, client_snapshot, host_snapshot, listing_snapshot, \
                              service_lat, service_lng, service_address, has_review, expires_at, \
                              created_at, updated_at";

fn parse_snapshot(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

pub(super) fn row_to_booking(row: &Row<'_>) -> rusqlite::Result<Booking> {
    let client_snapshot: String = row.get(8)?;
    Ok(Booking {
        id: row.get(0)?,
        source: row.get(1)?,
        client_id: row.get(2)?,
        host_id: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        status: row.get(6)?,
        total_amount: row.get(7)?,
        client_snapshot: serde_json::from_str(&client_snapshot)
            .unwrap_or(serde_json::Value::Null),
        host_snapshot: parse_snapshot(row.get(9)?),
        listing_snapshot: parse_snapshot(row.get(10)?),
        service_lat: row.get(11)?,
        service_lng: row.get(12)?,
        service_address: row.get(13)?,
        has_review: row.get(14)?,
        expires_at: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

/// Create a booking in its source's initial status.
///
/// Snapshot fields are written once here (the marketplace path gains host
/// and listing snapshots at proposal acceptance) and no later statement in
/// this module touches them.
pub fn create(conn: &Connection, new: &NewBooking) -> Result<Booking> {
    if new.category.trim().is_empty() {
        return Err(AppError::Validation("category is required".to_string()));
    }
    if new.source == BookingSource::Direct && new.host_id.is_none() {
        return Err(AppError::Validation(
            "direct bookings require a host".to_string(),
        ));
    }
    if new.validity_days <= 0 {
        return Err(AppError::Validation(
            "validity window must be positive".to_string(),
        ));
    }

    let id = Uuid::new_v4().to_string();
    let status = new.source.initial_status();
    let client_snapshot = serde_json::to_string(&new.client_snapshot)?;
    let host_snapshot = new
        .host_snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let listing_snapshot = new
        .listing_snapshot
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        r#"
        INSERT INTO bookings (id, source, client_id, host_id, category, description, status,
                              total_amount, client_snapshot, host_snapshot, listing_snapshot,
                              service_lat, service_lng, service_address, expires_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                datetime('now', '+' || ?15 || ' days'))
        "#,
        params![
            id,
            new.source.as_str(),
            new.client_id,
            new.host_id,
            new.category,
            new.description,
            status.as_str(),
            new.total_amount,
            client_snapshot,
            host_snapshot,
            listing_snapshot,
            new.service_lat,
            new.service_lng,
            new.service_address,
            new.validity_days,
        ],
    )?;

    tracing::debug!("Created {} booking {} ({})", new.source.as_str(), id, status.as_str());
    get(conn, &id)
}

/// Get booking by id
pub fn get(conn: &Connection, id: &str) -> Result<Booking> {
    conn.query_row(
        &format!("SELECT {} FROM bookings WHERE id = ?1", SELECT_COLUMNS),
        params![id],
        row_to_booking,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("booking {}", id)),
        other => other.into(),
    })
}

/// Compare-and-swap status transition.
///
/// Returns `false` when the stored status no longer equals `from`, meaning
/// another actor's transition won the race; the caller re-reads and reports
/// the rejection instead of overwriting.
pub fn try_transition(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE bookings SET status = ?3, updated_at = datetime('now')
         WHERE id = ?1 AND status = ?2",
        params![id, from.as_str(), to.as_str()],
    )?;
    Ok(rows == 1)
}

/// Open marketplace postings awaiting proposals
pub fn list_open_marketplace(conn: &Connection, category: Option<&str>) -> Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {} FROM bookings
         WHERE source = 'marketplace' AND status = ?1 {}
         ORDER BY created_at DESC",
        SELECT_COLUMNS,
        if category.is_some() { "AND category = ?2" } else { "" }
    );

    let mut stmt = conn.prepare(&sql)?;
    let bookings = if let Some(cat) = category {
        stmt.query_map(params![BookingStatus::Inquiry.as_str(), cat], row_to_booking)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        stmt.query_map(params![BookingStatus::Inquiry.as_str()], row_to_booking)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    Ok(bookings)
}

/// Bookings for one side of the marketplace
pub fn list_for_actor(conn: &Connection, actor_id: &str) -> Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bookings WHERE client_id = ?1 OR host_id = ?1 ORDER BY updated_at DESC",
        SELECT_COLUMNS
    ))?;
    let bookings = stmt
        .query_map(params![actor_id], row_to_booking)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(bookings)
}

/// Terminalize bookings whose validity window has elapsed.
///
/// Each row goes through the same compare-and-swap as a user transition, so
/// an accept racing the sweep still resolves to one winner. Returns the ids
/// that were expired.
pub fn expire_due(conn: &mut Connection) -> Result<Vec<String>> {
    let tx = conn.transaction()?;

    let due: Vec<(String, String)> = {
        let mut stmt = tx.prepare(
            "SELECT id, status FROM bookings
             WHERE expires_at < datetime('now')
               AND status NOT IN ('COMPLETED', 'CANCELED_BY_HOST', 'CANCELED_BY_GUEST', 'EXPIRED')",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let mut expired = Vec::with_capacity(due.len());
    for (id, status) in due {
        let rows = tx.execute(
            "UPDATE bookings SET status = 'EXPIRED', updated_at = datetime('now')
             WHERE id = ?1 AND status = ?2",
            params![id, status],
        )?;
        if rows == 1 {
            expired.push(id);
        }
    }

    tx.commit()?;
    Ok(expired)
}
