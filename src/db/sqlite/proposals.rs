//! Proposals on open marketplace bookings

use super::bookings;
use super::models::{Booking, Proposal};
use crate::error::{AppError, Result};
use crate::lifecycle::BookingStatus;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, booking_id, host_id, price, message, status, created_at";

fn row_to_proposal(row: &Row<'_>) -> rusqlite::Result<Proposal> {
    Ok(Proposal {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        host_id: row.get(2)?,
        price: row.get(3)?,
        message: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Submit a host's offer on an open posting
pub fn create(
    conn: &Connection,
    booking_id: &str,
    host_id: &str,
    price: f64,
    message: &str,
) -> Result<Proposal> {
    let booking = bookings::get(conn, booking_id)?;
    if booking.status != BookingStatus::Inquiry.as_str() {
        return Err(AppError::Validation(format!(
            "booking {} is not open for proposals",
            booking_id
        )));
    }
    if price < 0.0 {
        return Err(AppError::Validation("price must be non-negative".to_string()));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO proposals (id, booking_id, host_id, price, message)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, booking_id, host_id, price, message],
    )?;

    get(conn, &id)
}

/// Get proposal by id
pub fn get(conn: &Connection, id: &str) -> Result<Proposal> {
    conn.query_row(
        &format!("SELECT {} FROM proposals WHERE id = ?1", SELECT_COLUMNS),
        params![id],
        row_to_proposal,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("proposal {}", id)),
        other => other.into(),
    })
}

/// Proposals for a booking, newest first
pub fn list_for_booking(conn: &Connection, booking_id: &str) -> Result<Vec<Proposal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM proposals WHERE booking_id = ?1 ORDER BY created_at DESC",
        SELECT_COLUMNS
    ))?;
    let proposals = stmt
        .query_map(params![booking_id], row_to_proposal)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(proposals)
}

/// Accept one proposal on an open posting, atomically.
///
/// In a single transaction: the proposal is marked accepted, its siblings
/// declined, and the booking gains its host, price, and the host/listing
/// snapshots before moving `INQUIRY -> CONFIRMED` through the usual
/// compare-and-swap. A concurrent cancel or accept loses cleanly.
pub fn accept(
    conn: &mut Connection,
    booking_id: &str,
    proposal_id: &str,
    host_snapshot: &serde_json::Value,
    listing_snapshot: &serde_json::Value,
) -> Result<Booking> {
    let tx = conn.transaction()?;

    let proposal = {
        let row = tx.query_row(
            &format!("SELECT {} FROM proposals WHERE id = ?1", SELECT_COLUMNS),
            params![proposal_id],
            row_to_proposal,
        );
        row.map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NotFound(format!("proposal {}", proposal_id))
            }
            other => other.into(),
        })?
    };

    if proposal.booking_id != booking_id {
        return Err(AppError::Validation(format!(
            "proposal {} does not belong to booking {}",
            proposal_id, booking_id
        )));
    }
    if proposal.status != "pending" {
        return Err(AppError::Validation(format!(
            "proposal {} is no longer pending",
            proposal_id
        )));
    }

    // Host assignment and snapshots are creation-time writes for the
    // marketplace path; the CAS on status rejects a posting that is no
    // longer open.
    let rows = tx.execute(
        "UPDATE bookings SET host_id = ?2, total_amount = ?3, host_snapshot = ?4,
                             listing_snapshot = ?5, status = ?6, updated_at = datetime('now')
         WHERE id = ?1 AND status = ?7",
        params![
            booking_id,
            proposal.host_id,
            proposal.price,
            serde_json::to_string(host_snapshot)?,
            serde_json::to_string(listing_snapshot)?,
            BookingStatus::Confirmed.as_str(),
            BookingStatus::Inquiry.as_str(),
        ],
    )?;
    if rows == 0 {
        let current = bookings::get(&tx, booking_id)?;
        return Err(AppError::InvalidTransition(
            current.status,
            "accept_proposal".to_string(),
        ));
    }

    tx.execute(
        "UPDATE proposals SET status = 'accepted' WHERE id = ?1",
        params![proposal_id],
    )?;
    tx.execute(
        "UPDATE proposals SET status = 'declined'
         WHERE booking_id = ?1 AND id != ?2 AND status = 'pending'",
        params![booking_id, proposal_id],
    )?;

    let booking = bookings::get(&tx, booking_id)?;
    tx.commit()?;

    tracing::debug!(
        "Accepted proposal {} on booking {} (host {})",
        proposal_id,
        booking_id,
        proposal.host_id
    );
    Ok(booking)
}
