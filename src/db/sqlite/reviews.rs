//! Reviews
//!
//! Exactly one review per booking, enforced by the UNIQUE constraint on
//! `booking_id` rather than by UI gating. Submission is a transaction that
//! writes the review, flips the booking's `has_review` flag, and refreshes
//! the provider's aggregate rating.

use super::models::Review;
use super::{bookings, providers};
use crate::error::{AppError, Result};
use crate::lifecycle::BookingStatus;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, booking_id, client_id, host_id, rating, comment, created_at";

fn row_to_review(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        client_id: row.get(2)?,
        host_id: row.get(3)?,
        rating: row.get(4)?,
        comment: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Submit the review for a completed booking
pub fn create(
    conn: &mut Connection,
    booking_id: &str,
    client_id: &str,
    rating: i64,
    comment: &str,
) -> Result<Review> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(format!(
            "rating must be between 1 and 5, got {}",
            rating
        )));
    }

    let booking = bookings::get(conn, booking_id)?;
    if booking.client_id != client_id {
        return Err(AppError::Validation(
            "only the booking's client may review it".to_string(),
        ));
    }
    if booking.status != BookingStatus::Completed.as_str() {
        return Err(AppError::InvalidTransition(
            booking.status,
            "review".to_string(),
        ));
    }
    if booking.has_review {
        return Err(AppError::Validation(format!(
            "booking {} already has a review",
            booking_id
        )));
    }
    let host_id = booking.host_id.ok_or_else(|| {
        AppError::Internal(format!("completed booking {} has no host", booking_id))
    })?;

    let id = Uuid::new_v4().to_string();
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO reviews (id, booking_id, client_id, host_id, rating, comment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, booking_id, client_id, host_id, rating, comment],
    )
    .map_err(|e| match e {
        // UNIQUE(booking_id) lost a race with another submission
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Validation(format!("booking {} already has a review", booking_id))
        }
        other => other.into(),
    })?;

    tx.execute(
        "UPDATE bookings SET has_review = 1, updated_at = datetime('now') WHERE id = ?1",
        params![booking_id],
    )?;
    providers::refresh_rating(&tx, &host_id)?;

    let review = tx.query_row(
        &format!("SELECT {} FROM reviews WHERE id = ?1", SELECT_COLUMNS),
        params![id],
        row_to_review,
    )?;
    tx.commit()?;

    tracing::debug!("Recorded review {} for booking {}", id, booking_id);
    Ok(review)
}

/// Reviews received by a provider, newest first
pub fn list_for_host(conn: &Connection, host_id: &str) -> Result<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM reviews WHERE host_id = ?1 ORDER BY created_at DESC",
        SELECT_COLUMNS
    ))?;
    let reviews = stmt
        .query_map(params![host_id], row_to_review)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(reviews)
}
