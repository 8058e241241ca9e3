//! Users
//!
//! The identity provider owns authentication; this table only mirrors the
//! opaque id and display fields the marketplace needs for snapshots.

use super::models::User;
use crate::error::{AppError, Result};
use rusqlite::{params, Connection, Row};

const SELECT_COLUMNS: &str = "id, display_name, role, created_at, updated_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        display_name: row.get(1)?,
        role: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Insert or refresh an identity-provider snapshot
pub fn upsert(conn: &Connection, id: &str, display_name: &str, role: &str) -> Result<User> {
    if display_name.trim().is_empty() {
        return Err(AppError::Validation("display_name is required".to_string()));
    }

    conn.execute(
        "INSERT INTO users (id, display_name, role) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
            display_name = excluded.display_name,
            role = excluded.role,
            updated_at = datetime('now')",
        params![id, display_name, role],
    )?;

    get(conn, id)
}

/// Get user by id
pub fn get(conn: &Connection, id: &str) -> Result<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", SELECT_COLUMNS),
        params![id],
        row_to_user,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("user {}", id)),
        other => other.into(),
    })
}
