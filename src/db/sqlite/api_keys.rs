//! API keys for callers of the REST surface
//!
//! Only the SHA-256 hash of a key is stored; the plaintext is shown once at
//! creation and never again.

use crate::error::{AppError, Result};
use rusqlite::{params, Connection};

/// Store the hash of a freshly generated key
pub fn create(conn: &Connection, name: &str, key_hash: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO api_keys (name, key_hash) VALUES (?1, ?2)",
        params![name, key_hash],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Validate a key hash, touching its last-used timestamp
pub fn validate(conn: &Connection, key_hash: &str) -> Result<()> {
    let rows = conn.execute(
        "UPDATE api_keys SET last_used_at = datetime('now') WHERE key_hash = ?1",
        params![key_hash],
    )?;
    if rows == 0 {
        return Err(AppError::Auth("invalid API key".to_string()));
    }
    Ok(())
}

/// Revoke a key by name
pub fn revoke(conn: &Connection, name: &str) -> Result<bool> {
    let rows = conn.execute("DELETE FROM api_keys WHERE name = ?1", params![name])?;
    Ok(rows > 0)
}

/// True when no key has been provisioned yet (fresh install)
pub fn is_empty(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM api_keys", [], |row| row.get(0))?;
    Ok(count == 0)
}
