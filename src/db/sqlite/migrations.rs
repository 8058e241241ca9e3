//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_users", CREATE_USERS_TABLE)?;
    run_migration(conn, "002_api_keys", CREATE_API_KEYS_TABLE)?;
    run_migration(conn, "003_providers", CREATE_PROVIDERS_TABLE)?;
    run_migration(conn, "004_bookings", CREATE_BOOKINGS_TABLE)?;
    run_migration(conn, "005_proposals", CREATE_PROPOSALS_TABLE)?;
    run_migration(conn, "006_chats", CREATE_CHATS_TABLE)?;
    run_migration(conn, "007_reviews", CREATE_REVIEWS_TABLE)?;
    run_migration(conn, "008_settings", CREATE_SETTINGS_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE users (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'client',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const CREATE_API_KEYS_TABLE: &str = r#"
CREATE TABLE api_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    key_hash TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    last_used_at TEXT
);
"#;

const CREATE_PROVIDERS_TABLE: &str = r#"
CREATE TABLE providers (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    categories TEXT NOT NULL DEFAULT '[]',
    base_price REAL NOT NULL DEFAULT 0,
    rating REAL NOT NULL DEFAULT 0,
    review_count INTEGER NOT NULL DEFAULT 0,
    online INTEGER NOT NULL DEFAULT 0,
    busy INTEGER NOT NULL DEFAULT 0,
    lat REAL NOT NULL,
    lng REAL NOT NULL,
    geohash TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_providers_geohash ON providers(geohash);
CREATE INDEX IF NOT EXISTS idx_providers_user ON providers(user_id);
"#;

const CREATE_BOOKINGS_TABLE: &str = r#"
CREATE TABLE bookings (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    client_id TEXT NOT NULL,
    host_id TEXT,
    category TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    total_amount REAL NOT NULL DEFAULT 0,
    client_snapshot TEXT NOT NULL,
    host_snapshot TEXT,
    listing_snapshot TEXT,
    service_lat REAL NOT NULL,
    service_lng REAL NOT NULL,
    service_address TEXT NOT NULL DEFAULT '',
    has_review INTEGER NOT NULL DEFAULT 0,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_bookings_client ON bookings(client_id);
CREATE INDEX IF NOT EXISTS idx_bookings_host ON bookings(host_id);
CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);
CREATE INDEX IF NOT EXISTS idx_bookings_source_status ON bookings(source, status);
"#;

const CREATE_PROPOSALS_TABLE: &str = r#"
CREATE TABLE proposals (
    id TEXT PRIMARY KEY,
    booking_id TEXT NOT NULL REFERENCES bookings(id),
    host_id TEXT NOT NULL,
    price REAL NOT NULL,
    message TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_proposals_booking ON proposals(booking_id);
"#;

const CREATE_CHATS_TABLE: &str = r#"
CREATE TABLE chats (
    id TEXT PRIMARY KEY,
    booking_id TEXT,
    client_id TEXT NOT NULL,
    host_id TEXT NOT NULL,
    last_message TEXT,
    last_sender_id TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_chats_client ON chats(client_id);
CREATE INDEX IF NOT EXISTS idx_chats_host ON chats(host_id);

CREATE TABLE messages (
    id TEXT PRIMARY KEY,
    chat_id TEXT NOT NULL REFERENCES chats(id),
    sender_id TEXT NOT NULL,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id, created_at);
"#;

const CREATE_REVIEWS_TABLE: &str = r#"
CREATE TABLE reviews (
    id TEXT PRIMARY KEY,
    booking_id TEXT NOT NULL UNIQUE REFERENCES bookings(id),
    client_id TEXT NOT NULL,
    host_id TEXT NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    comment TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_reviews_host ON reviews(host_id);
"#;

const CREATE_SETTINGS_TABLE: &str = r#"
CREATE TABLE settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    host TEXT NOT NULL DEFAULT '127.0.0.1',
    port INTEGER NOT NULL DEFAULT 4600,
    api_rate_limit INTEGER NOT NULL DEFAULT 100,
    search_rate_limit INTEGER NOT NULL DEFAULT 20,
    write_rate_limit INTEGER NOT NULL DEFAULT 10,
    platform_fee_percent REAL NOT NULL DEFAULT 10.0,
    default_radius_m REAL NOT NULL DEFAULT 5000,
    max_radius_m REAL NOT NULL DEFAULT 50000,
    validity_days INTEGER NOT NULL DEFAULT 7,
    expiry_sweep_hour INTEGER NOT NULL DEFAULT 3,
    expiry_sweep_minute INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
INSERT OR IGNORE INTO settings (id) VALUES (1);
"#;
