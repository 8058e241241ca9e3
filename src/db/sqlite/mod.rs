//! SQLite document store
//!
//! Plays the role of the managed document database the marketplace core
//! talks to: indexed range queries, single-document read/write, and atomic
//! multi-statement batches. One connection behind a mutex, WAL mode.

pub mod models;

mod api_keys;
mod bookings;
mod chats;
mod migrations;
mod proposals;
mod providers;
mod reviews;
mod settings;
mod users;

pub use bookings::NewBooking;
pub use providers::NewProvider;

use crate::error::Result;
use crate::lifecycle::BookingStatus;
use models::*;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        // Run migrations
        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Provider Methods ==========

    /// Register a provider
    pub fn create_provider(&self, new: &NewProvider) -> Result<Provider> {
        let conn = self.conn.lock();
        providers::create(&conn, new)
    }

    /// Get a provider by id
    pub fn get_provider(&self, id: &str) -> Result<Provider> {
        let conn = self.conn.lock();
        providers::get(&conn, id)
    }

    /// Relocate a provider (spatial hash is regenerated)
    pub fn set_provider_location(&self, id: &str, lat: f64, lng: f64) -> Result<Provider> {
        let conn = self.conn.lock();
        providers::set_location(&conn, id, lat, lng)
    }

    /// Update a provider's online/busy flags
    pub fn set_provider_status(&self, id: &str, online: bool, busy: bool) -> Result<Provider> {
        let conn = self.conn.lock();
        providers::set_status(&conn, id, online, busy)
    }

    /// Range scan over the spatial-hash index
    pub fn find_providers_in_hash_range(
        &self,
        lo: &str,
        hi: &str,
        category: Option<&str>,
    ) -> Result<Vec<Provider>> {
        let conn = self.conn.lock();
        providers::find_in_hash_range(&conn, lo, hi, category)
    }

    /// List all providers
    pub fn list_providers(&self) -> Result<Vec<Provider>> {
        let conn = self.conn.lock();
        providers::list(&conn)
    }

    // ========== Booking Methods ==========

    /// Create a booking
    pub fn create_booking(&self, new: &NewBooking) -> Result<Booking> {
        let conn = self.conn.lock();
        bookings::create(&conn, new)
    }

    /// Get a booking by id
    pub fn get_booking(&self, id: &str) -> Result<Booking> {
        let conn = self.conn.lock();
        bookings::get(&conn, id)
    }

    /// Compare-and-swap status transition; false means the CAS lost
    pub fn try_transition_booking(
        &self,
        id: &str,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<bool> {
        let conn = self.conn.lock();
        bookings::try_transition(&conn, id, from, to)
    }

    /// Open marketplace postings
    pub fn list_open_marketplace(&self, category: Option<&str>) -> Result<Vec<Booking>> {
        let conn = self.conn.lock();
        bookings::list_open_marketplace(&conn, category)
    }

    /// Bookings a user participates in
    pub fn list_bookings_for_actor(&self, actor_id: &str) -> Result<Vec<Booking>> {
        let conn = self.conn.lock();
        bookings::list_for_actor(&conn, actor_id)
    }

    /// Expire bookings past their validity window; returns expired ids
    pub fn expire_due_bookings(&self) -> Result<Vec<String>> {
        let mut conn = self.conn.lock();
        bookings::expire_due(&mut conn)
    }

    // ========== Proposal Methods ==========

    /// Submit a proposal on an open posting
    pub fn create_proposal(
        &self,
        booking_id: &str,
        host_id: &str,
        price: f64,
        message: &str,
    ) -> Result<Proposal> {
        let conn = self.conn.lock();
        proposals::create(&conn, booking_id, host_id, price, message)
    }

    /// Proposals for a booking
    pub fn list_proposals(&self, booking_id: &str) -> Result<Vec<Proposal>> {
        let conn = self.conn.lock();
        proposals::list_for_booking(&conn, booking_id)
    }

    /// Accept a proposal atomically (host assignment + status + snapshots)
    pub fn accept_proposal(
        &self,
        booking_id: &str,
        proposal_id: &str,
        host_snapshot: &serde_json::Value,
        listing_snapshot: &serde_json::Value,
    ) -> Result<Booking> {
        let mut conn = self.conn.lock();
        proposals::accept(&mut conn, booking_id, proposal_id, host_snapshot, listing_snapshot)
    }

    // ========== Chat Methods ==========

    /// Open a chat
    pub fn create_chat(
        &self,
        booking_id: Option<&str>,
        client_id: &str,
        host_id: &str,
    ) -> Result<Chat> {
        let conn = self.conn.lock();
        chats::create(&conn, booking_id, client_id, host_id)
    }

    /// Get a chat by id
    pub fn get_chat(&self, id: &str) -> Result<Chat> {
        let conn = self.conn.lock();
        chats::get(&conn, id)
    }

    /// Chats a user participates in
    pub fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>> {
        let conn = self.conn.lock();
        chats::list_for_user(&conn, user_id)
    }

    /// Append a message and update the summary atomically
    pub fn append_message(&self, chat_id: &str, sender_id: &str, body: &str) -> Result<Message> {
        let mut conn = self.conn.lock();
        chats::append_message(&mut conn, chat_id, sender_id, body)
    }

    /// Messages in a chat
    pub fn list_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        chats::list_messages(&conn, chat_id, limit)
    }

    // ========== Review Methods ==========

    /// Submit the review for a completed booking
    pub fn create_review(
        &self,
        booking_id: &str,
        client_id: &str,
        rating: i64,
        comment: &str,
    ) -> Result<Review> {
        let mut conn = self.conn.lock();
        reviews::create(&mut conn, booking_id, client_id, rating, comment)
    }

    /// Reviews received by a provider
    pub fn list_reviews_for_host(&self, host_id: &str) -> Result<Vec<Review>> {
        let conn = self.conn.lock();
        reviews::list_for_host(&conn, host_id)
    }

    // ========== User Methods ==========

    /// Insert or refresh an identity snapshot
    pub fn upsert_user(&self, id: &str, display_name: &str, role: &str) -> Result<User> {
        let conn = self.conn.lock();
        users::upsert(&conn, id, display_name, role)
    }

    /// Get a user by id
    pub fn get_user(&self, id: &str) -> Result<User> {
        let conn = self.conn.lock();
        users::get(&conn, id)
    }

    // ========== API Key Methods ==========

    /// Store a freshly generated key hash
    pub fn create_api_key(&self, name: &str, key_hash: &str) -> Result<i64> {
        let conn = self.conn.lock();
        api_keys::create(&conn, name, key_hash)
    }

    /// Validate a key hash
    pub fn validate_api_key_hash(&self, key_hash: &str) -> Result<()> {
        let conn = self.conn.lock();
        api_keys::validate(&conn, key_hash)
    }

    /// Revoke a key by name
    pub fn revoke_api_key(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        api_keys::revoke(&conn, name)
    }

    /// True when no key exists yet
    pub fn has_no_api_keys(&self) -> Result<bool> {
        let conn = self.conn.lock();
        api_keys::is_empty(&conn)
    }

    // ========== Settings Methods ==========

    /// Get settings
    pub fn get_settings(&self) -> Result<Settings> {
        let conn = self.conn.lock();
        settings::get_settings(&conn)
    }

    /// Update settings
    pub fn update_settings(
        &self,
        host: Option<String>,
        port: Option<u16>,
        platform_fee_percent: Option<f64>,
        default_radius_m: Option<f64>,
        max_radius_m: Option<f64>,
        validity_days: Option<i64>,
    ) -> Result<Settings> {
        let conn = self.conn.lock();
        settings::update_settings(
            &conn,
            host,
            port,
            platform_fee_percent,
            default_radius_m,
            max_radius_m,
            validity_days,
        )
    }
    #[cfg(test)]
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let conn = self.conn.lock();
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::BookingSource;
    use serde_json::json;

    fn test_db() -> (SqliteDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteDb::new(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    fn sample_provider(db: &SqliteDb, name: &str, lat: f64, lng: f64) -> Provider {
        db.create_provider(&NewProvider {
            user_id: format!("user-{}", name),
            display_name: name.to_string(),
            categories: vec!["Hydraulik".to_string()],
            base_price: 120.0,
            lat,
            lng,
        })
        .unwrap()
    }

    fn direct_booking(db: &SqliteDb, host: &Provider) -> Booking {
        db.create_booking(&NewBooking {
            source: BookingSource::Direct,
            client_id: "client-1".to_string(),
            host_id: Some(host.id.clone()),
            category: "Hydraulik".to_string(),
            description: "Cieknie kran w kuchni".to_string(),
            total_amount: 150.0,
            client_snapshot: json!({"display_name": "Anna"}),
            host_snapshot: Some(json!({"display_name": host.display_name})),
            listing_snapshot: Some(json!({"base_price": host.base_price})),
            service_lat: 52.4064,
            service_lng: 16.9252,
            service_address: "Poznan, Stary Rynek 1".to_string(),
            validity_days: 7,
        })
        .unwrap()
    }

    #[test]
    fn test_provider_hash_regenerated_on_relocation() {
        let (db, _dir) = test_db();
        let provider = sample_provider(&db, "Jan", 52.4064, 16.9252);
        assert_eq!(provider.geohash.len(), crate::geo::DEFAULT_PRECISION);

        let moved = db
            .set_provider_location(&provider.id, 50.0647, 19.9450)
            .unwrap();
        assert_ne!(moved.geohash, provider.geohash);
        assert_eq!(
            moved.geohash,
            crate::geo::encode(50.0647, 19.9450, crate::geo::DEFAULT_PRECISION)
        );
    }

    #[test]
    fn test_hash_range_scan_ordered() {
        let (db, _dir) = test_db();
        sample_provider(&db, "A", 52.4064, 16.9252);
        sample_provider(&db, "B", 52.4100, 16.9300);
        sample_provider(&db, "C", 50.0647, 19.9450); // Krakow, out of range

        let prefix = crate::geo::encode(52.4064, 16.9252, 4);
        let hits = db
            .find_providers_in_hash_range(&prefix, &format!("{}~", prefix), None)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.windows(2).all(|w| w[0].geohash <= w[1].geohash));

        // Category filter excludes non-matching providers
        let none = db
            .find_providers_in_hash_range(&prefix, &format!("{}~", prefix), Some("Elektryk"))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_booking_cas_single_winner() {
        let (db, _dir) = test_db();
        let host = sample_provider(&db, "Jan", 52.4064, 16.9252);
        let booking = direct_booking(&db, &host);
        assert_eq!(booking.status, "PENDING_APPROVAL");

        // Host accepts first
        assert!(db
            .try_transition_booking(
                &booking.id,
                BookingStatus::PendingApproval,
                BookingStatus::Confirmed
            )
            .unwrap());

        // Client's racing cancel loses instead of overwriting
        assert!(!db
            .try_transition_booking(
                &booking.id,
                BookingStatus::PendingApproval,
                BookingStatus::CanceledByGuest
            )
            .unwrap());

        assert_eq!(db.get_booking(&booking.id).unwrap().status, "CONFIRMED");
    }

    #[test]
    fn test_snapshots_survive_profile_changes() {
        let (db, _dir) = test_db();
        let host = sample_provider(&db, "Jan", 52.4064, 16.9252);
        let booking = direct_booking(&db, &host);

        // Provider relocates and changes status after the booking was taken
        db.set_provider_location(&host.id, 50.0647, 19.9450).unwrap();
        db.set_provider_status(&host.id, true, true).unwrap();

        let reread = db.get_booking(&booking.id).unwrap();
        assert_eq!(reread.host_snapshot, booking.host_snapshot);
        assert_eq!(reread.client_snapshot, booking.client_snapshot);
        assert_eq!(reread.listing_snapshot, booking.listing_snapshot);
    }

    #[test]
    fn test_one_review_per_booking() {
        let (db, _dir) = test_db();
        let host = sample_provider(&db, "Jan", 52.4064, 16.9252);
        let booking = direct_booking(&db, &host);

        for (from, to) in [
            (BookingStatus::PendingApproval, BookingStatus::Confirmed),
            (BookingStatus::Confirmed, BookingStatus::Active),
            (BookingStatus::Active, BookingStatus::Completed),
        ] {
            assert!(db.try_transition_booking(&booking.id, from, to).unwrap());
        }

        let review = db
            .create_review(&booking.id, "client-1", 5, "Szybko i solidnie")
            .unwrap();
        assert_eq!(review.rating, 5);
        assert!(db.get_booking(&booking.id).unwrap().has_review);

        // Second submission is rejected at the store boundary
        assert!(db
            .create_review(&booking.id, "client-1", 4, "again")
            .is_err());

        // Aggregate rating refreshed
        let rated = db.get_provider(&host.id).unwrap();
        assert_eq!(rated.review_count, 1);
        assert!((rated.rating - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_review_requires_completed_booking() {
        let (db, _dir) = test_db();
        let host = sample_provider(&db, "Jan", 52.4064, 16.9252);
        let booking = direct_booking(&db, &host);

        let err = db
            .create_review(&booking.id, "client-1", 5, "too early")
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::InvalidTransition(_, _)));
    }

    #[test]
    fn test_marketplace_proposal_acceptance() {
        let (db, _dir) = test_db();
        let host = sample_provider(&db, "Jan", 52.4064, 16.9252);
        let rival = sample_provider(&db, "Piotr", 52.4100, 16.9300);

        let posting = db
            .create_booking(&NewBooking {
                source: BookingSource::Marketplace,
                client_id: "client-1".to_string(),
                host_id: None,
                category: "Hydraulik".to_string(),
                description: "Wymiana baterii".to_string(),
                total_amount: 0.0,
                client_snapshot: json!({"display_name": "Anna"}),
                host_snapshot: None,
                listing_snapshot: None,
                service_lat: 52.4064,
                service_lng: 16.9252,
                service_address: String::new(),
                validity_days: 7,
            })
            .unwrap();
        assert_eq!(posting.status, "INQUIRY");

        let winner = db
            .create_proposal(&posting.id, &host.id, 180.0, "Moge jutro")
            .unwrap();
        let loser = db
            .create_proposal(&posting.id, &rival.id, 220.0, "Od reki")
            .unwrap();

        let booking = db
            .accept_proposal(
                &posting.id,
                &winner.id,
                &json!({"display_name": "Jan"}),
                &json!({"price": 180.0}),
            )
            .unwrap();
        assert_eq!(booking.status, "CONFIRMED");
        assert_eq!(booking.host_id.as_deref(), Some(host.id.as_str()));
        assert!((booking.total_amount - 180.0).abs() < f64::EPSILON);

        let proposals = db.list_proposals(&posting.id).unwrap();
        let by_id = |id: &str| proposals.iter().find(|p| p.id == id).unwrap();
        assert_eq!(by_id(&winner.id).status, "accepted");
        assert_eq!(by_id(&loser.id).status, "declined");

        // A posting can be won only once
        assert!(db
            .accept_proposal(&posting.id, &loser.id, &json!({}), &json!({}))
            .is_err());
    }

    #[test]
    fn test_chat_append_is_atomic_with_summary() {
        let (db, _dir) = test_db();
        let chat = db.create_chat(None, "client-1", "host-1").unwrap();

        db.append_message(&chat.id, "client-1", "Dzien dobry").unwrap();
        let msg = db.append_message(&chat.id, "host-1", "Witam, w czym pomoc?").unwrap();

        let reread = db.get_chat(&chat.id).unwrap();
        assert_eq!(reread.last_message.as_deref(), Some("Witam, w czym pomoc?"));
        assert_eq!(reread.last_sender_id.as_deref(), Some("host-1"));

        let messages = db.list_messages(&chat.id, 50).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages.last().unwrap().id, msg.id);

        // Outsiders cannot post
        assert!(db.append_message(&chat.id, "stranger", "hej").is_err());
    }

    #[test]
    fn test_expire_due_skips_terminal_and_fresh_bookings() {
        let (db, _dir) = test_db();
        let host = sample_provider(&db, "Jan", 52.4064, 16.9252);
        let stale = direct_booking(&db, &host);
        let fresh = direct_booking(&db, &host);
        let done = direct_booking(&db, &host);

        for (from, to) in [
            (BookingStatus::PendingApproval, BookingStatus::Confirmed),
            (BookingStatus::Confirmed, BookingStatus::Active),
            (BookingStatus::Active, BookingStatus::Completed),
        ] {
            assert!(db.try_transition_booking(&done.id, from, to).unwrap());
        }

        // Backdate two bookings past their validity window
        for id in [&stale.id, &done.id] {
            db.with_conn(|conn| {
                conn.execute(
                    "UPDATE bookings SET expires_at = datetime('now', '-1 day') WHERE id = ?1",
                    rusqlite::params![id],
                )
            })
            .unwrap();
        }

        let expired = db.expire_due_bookings().unwrap();
        assert_eq!(expired, vec![stale.id.clone()]);
        assert_eq!(db.get_booking(&stale.id).unwrap().status, "EXPIRED");
        // Completed bookings stay completed; fresh ones are untouched
        assert_eq!(db.get_booking(&done.id).unwrap().status, "COMPLETED");
        assert_eq!(db.get_booking(&fresh.id).unwrap().status, "PENDING_APPROVAL");
    }

    #[test]
    fn test_api_key_lifecycle() {
        let (db, _dir) = test_db();
        assert!(db.has_no_api_keys().unwrap());

        db.create_api_key("ui", "abc123hash").unwrap();
        assert!(db.validate_api_key_hash("abc123hash").is_ok());
        assert!(db.validate_api_key_hash("wrong").is_err());

        assert!(db.revoke_api_key("ui").unwrap());
        assert!(db.validate_api_key_hash("abc123hash").is_err());
    }

    #[test]
    fn test_settings_defaults_and_update() {
        let (db, _dir) = test_db();
        let settings = db.get_settings().unwrap();
        assert_eq!(settings.port, 4600);
        assert_eq!(settings.validity_days, 7);

        let updated = db
            .update_settings(None, Some(8080), Some(12.5), None, None, Some(14))
            .unwrap();
        assert_eq!(updated.port, 8080);
        assert_eq!(updated.validity_days, 14);
        // Untouched fields keep their values
        assert_eq!(updated.host, settings.host);
    }

    #[test]
    fn test_settings_update_rejects_bad_ranges() {
        let (db, _dir) = test_db();

        for result in [
            db.update_settings(None, None, Some(-1.0), None, None, None),
            db.update_settings(None, None, Some(120.0), None, None, None),
            db.update_settings(None, None, None, Some(0.0), None, None),
            db.update_settings(None, None, None, None, Some(-5.0), None),
            db.update_settings(None, None, None, None, None, Some(0)),
        ] {
            assert!(matches!(result, Err(crate::error::AppError::Validation(_))));
        }

        // Nothing was persisted
        let settings = db.get_settings().unwrap();
        assert_eq!(settings.validity_days, 7);
        assert!((settings.platform_fee_percent - 10.0).abs() < f64::EPSILON);
    }
}
