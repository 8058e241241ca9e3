//! Row models for the SQLite store

use serde::{Deserialize, Serialize};

/// Professional offering services at a base location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub categories: Vec<String>,
    pub base_price: f64,
    pub rating: f64,
    pub review_count: i64,
    pub online: bool,
    pub busy: bool,
    pub lat: f64,
    pub lng: f64,
    pub geohash: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Client request for service, direct or via the open marketplace.
///
/// The three snapshot fields are point-in-time copies taken when the
/// booking (or proposal acceptance) is written and are never updated
/// afterwards, even if the underlying profile changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub source: String,
    pub client_id: String,
    pub host_id: Option<String>,
    pub category: String,
    pub description: String,
    pub status: String,
    pub total_amount: f64,
    pub client_snapshot: serde_json::Value,
    pub host_snapshot: Option<serde_json::Value>,
    pub listing_snapshot: Option<serde_json::Value>,
    pub service_lat: f64,
    pub service_lng: f64,
    pub service_address: String,
    pub has_review: bool,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Host's offer on an open marketplace booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub booking_id: String,
    pub host_id: String,
    pub price: f64,
    pub message: String,
    pub status: String,
    pub created_at: String,
}

/// Conversation between a client and a host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub booking_id: Option<String>,
    pub client_id: String,
    pub host_id: String,
    pub last_message: Option<String>,
    pub last_sender_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub body: String,
    pub created_at: String,
}

/// One review per completed booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub booking_id: String,
    pub client_id: String,
    pub host_id: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: String,
}

/// Identity-provider snapshot of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Server settings singleton
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub api_rate_limit: u32,
    pub search_rate_limit: u32,
    pub write_rate_limit: u32,
    pub platform_fee_percent: f64,
    pub default_radius_m: f64,
    pub max_radius_m: f64,
    pub validity_days: i64,
    pub expiry_sweep_hour: u32,
    pub expiry_sweep_minute: u32,
    pub updated_at: String,
}
