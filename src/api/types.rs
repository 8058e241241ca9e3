//! REST API request and response types
//!
//! Mobile and script clients send numeric fields as strings more often
//! than not, so coordinate and money fields use flexible deserializers
//! that accept both.

use crate::lifecycle::{ActorRole, BookingAction, BookingSource};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Flexible numeric deserializers
// ============================================================================

fn deserialize_flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleFloat {
        Float(f64),
        Int(i64),
        Str(String),
    }

    match FlexibleFloat::deserialize(deserializer)? {
        FlexibleFloat::Float(f) => Ok(f),
        FlexibleFloat::Int(i) => Ok(i as f64),
        FlexibleFloat::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn deserialize_optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleOptFloat {
        Float(f64),
        Int(i64),
        Str(String),
    }

    match Option::<FlexibleOptFloat>::deserialize(deserializer)? {
        None => Ok(None),
        Some(FlexibleOptFloat::Float(f)) => Ok(Some(f)),
        Some(FlexibleOptFloat::Int(i)) => Ok(Some(i as f64)),
        Some(FlexibleOptFloat::Str(s)) if s.is_empty() => Ok(None),
        Some(FlexibleOptFloat::Str(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn deserialize_flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleInt {
        Int(i64),
        Float(f64),
        Str(String),
    }

    match FlexibleInt::deserialize(deserializer)? {
        FlexibleInt::Int(i) => Ok(i),
        FlexibleInt::Float(f) => Ok(f as i64),
        FlexibleInt::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// Response envelope
// ============================================================================

/// Standard response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
        }
    }

    pub fn success_with_message(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.to_string()),
            data: None,
        }
    }
}

/// Empty data payload
#[derive(Debug, Serialize)]
pub struct Empty {}

// ============================================================================
// Read requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub lat: f64,
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub lng: f64,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub radius_m: Option<f64>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeRequest {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct CategorizeRequest {
    pub description: String,
}

// ============================================================================
// Write requests (apikey authenticated)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpsertUserRequest {
    pub apikey: String,
    pub id: String,
    pub display_name: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterProviderRequest {
    pub apikey: String,
    pub user_id: String,
    pub display_name: String,
    pub categories: Vec<String>,
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub base_price: f64,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub lng: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderLocationRequest {
    pub apikey: String,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub lng: Option<f64>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderStatusRequest {
    pub apikey: String,
    pub online: bool,
    pub busy: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingApiRequest {
    pub apikey: String,
    pub source: BookingSource,
    pub client_id: String,
    pub host_id: Option<String>,
    pub category: String,
    pub description: String,
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub total_amount: f64,
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub service_lat: f64,
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub service_lng: f64,
    pub service_address: String,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub apikey: String,
    pub action: BookingAction,
    pub actor: ActorRole,
    pub actor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub apikey: String,
    pub client_id: String,
    #[serde(deserialize_with = "deserialize_flexible_i64")]
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishJobApiRequest {
    pub apikey: String,
    pub client_id: String,
    pub description: String,
    pub category: Option<String>,
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub service_lat: f64,
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub service_lng: f64,
    pub service_address: String,
}

#[derive(Debug, Deserialize)]
pub struct ProposalRequest {
    pub apikey: String,
    pub host_id: String,
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub price: f64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AcceptProposalRequest {
    pub apikey: String,
    pub proposal_id: String,
    pub client_id: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenChatRequest {
    pub apikey: String,
    pub booking_id: Option<String>,
    pub client_id: String,
    pub host_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub apikey: String,
    pub sender_id: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub apikey: String,
    pub booking_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentConfirmRequest {
    pub apikey: String,
    pub booking_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyRequest {
    pub apikey: String,
    pub name: String,
}

#[derive(Debug, serde::Serialize)]
pub struct CreatedApiKey {
    pub name: String,
    /// The key itself; shown only in this response
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub apikey: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub platform_fee_percent: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub default_radius_m: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub max_radius_m: Option<f64>,
    pub validity_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    pub apikey: String,
    pub host_id: String,
    pub return_url: String,
}
