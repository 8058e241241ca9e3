//! Common types for external service adapters

use serde::{Deserialize, Serialize};

/// Result of an address lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodedAddress {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
}

/// Job categorization produced by the assistant (or the keyword fallback)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySuggestion {
    pub category: String,
    pub price_min: f64,
    pub price_max: f64,
    pub urgency: String,
    pub confidence: f64,
}

/// Payment intent created at the processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
}

/// Connected-account onboarding link for a host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingLink {
    pub url: String,
    pub expires_at: Option<i64>,
}

/// Split payment: platform fee retained, remainder paid out to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitPayment {
    pub intent: PaymentIntent,
    pub platform_fee: f64,
    pub host_payout: f64,
    pub host_account: String,
}
