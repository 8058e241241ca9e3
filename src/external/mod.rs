//! External service adapters
//!
//! Geocoding, generative-AI categorization, and payment processing are
//! delegated to hosted APIs behind async traits. Each trait has an HTTP
//! implementation configured from the environment and an offline stand-in
//! so the server runs (and tests run) without credentials.

pub mod assistant;
pub mod payments;
pub mod places;
pub mod types;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use types::*;

/// Address string to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn id(&self) -> &'static str;

    async fn geocode(&self, address: &str) -> Result<GeocodedAddress>;
}

/// Free-text job description to category + price band
#[async_trait]
pub trait Categorizer: Send + Sync {
    fn id(&self) -> &'static str;

    async fn categorize(&self, description: &str) -> Result<CategorySuggestion>;
}

/// Payment processor operations the marketplace consumes
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn id(&self) -> &'static str;

    async fn create_payment_intent(&self, amount: f64, currency: &str) -> Result<PaymentIntent>;

    async fn create_onboarding_link(
        &self,
        host_account: &str,
        return_url: &str,
    ) -> Result<OnboardingLink>;

    async fn create_split_payment(
        &self,
        amount: f64,
        currency: &str,
        platform_fee_percent: f64,
        host_account: &str,
    ) -> Result<SplitPayment>;
}

/// Registry of the configured external adapters
pub struct ExternalRegistry {
    pub geocoder: Arc<dyn Geocoder>,
    pub categorizer: Arc<dyn Categorizer>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl ExternalRegistry {
    /// Build adapters from environment configuration, falling back to the
    /// offline stand-ins when a service has no credentials.
    pub fn from_env() -> Self {
        let geocoder: Arc<dyn Geocoder> = match places::HttpGeocoder::from_env() {
            Some(g) => Arc::new(g),
            None => {
                tracing::warn!("Geocoder not configured, address lookup disabled");
                Arc::new(places::OfflineGeocoder)
            }
        };

        let categorizer: Arc<dyn Categorizer> = match assistant::HttpCategorizer::from_env() {
            Some(c) => Arc::new(c),
            None => {
                tracing::warn!("Assistant not configured, using keyword categorization only");
                Arc::new(assistant::OfflineCategorizer)
            }
        };

        let payments: Arc<dyn PaymentGateway> = match payments::HttpPaymentGateway::from_env() {
            Some(p) => Arc::new(p),
            None => {
                tracing::warn!("Payment processor not configured, using sandbox gateway");
                Arc::new(payments::SandboxGateway)
            }
        };

        Self {
            geocoder,
            categorizer,
            payments,
        }
    }

    /// Offline adapters only (tests, demos)
    pub fn offline() -> Self {
        Self {
            geocoder: Arc::new(places::OfflineGeocoder),
            categorizer: Arc::new(assistant::OfflineCategorizer),
            payments: Arc::new(payments::SandboxGateway),
        }
    }
}
