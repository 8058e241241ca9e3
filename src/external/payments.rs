//! Payment gateway adapter
//!
//! Split payments route a platform fee to the marketplace and the remainder
//! to the host's connected account. The sandbox gateway fabricates intents
//! locally so the booking flow can run without a payments account.

use crate::error::{AppError, Result};
use crate::external::types::{OnboardingLink, PaymentIntent, SplitPayment};
use crate::external::PaymentGateway;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
            api_key,
        }
    }

    /// Configured from `PAYMENTS_API_URL` / `PAYMENTS_API_KEY`
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("PAYMENTS_API_URL").ok()?;
        let api_key = std::env::var("PAYMENTS_API_KEY").ok()?;
        Some(Self::new(base_url, api_key))
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "payment gateway returned {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn id(&self) -> &'static str {
        "payments-http"
    }

    async fn create_payment_intent(&self, amount: f64, currency: &str) -> Result<PaymentIntent> {
        let response = self
            .post_json(
                "/v1/payment_intents",
                json!({ "amount": amount, "currency": currency }),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn create_onboarding_link(
        &self,
        host_account: &str,
        return_url: &str,
    ) -> Result<OnboardingLink> {
        let response = self
            .post_json(
                "/v1/onboarding_links",
                json!({ "account": host_account, "return_url": return_url }),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn create_split_payment(
        &self,
        amount: f64,
        currency: &str,
        platform_fee_percent: f64,
        host_account: &str,
    ) -> Result<SplitPayment> {
        let platform_fee = split_fee(amount, platform_fee_percent);
        let response = self
            .post_json(
                "/v1/payment_intents",
                json!({
                    "amount": amount,
                    "currency": currency,
                    "application_fee": platform_fee,
                    "transfer_to": host_account,
                }),
            )
            .await?;
        let intent: PaymentIntent = response.json().await?;
        Ok(SplitPayment {
            intent,
            platform_fee,
            host_payout: amount - platform_fee,
            host_account: host_account.to_string(),
        })
    }
}

/// Platform fee rounded to grosz to keep the split exact.
fn split_fee(amount: f64, platform_fee_percent: f64) -> f64 {
    (amount * platform_fee_percent / 100.0 * 100.0).round() / 100.0
}

/// Local gateway that fabricates intents, used when no account is configured
pub struct SandboxGateway;

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn id(&self) -> &'static str {
        "payments-sandbox"
    }

    async fn create_payment_intent(&self, amount: f64, currency: &str) -> Result<PaymentIntent> {
        if amount <= 0.0 {
            return Err(AppError::Validation(
                "Payment amount must be positive".to_string(),
            ));
        }
        let id = format!("pi_sandbox_{}", Uuid::new_v4().simple());
        Ok(PaymentIntent {
            client_secret: format!("{}_secret", id),
            id,
            amount,
            currency: currency.to_string(),
            status: "requires_payment_method".to_string(),
        })
    }

    async fn create_onboarding_link(
        &self,
        host_account: &str,
        return_url: &str,
    ) -> Result<OnboardingLink> {
        Ok(OnboardingLink {
            url: format!(
                "https://sandbox.invalid/onboarding/{}?return={}",
                host_account, return_url
            ),
            expires_at: None,
        })
    }

    async fn create_split_payment(
        &self,
        amount: f64,
        currency: &str,
        platform_fee_percent: f64,
        host_account: &str,
    ) -> Result<SplitPayment> {
        let intent = self.create_payment_intent(amount, currency).await?;
        let platform_fee = split_fee(amount, platform_fee_percent);
        Ok(SplitPayment {
            intent,
            platform_fee,
            host_payout: amount - platform_fee,
            host_account: host_account.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fee_rounds_to_grosz() {
        assert_eq!(split_fee(200.0, 10.0), 20.0);
        assert_eq!(split_fee(99.99, 10.0), 10.0);
        assert_eq!(split_fee(33.33, 10.0), 3.33);
    }

    #[tokio::test]
    async fn test_sandbox_split_payment() {
        let gateway = SandboxGateway;
        let split = gateway
            .create_split_payment(250.0, "PLN", 10.0, "acct_host_1")
            .await
            .unwrap();
        assert_eq!(split.platform_fee, 25.0);
        assert_eq!(split.host_payout, 225.0);
        assert!(split.intent.id.starts_with("pi_sandbox_"));
    }

    #[tokio::test]
    async fn test_sandbox_rejects_nonpositive_amount() {
        let gateway = SandboxGateway;
        assert!(gateway.create_payment_intent(0.0, "PLN").await.is_err());
    }
}
