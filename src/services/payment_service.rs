//! Payment Service
//!
//! Collects a booking's payment through the configured gateway. The
//! platform fee percentage comes from settings; the remainder is routed
//! to the host's connected account. Confirmation is a System action on
//! the booking state machine.

use crate::db::sqlite::models::Booking;
use crate::error::{AppError, Result};
use crate::external::types::{OnboardingLink, SplitPayment};
use crate::lifecycle::{ActorRole, BookingAction, BookingStatus};
use crate::services::BookingService;
use crate::state::AppState;
use tracing::info;

const CURRENCY: &str = "PLN";

/// Payment service for business logic
pub struct PaymentService;

impl PaymentService {
    /// Start collecting payment for a booking awaiting it.
    pub async fn start_payment(state: &AppState, booking_id: &str) -> Result<SplitPayment> {
        let booking = state.sqlite.get_booking(booking_id)?;
        if BookingStatus::parse(&booking.status)? != BookingStatus::PendingPayment {
            return Err(AppError::InvalidTransition(
                booking.status,
                "pay".to_string(),
            ));
        }
        let host_id = booking
            .host_id
            .as_deref()
            .ok_or_else(|| AppError::Internal("booking awaiting payment has no host".to_string()))?;

        let settings = state.sqlite.get_settings()?;
        let split = state
            .external
            .payments
            .create_split_payment(
                booking.total_amount,
                CURRENCY,
                settings.platform_fee_percent,
                host_id,
            )
            .await?;

        info!(
            "Payment intent {} for booking {} (fee {} {})",
            split.intent.id, booking_id, split.platform_fee, CURRENCY
        );
        Ok(split)
    }

    /// Record a completed payment; moves the booking to CONFIRMED.
    pub fn confirm_payment(state: &AppState, booking_id: &str) -> Result<Booking> {
        BookingService::transition(
            state,
            booking_id,
            BookingAction::MarkPaid,
            ActorRole::System,
            None,
        )
    }

    /// Onboarding link for a host's payout account
    pub async fn onboarding_link(
        state: &AppState,
        host_id: &str,
        return_url: &str,
    ) -> Result<OnboardingLink> {
        state.sqlite.get_provider(host_id)?;
        state
            .external
            .payments
            .create_onboarding_link(host_id, return_url)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::NewProvider;
    use crate::lifecycle::BookingSource;
    use crate::services::booking_service::CreateBookingRequest;
    use tempfile::tempdir;

    fn pending_payment_booking(state: &AppState) -> (String, String) {
        state.sqlite.upsert_user("c-1", "Anna", "client").unwrap();
        let host_id = state
            .sqlite
            .create_provider(&NewProvider {
                user_id: "u-h".to_string(),
                display_name: "Jan".to_string(),
                categories: vec!["Hydraulik".to_string()],
                base_price: 150.0,
                lat: 52.4064,
                lng: 16.9252,
            })
            .unwrap()
            .id;
        let booking = BookingService::create(
            state,
            &CreateBookingRequest {
                source: BookingSource::Direct,
                client_id: "c-1".to_string(),
                host_id: Some(host_id.clone()),
                category: "Hydraulik".to_string(),
                description: "Cieknie kran".to_string(),
                total_amount: 250.0,
                service_lat: 52.4064,
                service_lng: 16.9252,
                service_address: "Poznan".to_string(),
            },
        )
        .unwrap();
        BookingService::transition(
            state,
            &booking.id,
            BookingAction::Accept,
            ActorRole::Host,
            Some(&host_id),
        )
        .unwrap();
        (booking.id, host_id)
    }

    #[tokio::test]
    async fn test_payment_flow_with_sandbox_gateway() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let (booking_id, _host_id) = pending_payment_booking(&state);

        let split = PaymentService::start_payment(&state, &booking_id).await.unwrap();
        // 10% platform fee from default settings
        assert_eq!(split.platform_fee, 25.0);
        assert_eq!(split.host_payout, 225.0);

        let booking = PaymentService::confirm_payment(&state, &booking_id).unwrap();
        assert_eq!(booking.status, "CONFIRMED");
    }

    #[tokio::test]
    async fn test_payment_requires_pending_payment_status() {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        let (booking_id, _host_id) = pending_payment_booking(&state);
        PaymentService::confirm_payment(&state, &booking_id).unwrap();

        let result = PaymentService::start_payment(&state, &booking_id).await;
        assert!(matches!(result, Err(AppError::InvalidTransition(_, _))));
    }
}
