//! Booking Service
//!
//! Creates bookings with immutable party snapshots and drives the status
//! state machine. Transitions are compare-and-swap on the stored status,
//! so two racing actors cannot both win.

use crate::db::sqlite::models::{Booking, Provider, Review, User};
use crate::db::sqlite::NewBooking;
use crate::error::{AppError, Result};
use crate::lifecycle::{next_status, ActorRole, BookingAction, BookingSource, BookingStatus};
use crate::state::AppState;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Booking creation parameters
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub source: BookingSource,
    pub client_id: String,
    /// Required for direct bookings, absent for marketplace postings
    pub host_id: Option<String>,
    pub category: String,
    pub description: String,
    pub total_amount: f64,
    pub service_lat: f64,
    pub service_lng: f64,
    pub service_address: String,
}

/// Booking service for business logic
pub struct BookingService;

impl BookingService {
    /// Create a booking; party details are frozen into snapshots at this
    /// moment and never updated afterwards.
    pub fn create(state: &AppState, req: &CreateBookingRequest) -> Result<Booking> {
        let client = state.sqlite.get_user(&req.client_id)?;
        let client_snapshot = user_snapshot(&client);

        let (host_snapshot, listing_snapshot) = match (&req.source, &req.host_id) {
            (BookingSource::Direct, Some(host_id)) => {
                let provider = state.sqlite.get_provider(host_id)?;
                (
                    Some(host_snapshot(&provider)),
                    Some(listing_snapshot(&provider, &req.category)),
                )
            }
            (BookingSource::Direct, None) => {
                return Err(AppError::Validation(
                    "Direct bookings require a host".to_string(),
                ));
            }
            (BookingSource::Marketplace, _) => (None, None),
        };

        let settings = state.sqlite.get_settings()?;
        let booking = state.sqlite.create_booking(&NewBooking {
            source: req.source,
            client_id: req.client_id.clone(),
            host_id: match req.source {
                BookingSource::Direct => req.host_id.clone(),
                BookingSource::Marketplace => None,
            },
            category: req.category.clone(),
            description: req.description.clone(),
            total_amount: req.total_amount,
            client_snapshot,
            host_snapshot,
            listing_snapshot,
            service_lat: req.service_lat,
            service_lng: req.service_lng,
            service_address: req.service_address.clone(),
            validity_days: settings.validity_days,
        })?;

        info!("Created {} booking {} ({})", booking.source, booking.id, booking.status);
        state.publish_change_with("bookings", &booking.id, "created", &booking);
        Ok(booking)
    }

    pub fn get(state: &AppState, id: &str) -> Result<Booking> {
        state.sqlite.get_booking(id)
    }

    pub fn list_for_actor(state: &AppState, actor_id: &str) -> Result<Vec<Booking>> {
        state.sqlite.list_bookings_for_actor(actor_id)
    }

    /// Apply a lifecycle action on behalf of an actor.
    ///
    /// The acting user must be the booking party matching `actor`; System
    /// actions carry no user id. A lost compare-and-swap is reported as an
    /// invalid transition from the status that actually won.
    pub fn transition(
        state: &AppState,
        booking_id: &str,
        action: BookingAction,
        actor: ActorRole,
        actor_id: Option<&str>,
    ) -> Result<Booking> {
        let booking = state.sqlite.get_booking(booking_id)?;
        authorize(&booking, actor, actor_id)?;

        let current = BookingStatus::parse(&booking.status)?;
        let payment_required = booking.total_amount > 0.0;
        let next = next_status(current, action, actor, payment_required)?;

        if !state.sqlite.try_transition_booking(booking_id, current, next)? {
            // Someone else moved the booking first; report against the
            // status that is actually stored now.
            let fresh = state.sqlite.get_booking(booking_id)?;
            return Err(AppError::InvalidTransition(
                fresh.status,
                action.as_str().to_string(),
            ));
        }

        let updated = state.sqlite.get_booking(booking_id)?;
        info!(
            "Booking {} {} -> {} ({})",
            booking_id,
            current.as_str(),
            updated.status,
            action.as_str()
        );
        state.publish_change_with("bookings", booking_id, "updated", &updated);
        Ok(updated)
    }

    /// Submit the single review allowed for a completed booking.
    pub fn submit_review(
        state: &AppState,
        booking_id: &str,
        client_id: &str,
        rating: i64,
        comment: &str,
    ) -> Result<Review> {
        let review = state
            .sqlite
            .create_review(booking_id, client_id, rating, comment)?;
        state.publish_change_with("reviews", &review.id, "created", &review);
        state.publish_change("providers", &review.host_id, "updated");
        Ok(review)
    }
}

fn authorize(booking: &Booking, actor: ActorRole, actor_id: Option<&str>) -> Result<()> {
    let allowed = match actor {
        ActorRole::Client => actor_id == Some(booking.client_id.as_str()),
        ActorRole::Host => actor_id.is_some() && actor_id == booking.host_id.as_deref(),
        ActorRole::System => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::Auth(
            "Acting user is not a party to this booking".to_string(),
        ))
    }
}

fn user_snapshot(user: &User) -> serde_json::Value {
    json!({
        "id": user.id,
        "display_name": user.display_name,
        "role": user.role,
    })
}

pub(crate) fn host_snapshot(provider: &Provider) -> serde_json::Value {
    json!({
        "id": provider.id,
        "user_id": provider.user_id,
        "display_name": provider.display_name,
        "rating": provider.rating,
        "review_count": provider.review_count,
    })
}

pub(crate) fn listing_snapshot(provider: &Provider, category: &str) -> serde_json::Value {
    json!({
        "provider_id": provider.id,
        "category": category,
        "base_price": provider.base_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::NewProvider;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, AppState) {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        state.sqlite.upsert_user("client-1", "Anna", "client").unwrap();
        state.sqlite.upsert_user("client-2", "Piotr", "client").unwrap();
        (dir, state)
    }

    fn seed_host(state: &AppState) -> String {
        state
            .sqlite
            .create_provider(&NewProvider {
                user_id: "host-user-1".to_string(),
                display_name: "Jan Kowalski".to_string(),
                categories: vec!["Hydraulik".to_string()],
                base_price: 150.0,
                lat: 52.4064,
                lng: 16.9252,
            })
            .unwrap()
            .id
    }

    fn direct_request(host_id: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            source: BookingSource::Direct,
            client_id: "client-1".to_string(),
            host_id: Some(host_id.to_string()),
            category: "Hydraulik".to_string(),
            description: "Cieknie kran w kuchni".to_string(),
            total_amount: 200.0,
            service_lat: 52.4064,
            service_lng: 16.9252,
            service_address: "ul. Polwiejska 1, Poznan".to_string(),
        }
    }

    #[test]
    fn test_direct_booking_full_lifecycle() {
        let (_dir, state) = setup();
        let host_id = seed_host(&state);
        let booking = BookingService::create(&state, &direct_request(&host_id)).unwrap();
        assert_eq!(booking.status, "PENDING_APPROVAL");
        assert!(booking.host_snapshot.is_some());

        // Paid booking takes the payment detour on host accept.
        let b = BookingService::transition(
            &state,
            &booking.id,
            BookingAction::Accept,
            ActorRole::Host,
            Some(&host_id),
        )
        .unwrap();
        assert_eq!(b.status, "PENDING_PAYMENT");

        let b = BookingService::transition(
            &state,
            &booking.id,
            BookingAction::MarkPaid,
            ActorRole::System,
            None,
        )
        .unwrap();
        assert_eq!(b.status, "CONFIRMED");

        let b = BookingService::transition(
            &state,
            &booking.id,
            BookingAction::Start,
            ActorRole::Host,
            Some(&host_id),
        )
        .unwrap();
        assert_eq!(b.status, "ACTIVE");

        let b = BookingService::transition(
            &state,
            &booking.id,
            BookingAction::Complete,
            ActorRole::Client,
            Some("client-1"),
        )
        .unwrap();
        assert_eq!(b.status, "COMPLETED");
    }

    #[test]
    fn test_free_booking_skips_payment() {
        let (_dir, state) = setup();
        let host_id = seed_host(&state);
        let mut req = direct_request(&host_id);
        req.total_amount = 0.0;
        let booking = BookingService::create(&state, &req).unwrap();

        let b = BookingService::transition(
            &state,
            &booking.id,
            BookingAction::Accept,
            ActorRole::Host,
            Some(&host_id),
        )
        .unwrap();
        assert_eq!(b.status, "CONFIRMED");
    }

    #[test]
    fn test_wrong_actor_is_rejected() {
        let (_dir, state) = setup();
        let host_id = seed_host(&state);
        let booking = BookingService::create(&state, &direct_request(&host_id)).unwrap();

        // A stranger cannot cancel as the client.
        let result = BookingService::transition(
            &state,
            &booking.id,
            BookingAction::Cancel,
            ActorRole::Client,
            Some("client-2"),
        );
        assert!(matches!(result, Err(AppError::Auth(_))));

        // The client cannot perform the host's accept.
        let result = BookingService::transition(
            &state,
            &booking.id,
            BookingAction::Accept,
            ActorRole::Host,
            Some("client-1"),
        );
        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[test]
    fn test_terminal_status_rejects_actions() {
        let (_dir, state) = setup();
        let host_id = seed_host(&state);
        let booking = BookingService::create(&state, &direct_request(&host_id)).unwrap();
        BookingService::transition(
            &state,
            &booking.id,
            BookingAction::Cancel,
            ActorRole::Client,
            Some("client-1"),
        )
        .unwrap();

        let result = BookingService::transition(
            &state,
            &booking.id,
            BookingAction::Accept,
            ActorRole::Host,
            Some(&host_id),
        );
        assert!(matches!(result, Err(AppError::InvalidTransition(_, _))));
    }

    #[test]
    fn test_direct_booking_requires_host() {
        let (_dir, state) = setup();
        let mut req = direct_request("unused");
        req.host_id = None;
        assert!(matches!(
            BookingService::create(&state, &req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_review_only_after_completion() {
        let (_dir, state) = setup();
        let host_id = seed_host(&state);
        let booking = BookingService::create(&state, &direct_request(&host_id)).unwrap();

        let result = BookingService::submit_review(&state, &booking.id, "client-1", 5, "Super");
        assert!(matches!(result, Err(AppError::InvalidTransition(_, _))));

        for (action, actor, actor_id) in [
            (BookingAction::Accept, ActorRole::Host, Some(host_id.as_str())),
            (BookingAction::MarkPaid, ActorRole::System, None),
            (BookingAction::Start, ActorRole::Host, Some(host_id.as_str())),
            (BookingAction::Complete, ActorRole::Host, Some(host_id.as_str())),
        ] {
            BookingService::transition(&state, &booking.id, action, actor, actor_id).unwrap();
        }

        let review =
            BookingService::submit_review(&state, &booking.id, "client-1", 5, "Super").unwrap();
        assert_eq!(review.rating, 5);
        let provider = state.sqlite.get_provider(&host_id).unwrap();
        assert_eq!(provider.review_count, 1);
    }
}
