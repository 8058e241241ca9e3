//! Marketplace Job Service
//!
//! Open postings flow: a client publishes a job as an INQUIRY booking,
//! hosts bid with proposals, the client accepts one. Acceptance assigns
//! the host, freezes the snapshots and confirms the booking in a single
//! atomic batch.

use crate::db::sqlite::models::{Booking, Proposal};
use crate::error::{AppError, Result};
use crate::lifecycle::BookingSource;
use crate::services::booking_service::{host_snapshot, listing_snapshot, CreateBookingRequest};
use crate::services::{BookingService, CategoryService};
use crate::state::AppState;
use serde::Deserialize;
use tracing::info;

/// Parameters for publishing an open job
#[derive(Debug, Clone, Deserialize)]
pub struct PublishJobRequest {
    pub client_id: String,
    /// Free-text description; category is suggested from it when absent
    pub description: String,
    pub category: Option<String>,
    pub service_lat: f64,
    pub service_lng: f64,
    pub service_address: String,
}

/// Job service for business logic
pub struct JobService;

impl JobService {
    /// Publish an open job posting. The amount stays zero until a proposal
    /// is accepted.
    pub async fn publish(state: &AppState, req: &PublishJobRequest) -> Result<Booking> {
        let category = match &req.category {
            Some(category) if !category.trim().is_empty() => category.clone(),
            _ => {
                let suggestion = CategoryService::suggest(state, &req.description).await?;
                info!(
                    "Categorized job as {} (confidence {:.2})",
                    suggestion.category, suggestion.confidence
                );
                suggestion.category
            }
        };

        BookingService::create(
            state,
            &CreateBookingRequest {
                source: BookingSource::Marketplace,
                client_id: req.client_id.clone(),
                host_id: None,
                category,
                description: req.description.clone(),
                total_amount: 0.0,
                service_lat: req.service_lat,
                service_lng: req.service_lng,
                service_address: req.service_address.clone(),
            },
        )
    }

    /// Open postings visible to hosts
    pub fn list_open(state: &AppState, category: Option<&str>) -> Result<Vec<Booking>> {
        state.sqlite.list_open_marketplace(category)
    }

    /// Bid on an open posting
    pub fn propose(
        state: &AppState,
        booking_id: &str,
        host_id: &str,
        price: f64,
        message: &str,
    ) -> Result<Proposal> {
        // Only registered providers can bid.
        state.sqlite.get_provider(host_id)?;
        let proposal = state
            .sqlite
            .create_proposal(booking_id, host_id, price, message)?;
        state.publish_change_with("proposals", &proposal.id, "created", &proposal);
        Ok(proposal)
    }

    pub fn list_proposals(state: &AppState, booking_id: &str) -> Result<Vec<Proposal>> {
        state.sqlite.list_proposals(booking_id)
    }

    /// Accept one proposal; the client must own the posting. Sibling
    /// proposals are declined in the same batch.
    pub fn accept_proposal(
        state: &AppState,
        booking_id: &str,
        proposal_id: &str,
        client_id: &str,
    ) -> Result<Booking> {
        let booking = state.sqlite.get_booking(booking_id)?;
        if booking.client_id != client_id {
            return Err(AppError::Auth(
                "Only the posting client can accept a proposal".to_string(),
            ));
        }

        let proposal = state
            .sqlite
            .list_proposals(booking_id)?
            .into_iter()
            .find(|p| p.id == proposal_id)
            .ok_or_else(|| AppError::NotFound(format!("proposal {}", proposal_id)))?;
        let provider = state.sqlite.get_provider(&proposal.host_id)?;

        let booking = state.sqlite.accept_proposal(
            booking_id,
            proposal_id,
            &host_snapshot(&provider),
            &listing_snapshot(&provider, &booking.category),
        )?;

        info!("Proposal {} accepted on booking {}", proposal_id, booking_id);
        state.publish_change_with("bookings", booking_id, "updated", &booking);
        state.publish_change("proposals", proposal_id, "updated");
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::NewProvider;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, AppState, String) {
        let dir = tempdir().unwrap();
        let state = AppState::for_tests(dir.path());
        state.sqlite.upsert_user("client-1", "Anna", "client").unwrap();
        let host_id = state
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
            .id;
        (dir, state, host_id)
    }

    fn publish_request() -> PublishJobRequest {
        PublishJobRequest {
            client_id: "client-1".to_string(),
            description: "Cieknie kran w kuchni".to_string(),
            category: None,
            service_lat: 52.4064,
            service_lng: 16.9252,
            service_address: "ul. Polwiejska 1, Poznan".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_uses_keyword_fallback_category() {
        let (_dir, state, _host) = setup();
        // Offline assistant, so the keyword table decides.
        let booking = JobService::publish(&state, &publish_request()).await.unwrap();
        assert_eq!(booking.status, "INQUIRY");
        assert_eq!(booking.category, "Hydraulik");
        assert!(booking.host_id.is_none());
    }

    #[tokio::test]
    async fn test_proposal_flow() {
        let (_dir, state, host_id) = setup();
        let booking = JobService::publish(&state, &publish_request()).await.unwrap();
        let proposal =
            JobService::propose(&state, &booking.id, &host_id, 180.0, "Moge jutro").unwrap();

        let accepted =
            JobService::accept_proposal(&state, &booking.id, &proposal.id, "client-1").unwrap();
        assert_eq!(accepted.status, "CONFIRMED");
        assert_eq!(accepted.host_id.as_deref(), Some(host_id.as_str()));
        assert_eq!(accepted.total_amount, 180.0);
        assert!(accepted.host_snapshot.is_some());
    }

    #[tokio::test]
    async fn test_only_client_accepts() {
        let (_dir, state, host_id) = setup();
        let booking = JobService::publish(&state, &publish_request()).await.unwrap();
        let proposal =
            JobService::propose(&state, &booking.id, &host_id, 180.0, "Moge jutro").unwrap();

        let result = JobService::accept_proposal(&state, &booking.id, &proposal.id, "intruder");
        assert!(matches!(result, Err(AppError::Auth(_))));
    }

    #[tokio::test]
    async fn test_unregistered_host_cannot_propose() {
        let (_dir, state, _host) = setup();
        let booking = JobService::publish(&state, &publish_request()).await.unwrap();
        let result = JobService::propose(&state, &booking.id, "ghost", 100.0, "hi");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
