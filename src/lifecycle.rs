//! Booking lifecycle state machine
//!
//! A booking moves through a fixed status graph and never re-enters a state
//! it has left. The table lives here so the server re-validates every
//! transition regardless of what the UI allowed; the persistence layer
//! additionally guards the write with a compare-and-swap on the current
//! status so racing actors cannot both win.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Booking status vocabulary shared by the direct and marketplace paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Inquiry,
    PendingApproval,
    PendingPayment,
    Confirmed,
    Active,
    Completed,
    CanceledByHost,
    CanceledByGuest,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Inquiry => "INQUIRY",
            BookingStatus::PendingApproval => "PENDING_APPROVAL",
            BookingStatus::PendingPayment => "PENDING_PAYMENT",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Active => "ACTIVE",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::CanceledByHost => "CANCELED_BY_HOST",
            BookingStatus::CanceledByGuest => "CANCELED_BY_GUEST",
            BookingStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "INQUIRY" => Ok(BookingStatus::Inquiry),
            "PENDING_APPROVAL" => Ok(BookingStatus::PendingApproval),
            "PENDING_PAYMENT" => Ok(BookingStatus::PendingPayment),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "ACTIVE" => Ok(BookingStatus::Active),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELED_BY_HOST" => Ok(BookingStatus::CanceledByHost),
            "CANCELED_BY_GUEST" => Ok(BookingStatus::CanceledByGuest),
            "EXPIRED" => Ok(BookingStatus::Expired),
            other => Err(AppError::Validation(format!(
                "unknown booking status: {}",
                other
            ))),
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::CanceledByHost
                | BookingStatus::CanceledByGuest
                | BookingStatus::Expired
        )
    }
}

/// How the booking entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    /// Client requested a specific provider; starts at `PENDING_APPROVAL`.
    Direct,
    /// Open marketplace posting; starts at `INQUIRY` with no host.
    Marketplace,
}

impl BookingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingSource::Direct => "direct",
            BookingSource::Marketplace => "marketplace",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "direct" => Ok(BookingSource::Direct),
            "marketplace" => Ok(BookingSource::Marketplace),
            other => Err(AppError::Validation(format!(
                "unknown booking source: {}",
                other
            ))),
        }
    }

    pub fn initial_status(&self) -> BookingStatus {
        match self {
            BookingSource::Direct => BookingStatus::PendingApproval,
            BookingSource::Marketplace => BookingStatus::Inquiry,
        }
    }
}

/// Actions an actor can attempt on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    /// Client accepts a host's proposal on a marketplace booking.
    AcceptProposal,
    /// Host accepts a direct booking request.
    Accept,
    /// Host declines a direct booking request.
    Decline,
    /// Client cancels before work starts.
    Cancel,
    /// Host starts work.
    Start,
    /// Host or client marks the work done.
    Complete,
    /// Payment confirmation (payment-gateway callback).
    MarkPaid,
    /// Validity window elapsed (expiry sweeper).
    Expire,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::AcceptProposal => "accept_proposal",
            BookingAction::Accept => "accept",
            BookingAction::Decline => "decline",
            BookingAction::Cancel => "cancel",
            BookingAction::Start => "start",
            BookingAction::Complete => "complete",
            BookingAction::MarkPaid => "mark_paid",
            BookingAction::Expire => "expire",
        }
    }
}

/// Who is attempting the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Client,
    Host,
    /// Scheduler or payment callback, never an end user.
    System,
}

/// Resolve the status an action leads to, or reject the pair.
///
/// `payment_required` selects the `PENDING_PAYMENT` detour on host accept:
/// bookings with a non-zero amount go through payment confirmation before
/// they are confirmed.
pub fn next_status(
    current: BookingStatus,
    action: BookingAction,
    actor: ActorRole,
    payment_required: bool,
) -> Result<BookingStatus> {
    use ActorRole::*;
    use BookingAction::*;
    use BookingStatus::*;

    let next = match (current, action, actor) {
        (Inquiry, AcceptProposal, Client) => Some(Confirmed),
        (Inquiry, Cancel, Client) => Some(CanceledByGuest),

        (PendingApproval, Accept, Host) => {
            if payment_required {
                Some(PendingPayment)
            } else {
                Some(Confirmed)
            }
        }
        (PendingApproval, Decline, Host) => Some(CanceledByHost),
        (PendingApproval, Cancel, Client) => Some(CanceledByGuest),

        (PendingPayment, MarkPaid, System) => Some(Confirmed),
        (PendingPayment, Cancel, Client) => Some(CanceledByGuest),

        (Confirmed, Start, Host) => Some(Active),

        (Active, Complete, Host) | (Active, Complete, Client) => Some(Completed),

        (from, Expire, System) if !from.is_terminal() => Some(Expired),

        _ => None,
    };

    next.ok_or_else(|| {
        AppError::InvalidTransition(current.as_str().to_string(), action.as_str().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_happy_path() {
        let s = next_status(
            BookingStatus::PendingApproval,
            BookingAction::Accept,
            ActorRole::Host,
            false,
        )
        .unwrap();
        assert_eq!(s, BookingStatus::Confirmed);

        let s = next_status(s, BookingAction::Start, ActorRole::Host, false).unwrap();
        assert_eq!(s, BookingStatus::Active);

        let s = next_status(s, BookingAction::Complete, ActorRole::Client, false).unwrap();
        assert_eq!(s, BookingStatus::Completed);
        assert!(s.is_terminal());
    }

    #[test]
    fn test_payment_detour() {
        let s = next_status(
            BookingStatus::PendingApproval,
            BookingAction::Accept,
            ActorRole::Host,
            true,
        )
        .unwrap();
        assert_eq!(s, BookingStatus::PendingPayment);

        let s = next_status(s, BookingAction::MarkPaid, ActorRole::System, true).unwrap();
        assert_eq!(s, BookingStatus::Confirmed);
    }

    #[test]
    fn test_marketplace_path() {
        assert_eq!(
            BookingSource::Marketplace.initial_status(),
            BookingStatus::Inquiry
        );
        let s = next_status(
            BookingStatus::Inquiry,
            BookingAction::AcceptProposal,
            ActorRole::Client,
            false,
        )
        .unwrap();
        assert_eq!(s, BookingStatus::Confirmed);
    }

    #[test]
    fn test_actor_gating() {
        // A client may not accept their own request on the host's behalf
        assert!(next_status(
            BookingStatus::PendingApproval,
            BookingAction::Accept,
            ActorRole::Client,
            false,
        )
        .is_err());

        // A host may not cancel as the guest
        assert!(next_status(
            BookingStatus::PendingApproval,
            BookingAction::Cancel,
            ActorRole::Host,
            false,
        )
        .is_err());
    }

    #[test]
    fn test_no_reentry() {
        for status in [
            BookingStatus::Completed,
            BookingStatus::CanceledByHost,
            BookingStatus::CanceledByGuest,
            BookingStatus::Expired,
        ] {
            for action in [
                BookingAction::Accept,
                BookingAction::Cancel,
                BookingAction::Start,
                BookingAction::Complete,
                BookingAction::Expire,
            ] {
                for actor in [ActorRole::Client, ActorRole::Host, ActorRole::System] {
                    assert!(
                        next_status(status, action, actor, false).is_err(),
                        "{:?} accepted {:?} by {:?}",
                        status,
                        action,
                        actor
                    );
                }
            }
        }
    }

    #[test]
    fn test_expire_from_any_non_terminal() {
        for status in [
            BookingStatus::Inquiry,
            BookingStatus::PendingApproval,
            BookingStatus::PendingPayment,
            BookingStatus::Confirmed,
            BookingStatus::Active,
        ] {
            assert_eq!(
                next_status(status, BookingAction::Expire, ActorRole::System, false).unwrap(),
                BookingStatus::Expired
            );
        }
        // Only the system may expire
        assert!(next_status(
            BookingStatus::Confirmed,
            BookingAction::Expire,
            ActorRole::Client,
            false
        )
        .is_err());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            BookingStatus::Inquiry,
            BookingStatus::PendingApproval,
            BookingStatus::PendingPayment,
            BookingStatus::Confirmed,
            BookingStatus::Active,
            BookingStatus::Completed,
            BookingStatus::CanceledByHost,
            BookingStatus::CanceledByGuest,
            BookingStatus::Expired,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(BookingStatus::parse("OPEN").is_err());
    }
}
