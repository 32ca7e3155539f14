//! # Scan Decision
//!
//! The pure half of ticket validation: given the ticket as last read from
//! the store and the current time, decide what the scan does.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  status = cancelled                    ──► Reject(Cancelled)         │
//! │  status = used  OR  trips_remaining≤0  ──► Reject(AlreadyUsed)       │
//! │  status = expired                      ──► Reject(Expired)           │
//! │  expires_at ≤ now                      ──► Expire   (persist, fail)  │
//! │  otherwise                             ──► Redeem   (persist, ok)    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persisting `Expire` and `Redeem` is the store's job and is guarded by a
//! compare-and-swap on the values read here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Ticket, TicketStatus};

/// Why a scan did not redeem a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ScanRejection {
    NotFound,
    AlreadyUsed,
    Expired,
    Cancelled,
}

impl ScanRejection {
    /// Wire error code.
    pub const fn code(&self) -> &'static str {
        match self {
            ScanRejection::NotFound => "not_found",
            ScanRejection::AlreadyUsed => "already_used",
            ScanRejection::Expired => "expired",
            ScanRejection::Cancelled => "cancelled",
        }
    }

    /// Message shown on the validator device.
    pub const fn message(&self) -> &'static str {
        match self {
            ScanRejection::NotFound => "Ticket not found",
            ScanRejection::AlreadyUsed => "Ticket has already been used",
            ScanRejection::Expired => "Ticket has expired",
            ScanRejection::Cancelled => "Ticket has been cancelled",
        }
    }
}

/// What a scan should do to the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    /// Terminal state, nothing to persist.
    Reject(ScanRejection),
    /// Validity window has passed: persist `expired`, then reject.
    Expire,
    /// Consume one trip.
    Redeem {
        trips_remaining: i64,
        status: TicketStatus,
    },
}

/// Decides the scan outcome for `ticket` at `now`.
pub fn decide(ticket: &Ticket, now: DateTime<Utc>) -> ScanDecision {
    match ticket.status {
        TicketStatus::Cancelled => return ScanDecision::Reject(ScanRejection::Cancelled),
        TicketStatus::Used => return ScanDecision::Reject(ScanRejection::AlreadyUsed),
        TicketStatus::Expired => return ScanDecision::Reject(ScanRejection::Expired),
        TicketStatus::Active => {}
    }

    if ticket.trips_remaining <= 0 {
        return ScanDecision::Reject(ScanRejection::AlreadyUsed);
    }

    if ticket.is_past_expiry(now) {
        return ScanDecision::Expire;
    }

    let trips_remaining = ticket.trips_remaining - 1;
    let status = if trips_remaining <= 0 {
        TicketStatus::Used
    } else {
        TicketStatus::Active
    };

    ScanDecision::Redeem {
        trips_remaining,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::PaymentMethod;
    use chrono::Duration;

    fn ticket(status: TicketStatus, trips: i64, expires_at: Option<DateTime<Utc>>) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: "t-1".to_string(),
            code: "TKT-20250101120000-AAAAAAAA".to_string(),
            qr_payload: String::new(),
            user_id: Some(1),
            ticket_type_id: 1,
            line_id: Some(1),
            stop_from: None,
            stop_to: None,
            price_paid: Money::fcfa(200),
            status,
            expires_at,
            trips_remaining: trips,
            payment_method: PaymentMethod::MobileMoney,
            payment_reference: None,
            receipt_id: None,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_last_trip_marks_used() {
        let now = Utc::now();
        assert_eq!(
            decide(&ticket(TicketStatus::Active, 1, None), now),
            ScanDecision::Redeem {
                trips_remaining: 0,
                status: TicketStatus::Used
            }
        );
    }

    #[test]
    fn test_carnet_stays_active() {
        let now = Utc::now();
        assert_eq!(
            decide(&ticket(TicketStatus::Active, 10, None), now),
            ScanDecision::Redeem {
                trips_remaining: 9,
                status: TicketStatus::Active
            }
        );
    }

    #[test]
    fn test_terminal_states_reject() {
        let now = Utc::now();
        assert_eq!(
            decide(&ticket(TicketStatus::Cancelled, 1, None), now),
            ScanDecision::Reject(ScanRejection::Cancelled)
        );
        assert_eq!(
            decide(&ticket(TicketStatus::Used, 0, None), now),
            ScanDecision::Reject(ScanRejection::AlreadyUsed)
        );
        assert_eq!(
            decide(&ticket(TicketStatus::Expired, 3, None), now),
            ScanDecision::Reject(ScanRejection::Expired)
        );
    }

    #[test]
    fn test_active_without_trips_is_already_used() {
        assert_eq!(
            decide(&ticket(TicketStatus::Active, 0, None), Utc::now()),
            ScanDecision::Reject(ScanRejection::AlreadyUsed)
        );
    }

    #[test]
    fn test_past_expiry_expires_even_with_trips_left() {
        let now = Utc::now();
        let expired = ticket(TicketStatus::Active, 5, Some(now - Duration::minutes(1)));
        assert_eq!(decide(&expired, now), ScanDecision::Expire);

        let valid = ticket(TicketStatus::Active, 5, Some(now + Duration::hours(1)));
        assert!(matches!(decide(&valid, now), ScanDecision::Redeem { .. }));
    }

    #[test]
    fn test_rejection_codes() {
        assert_eq!(ScanRejection::NotFound.code(), "not_found");
        assert_eq!(ScanRejection::AlreadyUsed.code(), "already_used");
        assert_eq!(
            serde_json::to_string(&ScanRejection::AlreadyUsed).unwrap(),
            "\"already_used\""
        );
    }
}
