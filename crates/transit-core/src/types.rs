//! # Domain Types
//!
//! Core domain types used throughout the ticketing platform.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog (read-only to issuance)                                        │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   TicketType    │   │      Line       │   │      Stop       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64)       │   │  id (i64)       │   │  id (i64)       │       │
//! │  │  code (SIMPLE)  │   │  line_number    │   │  line_id (FK)   │       │
//! │  │  price          │   │  distance_km    │   │  sequence       │       │
//! │  │  pricing_mode   │   │  category       │   │  name           │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Lifecycle (written only by the ticket store)                           │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Ticket      │   │ PaymentReceipt  │   │TicketValidation │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  code (TKT-…)   │   │  external_id    │   │  ticket_id (FK) │       │
//! │  │  status         │   │  status         │   │  method         │       │
//! │  │  trips_remaining│   │  amount         │   │  validated_at   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Lifecycle entities have:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (ticket `code`, receipt `external_id`) - what humans and
//!   payment providers see

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Ticket Type
// =============================================================================

/// How a ticket type's unit price is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    /// The face price of the ticket type.
    Flat,
    /// Priced from the line distance through the zone ladder.
    Distance,
}

impl Default for PricingMode {
    fn default() -> Self {
        PricingMode::Flat
    }
}

/// A fare product (single trip, day pass, 10-trip carnet, ...).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TicketType {
    pub id: i64,

    /// Business code, e.g. `SIMPLE`, `STUDENT`, `CARNET_10`.
    pub code: String,

    /// Display name.
    pub name: String,

    pub description: Option<String>,

    /// Face price. Ignored for distance-priced types.
    pub price: Money,

    pub pricing_mode: PricingMode,

    /// Validity window after issuance. `None` means the ticket never expires.
    pub validity_hours: Option<i64>,

    /// Trips granted to each issued ticket.
    pub max_trips: i64,

    /// Riders of this type always pay the student fare.
    pub student_discount: bool,

    /// Whether the type is still on sale (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    /// Expiry of a ticket of this type issued at `issued_at`.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.validity_hours
            .map(|hours| issued_at + Duration::hours(hours))
    }
}

// =============================================================================
// Line & Stop
// =============================================================================

/// Fare category of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LineCategory {
    Ordinary,
    /// Student shuttle lines: every rider pays the student fare.
    Student,
}

impl Default for LineCategory {
    fn default() -> Self {
        LineCategory::Ordinary
    }
}

/// A bus line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Line {
    pub id: i64,

    /// Public line number, e.g. `"12"`. Also the QR `route_code`.
    pub line_number: String,

    pub name: String,

    pub origin: String,

    pub destination: String,

    /// End-to-end length in kilometres. Feeds the zone ladder.
    pub distance_km: f64,

    pub category: LineCategory,

    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Line {
    #[inline]
    pub fn is_student_line(&self) -> bool {
        self.category == LineCategory::Student
    }
}

/// A stop served by a line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Stop {
    pub id: i64,
    pub line_id: i64,
    pub name: String,
    /// Position along the line, starting at 1.
    pub sequence: i64,
}

// =============================================================================
// Ticket Status
// =============================================================================

/// Lifecycle state of a ticket.
///
/// ```text
///            scan (trips > 1)
///           ┌──────────┐
///           ▼          │
///   ──► ACTIVE ────────┴──► USED        (last trip redeemed)
///           │
///           ├─────────────► EXPIRED     (scanned after expires_at)
///           │
///           └─────────────► CANCELLED   (admin action)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Active,
    Used,
    Expired,
    Cancelled,
}

impl TicketStatus {
    /// Wire/database spelling.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "active",
            TicketStatus::Used => "used",
            TicketStatus::Expired => "expired",
            TicketStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for TicketStatus {
    fn default() -> Self {
        TicketStatus::Active
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Issued from a payment-provider callback.
    PspWebhook,
    MobileMoney,
    Card,
    Cash,
    /// Bulk stock generated by an administrator, not paid yet.
    AdminGenerated,
}

impl PaymentMethod {
    /// Methods a rider may declare on a direct purchase.
    pub const fn is_direct_purchase(&self) -> bool {
        matches!(
            self,
            PaymentMethod::MobileMoney | PaymentMethod::Card | PaymentMethod::Cash
        )
    }
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::MobileMoney
    }
}

// =============================================================================
// Ticket
// =============================================================================

/// An issued ticket.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Ticket {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Human-scannable code, e.g. `TKT-20250101120000-1A2B3C4D`.
    pub code: String,

    /// Base64 QR document embedded in the printed/displayed ticket.
    pub qr_payload: String,

    /// Owner. `None` for unassigned admin-generated stock.
    pub user_id: Option<i64>,

    pub ticket_type_id: i64,

    pub line_id: Option<i64>,

    pub stop_from: Option<i64>,

    pub stop_to: Option<i64>,

    pub price_paid: Money,

    pub status: TicketStatus,

    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,

    pub trips_remaining: i64,

    pub payment_method: PaymentMethod,

    /// Receipt external id, purchase reference or admin batch id.
    pub payment_reference: Option<String>,

    /// Receipt that paid for this ticket. Only set for webhook issuance.
    pub receipt_id: Option<String>,

    /// Free-form JSON (`receipt_external_id` for webhook-issued tickets).
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    #[ts(type = "unknown")]
    pub metadata: serde_json::Value,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// True when `expires_at` is set and not after `now`.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    /// Unassigned bulk stock has no owner yet.
    #[inline]
    pub fn is_assigned(&self) -> bool {
        self.user_id.is_some()
    }
}

// =============================================================================
// Payment Receipt
// =============================================================================

/// Outcome reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Completed,
    Failed,
    Pending,
}

/// A payment-provider receipt, stored once per `external_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentReceipt {
    pub id: String,

    /// Provider transaction id. The idempotency key.
    pub external_id: String,

    pub user_id: i64,

    pub amount: Money,

    pub currency: String,

    pub status: ReceiptStatus,

    /// Provider metadata, stored verbatim.
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    #[ts(type = "unknown")]
    pub metadata: serde_json::Value,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Ticket Validation
// =============================================================================

/// How the ticket was presented to the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    QrScan,
    ManualCode,
}

impl Default for ValidationMethod {
    fn default() -> Self {
        ValidationMethod::QrScan
    }
}

/// Append-only audit row, one per successful scan.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TicketValidation {
    pub id: String,
    pub ticket_id: String,
    pub line_id: Option<i64>,
    pub stop_id: Option<i64>,
    pub validator_device_id: Option<String>,
    /// Authenticated validator account, when known.
    pub validated_by: Option<i64>,
    pub method: ValidationMethod,
    #[ts(as = "String")]
    pub validated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_type(validity_hours: Option<i64>) -> TicketType {
        let now = Utc::now();
        TicketType {
            id: 1,
            code: "DAY_PASS".to_string(),
            name: "Day pass".to_string(),
            description: None,
            price: Money::fcfa(500),
            pricing_mode: PricingMode::Flat,
            validity_hours,
            max_trips: 10,
            student_discount: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_expires_at_follows_validity_window() {
        let issued = Utc::now();
        assert_eq!(
            ticket_type(Some(24)).expires_at(issued),
            Some(issued + Duration::hours(24))
        );
        assert_eq!(ticket_type(None).expires_at(issued), None);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert_eq!(TicketStatus::Used.as_str(), "used");
        assert_eq!(
            serde_json::to_string(&PaymentMethod::AdminGenerated).unwrap(),
            "\"admin_generated\""
        );
        let method: ValidationMethod = serde_json::from_str("\"manual_code\"").unwrap();
        assert_eq!(method, ValidationMethod::ManualCode);
    }
}
