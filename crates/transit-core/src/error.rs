//! # Error Types
//!
//! Domain-specific error types for transit-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  transit-core errors (this file)                                       │
//! │  ├── CoreError        - Catalog / issuance rule violations             │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  ├── PricingError     - Malformed zone ladder, bad distance            │
//! │  └── QrError          - Undecodable QR payloads                        │
//! │                                                                         │
//! │  transit-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  transit-engine errors                                                 │
//! │  └── EngineError      - What services return                           │
//! │                                                                         │
//! │  transit-api errors                                                    │
//! │  └── ApiError         - What HTTP clients see                          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → ApiError → Client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scan rejections (already used, expired, ...) are NOT errors. They are
//! ordinary outcomes, see [`crate::scan::ScanRejection`].

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised while preparing an issuance.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No ticket type with this code exists.
    #[error("Ticket type not found: {0}")]
    TicketTypeNotFound(String),

    /// The ticket type exists but is no longer sold.
    #[error("Ticket type {0} is not active")]
    TicketTypeInactive(String),

    /// No line with this id exists.
    #[error("Line not found: {0}")]
    LineNotFound(i64),

    /// No line carries this public number.
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// The line exists but is out of service.
    #[error("Line {0} is not active")]
    LineInactive(i64),

    /// No stop with this id exists.
    #[error("Stop not found: {0}")]
    StopNotFound(i64),

    /// A stop was given that belongs to another line.
    #[error("Stop {stop_id} is not served by line {line_id}")]
    StopNotOnLine { stop_id: i64, line_id: i64 },

    /// A distance-priced ticket type was requested without a line.
    ///
    /// ## When This Occurs
    /// The `SIMPLE` product is priced from the line distance, so the buyer
    /// must say which line they ride.
    #[error("Ticket type {ticket_type} is priced by distance and requires a line")]
    LineRequired { ticket_type: String },

    /// Fare calculation failed.
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    /// QR payload could not be produced or read.
    #[error("QR payload error: {0}")]
    Qr(#[from] QrError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid ticket code, malformed JSON).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Pricing Error
// =============================================================================

/// Zone ladder errors.
///
/// Ladder construction errors are configuration bugs: they are raised once at
/// startup when the ladder is built and abort the process.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// The ladder has no zones at all.
    #[error("Pricing ladder has no zones")]
    EmptyLadder,

    /// Zone bounds are not strictly increasing.
    #[error("Zone {index} upper bound {max_km} km is not above the previous bound {previous_km} km")]
    NotIncreasing {
        index: usize,
        max_km: f64,
        previous_km: f64,
    },

    /// A bounded zone has a negative or non-finite bound.
    #[error("Zone {index} has an invalid upper bound")]
    InvalidBound { index: usize },

    /// A zone price is negative.
    #[error("Zone {index} has a negative price")]
    NegativePrice { index: usize },

    /// The student price is negative.
    #[error("Student price must not be negative")]
    NegativeStudentPrice,

    /// The last zone has an upper bound, so long lines would match nothing.
    #[error("The last pricing zone must have no upper bound")]
    MissingCatchAll,

    /// An unbounded zone appears before the end of the ladder.
    #[error("Zone {index} has no upper bound but is not the last zone")]
    CatchAllNotLast { index: usize },

    /// Distance is negative or not a number.
    #[error("Invalid distance: {0} km")]
    InvalidDistance(f64),
}

// =============================================================================
// QR Error
// =============================================================================

/// QR payload encode/decode failures.
#[derive(Debug, Error)]
pub enum QrError {
    /// Payload is not valid base64.
    #[error("QR payload is not valid base64")]
    NotBase64,

    /// Payload decoded but is not the expected JSON document.
    #[error("QR payload is not a ticket document: {0}")]
    Malformed(String),

    /// Payload is a JSON document of another kind.
    #[error("QR payload has unexpected type '{0}'")]
    WrongKind(String),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
