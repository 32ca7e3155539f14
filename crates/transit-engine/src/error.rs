//! # Engine Errors
//!
//! What the lifecycle services return.
//!
//! Scan rejections are not errors (see `ScanOutcome`); a scan only errors
//! when the store fails or contention outlasts the retry limit.

use thiserror::Error;
use transit_core::{CoreError, PricingError, QrError, TicketStatus, ValidationError};
use transit_db::DbError;

/// Lifecycle service errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Catalog or input rule violation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Ticket store failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Webhook signature missing or wrong.
    #[error("Webhook signature invalid: {0}")]
    SignatureInvalid(&'static str),

    /// No ticket with this code.
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    /// An admin action needs an active ticket.
    #[error("Ticket {code} is {status:?}")]
    TicketNotActive { code: String, status: TicketStatus },

    /// Assignment target already belongs to someone.
    #[error("Ticket {0} is already assigned")]
    TicketAlreadyAssigned(String),

    /// Concurrent scans kept invalidating each other.
    #[error("Ticket {code} is being validated concurrently, gave up after {attempts} attempts")]
    ScanContention { code: String, attempts: u32 },
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl From<PricingError> for EngineError {
    fn from(err: PricingError) -> Self {
        EngineError::Core(CoreError::Pricing(err))
    }
}

impl From<QrError> for EngineError {
    fn from(err: QrError) -> Self {
        EngineError::Core(CoreError::Qr(err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
