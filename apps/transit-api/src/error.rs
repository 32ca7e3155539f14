//! # API Error Type
//!
//! Every failed request answers with the same envelope:
//!
//! ```json
//! { "success": false, "error": "already_used", "message": "Ticket has already been used" }
//! ```
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Handler → Result<T, ApiError>                                         │
//! │                                                                         │
//! │  ValidationError / CoreError ──┐                                       │
//! │  DbError ──────────────────────┼──► ApiError { status, code, message } │
//! │  EngineError ──────────────────┤          │                            │
//! │  ScanRejection ────────────────┘          ▼                            │
//! │                                     IntoResponse                        │
//! │                                                                         │
//! │  Internal details are logged, clients only see the public message.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};
use transit_core::scan::ScanRejection;
use transit_core::{CoreError, TicketStatus, ValidationError};
use transit_db::DbError;
use transit_engine::EngineError;

/// Wire error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or out-of-range input (400)
    ValidationError,
    /// Unknown ticket, line, type... (404)
    NotFound,
    /// Ticket has no trips left (409)
    AlreadyUsed,
    /// Ticket validity window passed (409)
    Expired,
    /// Ticket was cancelled (409)
    Cancelled,
    /// State conflict, e.g. ticket already assigned (409)
    Conflict,
    /// Webhook signature missing or wrong (401)
    SignatureInvalid,
    /// Missing or invalid bearer token (401)
    Unauthorized,
    /// Authenticated but not allowed (403)
    Forbidden,
    /// Concurrent scans outlasted the retry limit (503)
    ScanContention,
    /// Store unreachable or locked (500)
    DatabaseUnavailable,
    /// Anything else (500)
    InternalError,
}

impl ErrorCode {
    pub const fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyUsed
            | ErrorCode::Expired
            | ErrorCode::Cancelled
            | ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::SignatureInvalid | ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::ScanContention => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseUnavailable | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error returned by handlers.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: ErrorCode,
    message: &'a str,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            status: code.status(),
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden() -> Self {
        ApiError::new(ErrorCode::Forbidden, "Insufficient permissions")
    }

    pub fn internal() -> Self {
        ApiError::new(ErrorCode::InternalError, "Internal server error")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ScanRejection> for ApiError {
    fn from(rejection: ScanRejection) -> Self {
        let code = match rejection {
            ScanRejection::NotFound => ErrorCode::NotFound,
            ScanRejection::AlreadyUsed => ErrorCode::AlreadyUsed,
            ScanRejection::Expired => ErrorCode::Expired,
            ScanRejection::Cancelled => ErrorCode::Cancelled,
        };
        ApiError::new(code, rejection.message())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TicketTypeNotFound(_)
            | CoreError::LineNotFound(_)
            | CoreError::RouteNotFound(_)
            | CoreError::StopNotFound(_) => ApiError::new(ErrorCode::NotFound, err.to_string()),
            CoreError::TicketTypeInactive(_)
            | CoreError::LineInactive(_)
            | CoreError::StopNotOnLine { .. }
            | CoreError::LineRequired { .. }
            | CoreError::Qr(_)
            | CoreError::Validation(_) => ApiError::validation(err.to_string()),
            CoreError::Pricing(e) => {
                error!(error = %e, "Fare calculation failed");
                ApiError::internal()
            }
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                warn!(%message, "Foreign key violation");
                ApiError::validation("Invalid reference")
            }
            DbError::CheckViolation(message) => {
                warn!(%message, "Check constraint violation");
                ApiError::validation("Invalid value")
            }
            DbError::Busy | DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                error!(error = %err, "Database unavailable");
                ApiError::new(ErrorCode::DatabaseUnavailable, "Database unavailable")
            }
            DbError::MigrationFailed(e) | DbError::QueryFailed(e) | DbError::Internal(e) => {
                error!(error = %e, "Database operation failed");
                ApiError::internal()
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Core(e) => e.into(),
            EngineError::Db(e) => e.into(),
            EngineError::SignatureInvalid(reason) => {
                warn!(reason, "Webhook signature rejected");
                ApiError::new(ErrorCode::SignatureInvalid, "Invalid webhook signature")
            }
            EngineError::TicketNotFound(code) => ApiError::not_found("Ticket", &code),
            EngineError::TicketNotActive { code, status } => {
                let error_code = match status {
                    TicketStatus::Used => ErrorCode::AlreadyUsed,
                    TicketStatus::Expired => ErrorCode::Expired,
                    TicketStatus::Cancelled => ErrorCode::Cancelled,
                    TicketStatus::Active => ErrorCode::Conflict,
                };
                ApiError::new(
                    error_code,
                    format!("Ticket {} is {}", code, status.as_str()),
                )
            }
            EngineError::TicketAlreadyAssigned(code) => ApiError::new(
                ErrorCode::Conflict,
                format!("Ticket {} is already assigned", code),
            ),
            EngineError::ScanContention { code, attempts } => {
                warn!(code = %code, attempts, "Scan contention");
                ApiError::new(
                    ErrorCode::ScanContention,
                    "Ticket is being validated elsewhere, retry",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_rejection_statuses() {
        assert_eq!(ApiError::from(ScanRejection::NotFound).status, StatusCode::NOT_FOUND);
        let used = ApiError::from(ScanRejection::AlreadyUsed);
        assert_eq!(used.status, StatusCode::CONFLICT);
        assert_eq!(used.code, ErrorCode::AlreadyUsed);
    }

    #[test]
    fn test_engine_error_mapping() {
        let contention = ApiError::from(EngineError::ScanContention {
            code: "TKT-1".into(),
            attempts: 5,
        });
        assert_eq!(contention.status, StatusCode::SERVICE_UNAVAILABLE);

        let busy = ApiError::from(EngineError::Db(DbError::Busy));
        assert_eq!(busy.code, ErrorCode::DatabaseUnavailable);
        assert_eq!(busy.status, StatusCode::INTERNAL_SERVER_ERROR);

        let signature = ApiError::from(EngineError::SignatureInvalid("Missing signature header"));
        assert_eq!(signature.code, ErrorCode::SignatureInvalid);

        let line = ApiError::from(EngineError::Core(CoreError::LineRequired {
            ticket_type: "SIMPLE".into(),
        }));
        assert_eq!(line.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(DbError::QueryFailed("no such column: secret".into()));
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!err.message.contains("secret"));
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(
            serde_json::to_value(ErrorCode::DatabaseUnavailable).unwrap(),
            "database_unavailable"
        );
        assert_eq!(serde_json::to_value(ErrorCode::AlreadyUsed).unwrap(), "already_used");
    }
}
