//! Validator scans.

use axum::extract::State;
use transit_core::Ticket;
use transit_engine::{ScanOutcome, ScanRequest};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::response::{ApiJson, ApiResponse};
use crate::AppState;

/// `POST /tickets/validate` and `POST /api/sotral/validate-ticket`
///
/// ## Failures
/// | status | error               | when                                        |
/// |--------|---------------------|---------------------------------------------|
/// | 404    | `not_found`         | unknown code or unreadable QR payload       |
/// | 409    | `already_used`      | no trips left                               |
/// | 409    | `expired`           | validity window passed                      |
/// | 409    | `cancelled`         | ticket was cancelled                        |
/// | 503    | `scan_contention`   | concurrent scans outlasted the retry limit; |
/// |        |                     | nothing was redeemed, the scanner may retry |
/// | 500    | `database_unavailable` | store unreachable                        |
pub async fn validate(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(mut request): ApiJson<ScanRequest>,
) -> ApiResult<ApiResponse<Ticket>> {
    user.require_validator()?;
    request.validated_by = Some(user.user_id);

    match state.scans.validate(request).await? {
        ScanOutcome::Validated { ticket, .. } => {
            let message = if ticket.trips_remaining > 0 {
                format!("Ticket validated, {} trip(s) left", ticket.trips_remaining)
            } else {
                "Ticket validated".to_string()
            };
            Ok(ApiResponse::with_message(ticket, message))
        }
        ScanOutcome::Rejected { rejection, .. } => Err(ApiError::from(rejection)),
    }
}
