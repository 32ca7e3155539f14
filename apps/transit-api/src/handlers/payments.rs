//! Payment provider webhook and reconciliation follow-up.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::{info, warn};
use transit_core::validation::validate_pagination;
use transit_core::PaymentReceipt;
use transit_engine::{PaymentEvent, ReconciliationOutcome, SIGNATURE_HEADER};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::response::{ApiQuery, ApiResponse};
use crate::AppState;

/// `POST /payment/webhook`
///
/// Reads the raw body: the signature covers the exact bytes sent.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ApiResponse<ReconciliationOutcome>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    state.verifier.verify(&body, signature)?;

    let event: PaymentEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Failed to parse payment event");
        ApiError::validation(format!("Invalid payment event: {}", e))
    })?;

    info!(external_id = %event.external_id, status = ?event.status, "Payment event received");
    let outcome = state.reconciliation.process(event).await?;

    let message = if outcome.already_processed {
        "Payment already processed"
    } else {
        "Payment processed"
    };
    Ok(ApiResponse::with_message(outcome, message))
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct UnissuedQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// `GET /admin/payments/unissued`
pub async fn unissued(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<UnissuedQuery>,
) -> ApiResult<ApiResponse<Vec<PaymentReceipt>>> {
    user.require_admin()?;
    validate_pagination(1, query.limit)?;

    let receipts = state.reconciliation.list_unissued(query.limit).await?;
    Ok(ApiResponse::ok(receipts))
}
