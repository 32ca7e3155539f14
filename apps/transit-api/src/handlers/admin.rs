//! Administrator endpoints.

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use transit_core::{Line, Money, Ticket};
use transit_engine::{BulkGenerationRequest, UnitFailure};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::response::{ApiJson, ApiResponse};
use crate::AppState;

/// Tickets echoed back from a bulk run.
const SAMPLE_SIZE: usize = 5;

fn default_quantity() -> i64 {
    100
}

fn default_validity_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTicketsBody {
    pub line_id: i64,
    pub ticket_type_code: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default = "default_validity_hours")]
    pub validity_hours: i64,
    #[serde(default, rename = "price_fcfa")]
    pub price_fcfa: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GenerationReport {
    pub batch_id: String,
    pub line: Line,
    pub unit_price: Money,
    pub tickets_generated: i64,
    pub requested: i64,
    pub failures: Vec<UnitFailure>,
    /// First few generated tickets.
    pub tickets: Vec<Ticket>,
}

/// `POST /admin/sotral/generate-tickets`
pub async fn generate_tickets(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<GenerateTicketsBody>,
) -> ApiResult<ApiResponse<GenerationReport>> {
    user.require_admin()?;

    let outcome = state
        .issuance
        .generate_tickets_for_line(BulkGenerationRequest {
            line_id: body.line_id,
            ticket_type_code: body.ticket_type_code,
            quantity: body.quantity,
            validity_hours: body.validity_hours,
            custom_price: body.price_fcfa.map(Money::fcfa),
            requested_by: Some(user.user_id),
        })
        .await?;

    let message = if outcome.is_partial() {
        format!(
            "Generated {} of {} tickets",
            outcome.generated(),
            outcome.requested
        )
    } else {
        format!("Generated {} tickets", outcome.generated())
    };

    let report = GenerationReport {
        tickets_generated: outcome.generated(),
        batch_id: outcome.batch_id,
        line: outcome.line,
        unit_price: outcome.unit_price,
        requested: outcome.requested,
        failures: outcome.failures,
        tickets: outcome.tickets.into_iter().take(SAMPLE_SIZE).collect(),
    };

    Ok(ApiResponse::with_message(report, message))
}

/// `POST /admin/tickets/{code}/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<ApiResponse<Ticket>> {
    user.require_admin()?;

    let ticket = state.admin.cancel_ticket(&code).await?;
    Ok(ApiResponse::with_message(ticket, "Ticket cancelled"))
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    pub user_id: i64,
}

/// `POST /admin/tickets/{code}/assign`
pub async fn assign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
    ApiJson(body): ApiJson<AssignBody>,
) -> ApiResult<ApiResponse<Ticket>> {
    user.require_admin()?;

    let ticket = state.admin.assign_ticket(&code, body.user_id).await?;
    Ok(ApiResponse::with_message(ticket, "Ticket assigned"))
}
