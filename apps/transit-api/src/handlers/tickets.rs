//! Rider ticket endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use transit_core::validation::{validate_pagination, validate_ticket_code};
use transit_core::{PaymentMethod, Ticket, TicketStatus, TicketValidation};
use transit_db::{Page, TicketFilter};
use transit_engine::{Purchase, PurchaseRequest};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::response::{ApiJson, ApiQuery, ApiResponse};
use crate::AppState;

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct PurchaseBody {
    pub ticket_type_code: String,
    #[serde(default)]
    pub line_id: Option<i64>,
    #[serde(default)]
    pub stop_from: Option<i64>,
    #[serde(default)]
    pub stop_to: Option<i64>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    /// `mobile_money`, `card` or `cash`.
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// `POST /tickets/purchase`
pub async fn purchase(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<PurchaseBody>,
) -> ApiResult<(StatusCode, ApiResponse<Purchase>)> {
    let purchase = state
        .issuance
        .purchase_ticket(PurchaseRequest {
            user_id: user.user_id,
            ticket_type_code: body.ticket_type_code,
            line_id: body.line_id,
            stop_from: body.stop_from,
            stop_to: body.stop_to,
            quantity: body.quantity,
            payment_method: body.payment_method,
            payment_reference: None,
            metadata: serde_json::json!({}),
        })
        .await?;

    let message = format!("{} ticket(s) purchased", purchase.tickets.len());
    Ok((StatusCode::CREATED, ApiResponse::with_message(purchase, message)))
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub status: Option<TicketStatus>,
    pub line_id: Option<i64>,
    /// Admin only.
    pub user_id: Option<i64>,
    /// Admin only.
    #[serde(default)]
    pub unassigned: bool,
}

/// `GET /tickets`: own tickets, or any tickets for admins.
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<ApiResponse<Page<Ticket>>> {
    validate_pagination(query.page, query.limit)?;

    let filter = if user.is_admin() {
        TicketFilter {
            user_id: query.user_id,
            status: query.status,
            line_id: query.line_id,
            ticket_type_id: None,
            unassigned_only: query.unassigned,
        }
    } else {
        TicketFilter {
            user_id: Some(user.user_id),
            status: query.status,
            line_id: query.line_id,
            ..TicketFilter::default()
        }
    };

    let page = state.db.tickets().list(&filter, query.page, query.limit).await?;
    Ok(ApiResponse::ok(page))
}

async fn load_ticket(state: &AppState, code: &str) -> ApiResult<Ticket> {
    let code = validate_ticket_code(code)?;
    state
        .db
        .tickets()
        .find_by_code(&code)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket", &code))
}

/// `GET /tickets/{code}`: owner or admin.
pub async fn get_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<ApiResponse<Ticket>> {
    let ticket = load_ticket(&state, &code).await?;

    if !user.is_admin() && ticket.user_id != Some(user.user_id) {
        return Err(ApiError::forbidden());
    }

    Ok(ApiResponse::ok(ticket))
}

/// `GET /tickets/{code}/validations`: admin audit trail.
pub async fn validations(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<ApiResponse<Vec<TicketValidation>>> {
    user.require_admin()?;

    let ticket = load_ticket(&state, &code).await?;
    let validations = state.db.tickets().list_validations(&ticket.id).await?;
    Ok(ApiResponse::ok(validations))
}
