//! Public catalog reads and fare quotes.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use transit_core::{Line, Money, Stop, TicketType};

use crate::error::ApiResult;
use crate::response::{ApiQuery, ApiResponse};
use crate::AppState;

/// A line with its ordered stops.
#[derive(Debug, Serialize)]
pub struct LineView {
    #[serde(flatten)]
    pub line: Line,
    pub stops: Vec<Stop>,
}

/// `GET /lines`
pub async fn lines(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<LineView>>> {
    let catalog = state.db.catalog();
    let mut views = Vec::new();

    for line in catalog.list_lines(true).await? {
        let stops = catalog.list_stops(line.id).await?;
        views.push(LineView { line, stops });
    }

    Ok(ApiResponse::ok(views))
}

/// `GET /ticket-types`
pub async fn ticket_types(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<TicketType>>> {
    let types = state.db.catalog().list_ticket_types(true).await?;
    Ok(ApiResponse::ok(types))
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub line_id: i64,
    #[serde(default)]
    pub student: bool,
}

#[derive(Debug, Serialize)]
pub struct QuoteView {
    pub line_id: i64,
    pub price_fcfa: Money,
    pub zone_label: String,
}

/// `GET /pricing/quote?line_id=&student=`
pub async fn quote(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<QuoteQuery>,
) -> ApiResult<ApiResponse<QuoteView>> {
    let quote = state.issuance.quote(query.line_id, query.student).await?;

    Ok(ApiResponse::ok(QuoteView {
        line_id: query.line_id,
        price_fcfa: quote.price,
        zone_label: quote.zone_label,
    }))
}
