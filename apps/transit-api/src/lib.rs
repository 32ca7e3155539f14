//! # transit-api: SOTRAL Ticketing HTTP Server
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  public     GET  /health                                               │
//! │             GET  /lines   /ticket-types   /pricing/quote               │
//! │                                                                         │
//! │  provider   POST /payment/webhook            (X-PSP-Signature)         │
//! │                                                                         │
//! │  rider      POST /tickets/purchase                                     │
//! │             GET  /tickets   /tickets/{code}                            │
//! │                                                                         │
//! │  validator  POST /tickets/validate   /api/sotral/validate-ticket       │
//! │                                                                         │
//! │  admin      POST /admin/sotral/generate-tickets                        │
//! │             POST /admin/tickets/{code}/cancel   .../assign             │
//! │             GET  /admin/payments/unissued                              │
//! │             GET  /tickets/{code}/validations                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use transit_db::Database;
use transit_engine::{
    IssuanceService, ReconciliationService, ScanValidator, TicketAdmin, WebhookVerifier,
};

use crate::auth::JwtManager;
use crate::config::{AppConfig, ConfigResult};

/// Shared application state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub issuance: IssuanceService,
    pub reconciliation: ReconciliationService,
    pub scans: ScanValidator,
    pub admin: TicketAdmin,
    pub verifier: WebhookVerifier,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    /// Wires the services onto `db` as configured.
    pub fn new(db: Database, config: &AppConfig) -> ConfigResult<Self> {
        let ladder = config.validate()?;
        let issuance = IssuanceService::new(db.clone(), ladder, config.issuance.limits());
        let reconciliation = ReconciliationService::new(db.clone(), issuance.clone())
            .with_default_currency(config.payment.default_currency.clone());

        Ok(AppState {
            scans: ScanValidator::new(db.clone()),
            admin: TicketAdmin::new(db.clone()),
            verifier: WebhookVerifier::new(config.payment.webhook_secret.clone()),
            jwt: Arc::new(JwtManager::new(
                &config.auth.jwt_secret,
                config.auth.token_lifetime_secs,
            )),
            db,
            issuance,
            reconciliation,
        })
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    use handlers::{admin, catalog, health, payments, scan, tickets};

    Router::new()
        .route("/health", get(health::health))
        // Catalog
        .route("/lines", get(catalog::lines))
        .route("/ticket-types", get(catalog::ticket_types))
        .route("/pricing/quote", get(catalog::quote))
        // Payments
        .route("/payment/webhook", post(payments::webhook))
        .route("/admin/payments/unissued", get(payments::unissued))
        // Tickets
        .route("/tickets", get(tickets::list))
        .route("/tickets/purchase", post(tickets::purchase))
        .route("/tickets/{code}", get(tickets::get_ticket))
        .route("/tickets/{code}/validations", get(tickets::validations))
        // Scanning
        .route("/tickets/validate", post(scan::validate))
        .route("/api/sotral/validate-ticket", post(scan::validate))
        // Administration
        .route("/admin/sotral/generate-tickets", post(admin::generate_tickets))
        .route("/admin/tickets/{code}/cancel", post(admin::cancel))
        .route("/admin/tickets/{code}/assign", post(admin::assign))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
