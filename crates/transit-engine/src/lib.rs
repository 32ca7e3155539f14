//! # transit-engine: Ticket Lifecycle Services
//!
//! Issuance, payment reconciliation and scan validation on top of the
//! ticket store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  transit-api handlers                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   transit-engine (THIS CRATE)                   │   │
//! │  │                                                                 │   │
//! │  │  WebhookVerifier ─► ReconciliationService ─► IssuanceService    │   │
//! │  │                                                 ▲               │   │
//! │  │  admin bulk generation ─────────────────────────┘               │   │
//! │  │                                                                 │   │
//! │  │  ScanValidator            TicketAdmin (cancel, assign)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  transit-db (Database handle, repositories)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No service owns background tasks or global state. Each one holds a
//! cloned [`transit_db::Database`] handle.

pub mod admin;
pub mod error;
pub mod issuance;
pub mod reconciliation;
pub mod scan;
pub mod signature;

pub use admin::TicketAdmin;
pub use error::{EngineError, EngineResult};
pub use issuance::{
    BatchOutcome, BulkGenerationRequest, IssuanceLimits, IssuanceService, Purchase,
    PurchaseRequest, ResolvedProduct, UnitFailure,
};
pub use reconciliation::{PaymentEvent, ReconciliationOutcome, ReconciliationService};
pub use scan::{ScanOutcome, ScanRequest, ScanValidator, MAX_SCAN_ATTEMPTS};
pub use signature::{WebhookVerifier, SIGNATURE_HEADER};
