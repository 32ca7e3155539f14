//! # transit-core: Pure Business Logic for SOTRAL Ticketing
//!
//! This crate holds the rules of the ticket lifecycle as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     SOTRAL Ticketing Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP API (apps/transit-api, axum)                  │   │
//! │  │   /payment/webhook   /tickets/purchase   /tickets/validate      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        transit-engine (issuance, reconciliation, scan)          │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐   ┌───────────▼───────────────────┐   │
//! │  │  ★ transit-core (HERE) ★    │   │  transit-db (SQLite store)    │   │
//! │  │  pricing · scan · qr · code │◄──│  tickets · receipts · catalog │   │
//! │  └─────────────────────────────┘   └───────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (TicketType, Line, Ticket, PaymentReceipt, ...)
//! - [`money`] - Integer FCFA amounts
//! - [`pricing`] - Zone ladder fare calculation
//! - [`scan`] - Scan-time state machine decision
//! - [`qr`] - QR payload encoding
//! - [`code`] - Ticket code generation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use transit_core::money::Money;
//! use transit_core::pricing::ZoneLadder;
//!
//! let ladder = ZoneLadder::standard();
//! let quote = ladder.price_for_distance(12.0, false).unwrap();
//! assert_eq!(quote.price, Money::fcfa(200));
//! ```

pub mod code;
pub mod error;
pub mod money;
pub mod pricing;
pub mod qr;
pub mod scan;
pub mod types;
pub mod validation;

pub use code::{CodeGenerator, RandomCodeGenerator};
pub use error::{CoreError, PricingError, QrError, ValidationError};
pub use money::Money;
pub use pricing::{PriceQuote, PricingZone, ZoneLadder};
pub use qr::QrPayload;
pub use scan::{ScanDecision, ScanRejection};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// The single currency the platform settles in.
pub const DEFAULT_CURRENCY: &str = "FCFA";

/// Maximum tickets a rider can buy in one purchase.
pub const MAX_PURCHASE_QUANTITY: i64 = 50;

/// Default upper bound for one admin bulk generation call.
///
/// Bulk generation runs synchronously inside a single request and a single
/// transaction, so the batch size has to stay bounded.
pub const DEFAULT_MAX_BULK_QUANTITY: i64 = 1000;

/// Longest validity window accepted for generated tickets (one year).
pub const MAX_VALIDITY_HOURS: i64 = 8760;

/// Default fixed student fare.
pub const DEFAULT_STUDENT_PRICE: i64 = 100;

/// Largest page size for ticket listings.
pub const MAX_PAGE_SIZE: i64 = 100;
