//! # transit-db: Ticket Store for SOTRAL Ticketing
//!
//! This crate owns every write to tickets, payment receipts and validation
//! audit rows. It uses SQLite through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ticketing Data Flow                              │
//! │                                                                         │
//! │  transit-engine (issue, reconcile, scan)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     transit-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ CatalogRepo    │    │ 001_initial_ │  │   │
//! │  │   │ SqlitePool    │◄───│ TicketRepo     │    │  schema.sql  │  │   │
//! │  │   │ CodeGenerator │    │ ReceiptRepo    │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (DATABASE_PATH)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use transit_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("transit.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let ticket = db.tickets().insert_ticket(&mut tx, &new_ticket).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::catalog::{CatalogRepository, NewLine, NewTicketType};
pub use repository::receipt::{NewReceipt, ReceiptInsert, ReceiptRepository};
pub use repository::ticket::{NewTicket, NewValidation, TicketFilter, TicketRepository};
pub use repository::Page;
