//! # Repository Module
//!
//! Ticket store repositories.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service (transit-engine)                                              │
//! │       │                                                                 │
//! │       │  db.tickets().find_by_code("TKT-…")                            │
//! │       ▼                                                                 │
//! │  ┌────────────────────┐ ┌────────────────────┐ ┌────────────────────┐  │
//! │  │ CatalogRepository  │ │ TicketRepository   │ │ ReceiptRepository  │  │
//! │  │ ticket types,      │ │ insert, CAS update,│ │ insert-or-fetch,   │  │
//! │  │ lines, stops       │ │ audit rows, lists  │ │ unissued listing   │  │
//! │  └────────────────────┘ └────────────────────┘ └────────────────────┘  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Methods that take `conn: &mut SqliteConnection` are meant to run inside a
//! caller-owned transaction; the rest use the pool directly.

use serde::Serialize;

pub mod catalog;
pub mod receipt;
pub mod ticket;

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows matching the filter across all pages.
    pub total: i64,
    /// 1-based page number.
    pub page: i64,
    pub limit: i64,
}

/// Row offset for a 1-based `page`. Saturates instead of overflowing.
pub(crate) fn page_offset(page: i64, limit: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(limit.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(i64::MAX, 100), i64::MAX);
    }
}
