//! # Ticket Codes
//!
//! Human-scannable ticket codes: `TKT-<UTC timestamp>-<8 hex>`.
//!
//! ```text
//! TKT-20250101120000-1A2B3C4D
//!     └──────┬─────┘ └──┬───┘
//!     %Y%m%d%H%M%S    random (UUID v4)
//! ```
//!
//! Uniqueness is enforced by the database (`tickets.code UNIQUE`), not here.
//! The generator is a trait so the store can be driven with a deterministic
//! sequence in tests.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Prefix of every ticket code.
pub const TICKET_CODE_PREFIX: &str = "TKT";

/// Produces ticket codes.
pub trait CodeGenerator: Send + Sync + std::fmt::Debug {
    fn generate(&self, issued_at: DateTime<Utc>) -> String;
}

/// Timestamp plus random suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, issued_at: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        format!(
            "{}-{}-{}",
            TICKET_CODE_PREFIX,
            issued_at.format("%Y%m%d%H%M%S"),
            suffix
        )
    }
}
