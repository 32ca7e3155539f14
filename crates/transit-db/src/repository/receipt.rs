//! # Receipt Repository
//!
//! Payment-provider receipts, keyed by the provider's `external_id`.
//!
//! ## Insert-or-Fetch
//! ```text
//! delivery #1 ── INSERT … ON CONFLICT(external_id) DO NOTHING ── 1 row ──► Created
//! delivery #2 ── INSERT … ON CONFLICT(external_id) DO NOTHING ── 0 rows ─► Existing (re-read)
//! ```
//!
//! The unique index decides which delivery won; there is no
//! application-level lock. Only the `Created` caller issues tickets.

use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::debug;
use transit_core::{Money, PaymentReceipt, ReceiptStatus};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const RECEIPT_COLUMNS: &str =
    "id, external_id, user_id, amount, currency, status, metadata, created_at";

/// Fields of an incoming receipt.
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub external_id: String,
    pub user_id: i64,
    pub amount: Money,
    pub currency: String,
    pub status: ReceiptStatus,
    pub metadata: serde_json::Value,
}

/// Whether [`ReceiptRepository::insert_receipt`] wrote the row.
#[derive(Debug, Clone)]
pub enum ReceiptInsert {
    /// This call created the receipt.
    Created(PaymentReceipt),
    /// A receipt with this external id was already stored.
    Existing(PaymentReceipt),
}

impl ReceiptInsert {
    pub fn receipt(&self) -> &PaymentReceipt {
        match self {
            ReceiptInsert::Created(receipt) | ReceiptInsert::Existing(receipt) => receipt,
        }
    }

    pub fn into_receipt(self) -> PaymentReceipt {
        match self {
            ReceiptInsert::Created(receipt) | ReceiptInsert::Existing(receipt) => receipt,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ReceiptInsert::Created(_))
    }
}

/// Repository for payment receipts.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    /// Creates a new ReceiptRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    /// Stores a receipt once per `external_id`.
    ///
    /// A repeated delivery does not overwrite anything: the stored receipt is
    /// returned as [`ReceiptInsert::Existing`].
    pub async fn insert_receipt(&self, new: &NewReceipt) -> DbResult<ReceiptInsert> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO payment_receipts (
                id, external_id, user_id, amount, currency, status, metadata, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(&new.external_id)
        .bind(new.user_id)
        .bind(new.amount)
        .bind(&new.currency)
        .bind(new.status)
        .bind(Json(&new.metadata))
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(external_id = %new.external_id, receipt_id = %id, "Receipt created");
            return Ok(ReceiptInsert::Created(PaymentReceipt {
                id,
                external_id: new.external_id.clone(),
                user_id: new.user_id,
                amount: new.amount,
                currency: new.currency.clone(),
                status: new.status,
                metadata: new.metadata.clone(),
                created_at: now,
            }));
        }

        debug!(external_id = %new.external_id, "Receipt already stored");
        let existing = self
            .get_by_external_id(&new.external_id)
            .await?
            .ok_or_else(|| DbError::not_found("PaymentReceipt", &new.external_id))?;

        Ok(ReceiptInsert::Existing(existing))
    }

    pub async fn get_by_external_id(&self, external_id: &str) -> DbResult<Option<PaymentReceipt>> {
        let receipt = sqlx::query_as::<_, PaymentReceipt>(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM payment_receipts WHERE external_id = ?"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(receipt)
    }

    /// Completed receipts that have no ticket linked to them.
    ///
    /// These are issuance failures after the receipt was stored and need
    /// operator follow-up.
    pub async fn list_unissued(&self, limit: i64) -> DbResult<Vec<PaymentReceipt>> {
        let receipts = sqlx::query_as::<_, PaymentReceipt>(
            r#"
            SELECT r.id, r.external_id, r.user_id, r.amount, r.currency, r.status,
                   r.metadata, r.created_at
            FROM payment_receipts r
            WHERE r.status = 'completed'
              AND NOT EXISTS (
                  SELECT 1 FROM tickets t WHERE t.receipt_id = r.id
              )
            ORDER BY r.created_at
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
