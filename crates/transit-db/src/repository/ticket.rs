//! # Ticket Repository
//!
//! Tickets and their validation audit trail.
//!
//! ## Compare-and-Swap Redemption
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Scanner A                           Scanner B                          │
//! │  read: trips=1, active               read: trips=1, active              │
//! │  BEGIN                               BEGIN                              │
//! │  UPDATE … SET trips=0, used          UPDATE … SET trips=0, used         │
//! │    WHERE id=? AND trips=1              WHERE id=? AND trips=1           │
//! │      AND status='active'                AND status='active'             │
//! │  → 1 row  (holds write lock)         (waits for write lock)             │
//! │  INSERT ticket_validations           │                                  │
//! │  COMMIT ──────────────────────────►  → 0 rows: ROLLBACK, re-read,       │
//! │                                        decide again → already_used      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional UPDATE is the first statement of the transaction, so
//! SQLite grants the write lock before anything is decided on stale data.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::debug;
use transit_core::code::CodeGenerator;
use transit_core::{
    Money, PaymentMethod, QrPayload, Ticket, TicketStatus, TicketValidation, ValidationMethod,
};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{page_offset, Page};

const TICKET_COLUMNS: &str = "id, code, qr_payload, user_id, ticket_type_id, line_id, \
     stop_from, stop_to, price_paid, status, expires_at, trips_remaining, payment_method, \
     payment_reference, receipt_id, metadata, created_at, updated_at";

const VALIDATION_COLUMNS: &str =
    "id, ticket_id, line_id, stop_id, validator_device_id, validated_by, method, validated_at";

// =============================================================================
// Inputs
// =============================================================================

/// Fields for a ticket about to be issued.
///
/// Code, QR payload, id and timestamps are filled in by
/// [`TicketRepository::insert_ticket`].
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub user_id: Option<i64>,
    pub ticket_type_id: i64,
    /// Ticket type code, embedded in the QR payload.
    pub product_code: String,
    pub line_id: Option<i64>,
    /// Line number, embedded in the QR payload.
    pub route_code: Option<String>,
    pub stop_from: Option<i64>,
    pub stop_to: Option<i64>,
    pub price_paid: Money,
    pub expires_at: Option<DateTime<Utc>>,
    pub trips_remaining: i64,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub receipt_id: Option<String>,
    pub metadata: serde_json::Value,
}

/// Audit row for a successful scan.
#[derive(Debug, Clone, Default)]
pub struct NewValidation {
    pub line_id: Option<i64>,
    pub stop_id: Option<i64>,
    pub validator_device_id: Option<String>,
    pub validated_by: Option<i64>,
    pub method: ValidationMethod,
}

/// Listing filters. Unset fields don't constrain.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub user_id: Option<i64>,
    pub status: Option<TicketStatus>,
    pub line_id: Option<i64>,
    pub ticket_type_id: Option<i64>,
    /// Only admin stock not yet assigned to a user.
    pub unassigned_only: bool,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for ticket database operations.
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: SqlitePool,
    codes: Arc<dyn CodeGenerator>,
}

impl TicketRepository {
    /// Creates a new TicketRepository.
    pub fn new(pool: SqlitePool, codes: Arc<dyn CodeGenerator>) -> Self {
        TicketRepository { pool, codes }
    }

    // =========================================================================
    // Writes (caller-owned transaction)
    // =========================================================================

    /// Issues one ticket on `conn`.
    ///
    /// Generates the code and QR payload, then inserts. A code collision
    /// surfaces as `DbError::UniqueViolation` and is not retried here.
    pub async fn insert_ticket(
        &self,
        conn: &mut SqliteConnection,
        new: &NewTicket,
    ) -> DbResult<Ticket> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let code = self.codes.generate(now);
        let qr_payload = QrPayload::new(
            code.clone(),
            new.user_id,
            new.product_code.clone(),
            new.route_code.clone(),
            now,
        )
        .encode()
        .map_err(|e| DbError::Internal(e.to_string()))?;

        debug!(ticket_id = %id, code = %code, "Inserting ticket");

        sqlx::query(
            r#"
            INSERT INTO tickets (
                id, code, qr_payload, user_id, ticket_type_id, line_id, stop_from, stop_to,
                price_paid, status, expires_at, trips_remaining, payment_method,
                payment_reference, receipt_id, metadata, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&code)
        .bind(&qr_payload)
        .bind(new.user_id)
        .bind(new.ticket_type_id)
        .bind(new.line_id)
        .bind(new.stop_from)
        .bind(new.stop_to)
        .bind(new.price_paid)
        .bind(TicketStatus::Active)
        .bind(new.expires_at)
        .bind(new.trips_remaining)
        .bind(new.payment_method)
        .bind(&new.payment_reference)
        .bind(&new.receipt_id)
        .bind(Json(&new.metadata))
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, code.clone()),
            other => other,
        })?;

        Ok(Ticket {
            id,
            code,
            qr_payload,
            user_id: new.user_id,
            ticket_type_id: new.ticket_type_id,
            line_id: new.line_id,
            stop_from: new.stop_from,
            stop_to: new.stop_to,
            price_paid: new.price_paid,
            status: TicketStatus::Active,
            expires_at: new.expires_at,
            trips_remaining: new.trips_remaining,
            payment_method: new.payment_method,
            payment_reference: new.payment_reference.clone(),
            receipt_id: new.receipt_id.clone(),
            metadata: new.metadata.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Issues one ticket inside a savepoint of the caller's transaction.
    ///
    /// A failed insert rolls back only its own savepoint, so the enclosing
    /// batch can carry on with the next unit.
    pub async fn insert_ticket_isolated(
        &self,
        conn: &mut SqliteConnection,
        new: &NewTicket,
    ) -> DbResult<Ticket> {
        let mut savepoint = conn.begin().await?;

        match self.insert_ticket(&mut savepoint, new).await {
            Ok(ticket) => {
                savepoint.commit().await?;
                Ok(ticket)
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(e)
            }
        }
    }

    /// Redeems a trip if the row still holds the values the caller read.
    ///
    /// Returns `false` when another writer got there first; the caller must
    /// roll back and re-read.
    pub async fn update_on_validation(
        &self,
        conn: &mut SqliteConnection,
        ticket_id: &str,
        expected_trips: i64,
        new_trips: i64,
        new_status: TicketStatus,
    ) -> DbResult<bool> {
        debug!(
            ticket_id = %ticket_id,
            expected_trips,
            new_trips,
            status = new_status.as_str(),
            "Compare-and-swap ticket redemption"
        );

        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET trips_remaining = ?, status = ?, updated_at = ?
            WHERE id = ? AND trips_remaining = ? AND status = 'active'
            "#,
        )
        .bind(new_trips)
        .bind(new_status)
        .bind(Utc::now())
        .bind(ticket_id)
        .bind(expected_trips)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Moves an active ticket to `expired`. Returns `false` if it was no
    /// longer active.
    pub async fn mark_expired(&self, conn: &mut SqliteConnection, ticket_id: &str) -> DbResult<bool> {
        debug!(ticket_id = %ticket_id, "Marking ticket expired");

        let result = sqlx::query(
            "UPDATE tickets SET status = 'expired', updated_at = ? WHERE id = ? AND status = 'active'",
        )
        .bind(Utc::now())
        .bind(ticket_id)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Appends a validation audit row.
    pub async fn record_validation(
        &self,
        conn: &mut SqliteConnection,
        ticket_id: &str,
        validation: &NewValidation,
    ) -> DbResult<TicketValidation> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO ticket_validations (
                id, ticket_id, line_id, stop_id, validator_device_id, validated_by,
                method, validated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(ticket_id)
        .bind(validation.line_id)
        .bind(validation.stop_id)
        .bind(&validation.validator_device_id)
        .bind(validation.validated_by)
        .bind(validation.method)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(TicketValidation {
            id,
            ticket_id: ticket_id.to_string(),
            line_id: validation.line_id,
            stop_id: validation.stop_id,
            validator_device_id: validation.validator_device_id.clone(),
            validated_by: validation.validated_by,
            method: validation.method,
            validated_at: now,
        })
    }

    /// Reads a ticket inside a transaction.
    pub async fn get_by_id_in(
        &self,
        conn: &mut SqliteConnection,
        ticket_id: &str,
    ) -> DbResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?"
        ))
        .bind(ticket_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(ticket)
    }

    // =========================================================================
    // Admin writes
    // =========================================================================

    /// Cancels an active ticket. Returns `false` if it was not active.
    pub async fn cancel(&self, code: &str) -> DbResult<bool> {
        debug!(code = %code, "Cancelling ticket");

        let result = sqlx::query(
            "UPDATE tickets SET status = 'cancelled', updated_at = ? WHERE code = ? AND status = 'active'",
        )
        .bind(Utc::now())
        .bind(code)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Hands unassigned stock to a user. Returns `false` if the ticket
    /// already has an owner or is no longer active.
    pub async fn assign(&self, code: &str, user_id: i64) -> DbResult<bool> {
        debug!(code = %code, user_id, "Assigning ticket");

        let result = sqlx::query(
            r#"
            UPDATE tickets SET user_id = ?, updated_at = ?
            WHERE code = ? AND user_id IS NULL AND status = 'active'
            "#,
        )
        .bind(user_id)
        .bind(Utc::now())
        .bind(code)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Ticket>> {
        debug!(code = %code, "Finding ticket by code");

        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE code = ?"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    pub async fn get_by_id(&self, ticket_id: &str) -> DbResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?"
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    /// Lists tickets newest first.
    pub async fn list(&self, filter: &TicketFilter, page: i64, limit: i64) -> DbResult<Page<Ticket>> {
        debug!(?filter, page, limit, "Listing tickets");

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tickets WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE 1 = 1"));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(page_offset(page, limit));
        let items = select
            .build_query_as::<Ticket>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    /// Tickets issued against a payment reference, oldest first.
    pub async fn list_by_payment_reference(&self, reference: &str) -> DbResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE payment_reference = ? \
             ORDER BY created_at, rowid"
        ))
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    /// Tickets issued for a payment receipt, oldest first.
    pub async fn list_by_receipt(&self, receipt_id: &str) -> DbResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE receipt_id = ? \
             ORDER BY created_at, rowid"
        ))
        .bind(receipt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    /// Audit trail of a ticket, oldest first.
    pub async fn list_validations(&self, ticket_id: &str) -> DbResult<Vec<TicketValidation>> {
        let validations = sqlx::query_as::<_, TicketValidation>(&format!(
            "SELECT {VALIDATION_COLUMNS} FROM ticket_validations WHERE ticket_id = ? \
             ORDER BY validated_at, rowid"
        ))
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(validations)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &TicketFilter) {
    if let Some(user_id) = filter.user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(line_id) = filter.line_id {
        qb.push(" AND line_id = ").push_bind(line_id);
    }
    if let Some(ticket_type_id) = filter.ticket_type_id {
        qb.push(" AND ticket_type_id = ").push_bind(ticket_type_id);
    }
    if filter.unassigned_only {
        qb.push(" AND user_id IS NULL");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
