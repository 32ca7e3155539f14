//! # Catalog Repository
//!
//! Ticket types, lines and stops. Issuance reads these; only the seed binary
//! and administrative tooling write them.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use transit_core::{Line, LineCategory, Money, PricingMode, Stop, TicketType};

use crate::error::{DbError, DbResult};

const TICKET_TYPE_COLUMNS: &str = "id, code, name, description, price, pricing_mode, \
     validity_hours, max_trips, student_discount, is_active, created_at, updated_at";

const LINE_COLUMNS: &str =
    "id, line_number, name, origin, destination, distance_km, category, is_active, created_at";

const STOP_COLUMNS: &str = "id, line_id, name, sequence";

/// Fields for a new ticket type.
#[derive(Debug, Clone)]
pub struct NewTicketType {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub pricing_mode: PricingMode,
    pub validity_hours: Option<i64>,
    pub max_trips: i64,
    pub student_discount: bool,
}

/// Fields for a new line.
#[derive(Debug, Clone)]
pub struct NewLine {
    pub line_number: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    pub category: LineCategory,
}

/// Repository for catalog reads and writes.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Ticket types
    // =========================================================================

    /// Looks up a ticket type by business code, active or not.
    pub async fn get_ticket_type_by_code(&self, code: &str) -> DbResult<Option<TicketType>> {
        debug!(code = %code, "Getting ticket type by code");

        let ticket_type = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE code = ?"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket_type)
    }

    pub async fn get_ticket_type(&self, id: i64) -> DbResult<Option<TicketType>> {
        let ticket_type = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket_type)
    }

    /// Lists ticket types ordered by code.
    pub async fn list_ticket_types(&self, active_only: bool) -> DbResult<Vec<TicketType>> {
        let types = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types \
             WHERE (? = 0 OR is_active = 1) ORDER BY code"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(types)
    }

    /// Inserts a ticket type.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - code already exists
    pub async fn insert_ticket_type(&self, new: &NewTicketType) -> DbResult<TicketType> {
        debug!(code = %new.code, "Inserting ticket type");
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO ticket_types (
                code, name, description, price, pricing_mode, validity_hours,
                max_trips, student_discount, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&new.code)
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.pricing_mode)
        .bind(new.validity_hours)
        .bind(new.max_trips)
        .bind(new.student_discount)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, new.code.clone()),
            other => other,
        })?
        .last_insert_rowid();

        Ok(TicketType {
            id,
            code: new.code.clone(),
            name: new.name.clone(),
            description: new.description.clone(),
            price: new.price,
            pricing_mode: new.pricing_mode,
            validity_hours: new.validity_hours,
            max_trips: new.max_trips,
            student_discount: new.student_discount,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Takes a ticket type on or off sale.
    pub async fn set_ticket_type_active(&self, code: &str, active: bool) -> DbResult<()> {
        debug!(code = %code, active, "Updating ticket type availability");

        let result = sqlx::query(
            "UPDATE ticket_types SET is_active = ?, updated_at = ? WHERE code = ?",
        )
        .bind(active)
        .bind(Utc::now())
        .bind(code)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TicketType", code));
        }
        Ok(())
    }

    // =========================================================================
    // Lines
    // =========================================================================

    pub async fn get_line(&self, id: i64) -> DbResult<Option<Line>> {
        debug!(line_id = id, "Getting line");

        let line = sqlx::query_as::<_, Line>(&format!(
            "SELECT {LINE_COLUMNS} FROM lines WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(line)
    }

    pub async fn get_line_by_number(&self, line_number: &str) -> DbResult<Option<Line>> {
        let line = sqlx::query_as::<_, Line>(&format!(
            "SELECT {LINE_COLUMNS} FROM lines WHERE line_number = ?"
        ))
        .bind(line_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(line)
    }

    /// Lists lines ordered by line number.
    pub async fn list_lines(&self, active_only: bool) -> DbResult<Vec<Line>> {
        let lines = sqlx::query_as::<_, Line>(&format!(
            "SELECT {LINE_COLUMNS} FROM lines WHERE (? = 0 OR is_active = 1) ORDER BY line_number"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Inserts a line.
    pub async fn insert_line(&self, new: &NewLine) -> DbResult<Line> {
        debug!(line_number = %new.line_number, "Inserting line");
        let now = Utc::now();

        let id = sqlx::query(
            r#"
            INSERT INTO lines (
                line_number, name, origin, destination, distance_km, category,
                is_active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&new.line_number)
        .bind(&new.name)
        .bind(&new.origin)
        .bind(&new.destination)
        .bind(new.distance_km)
        .bind(new.category)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => {
                DbError::duplicate(field, new.line_number.clone())
            }
            other => other,
        })?
        .last_insert_rowid();

        Ok(Line {
            id,
            line_number: new.line_number.clone(),
            name: new.name.clone(),
            origin: new.origin.clone(),
            destination: new.destination.clone(),
            distance_km: new.distance_km,
            category: new.category,
            is_active: true,
            created_at: now,
        })
    }

    // =========================================================================
    // Stops
    // =========================================================================

    pub async fn get_stop(&self, id: i64) -> DbResult<Option<Stop>> {
        let stop = sqlx::query_as::<_, Stop>(&format!(
            "SELECT {STOP_COLUMNS} FROM stops WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stop)
    }

    /// Stops of a line in travel order.
    pub async fn list_stops(&self, line_id: i64) -> DbResult<Vec<Stop>> {
        let stops = sqlx::query_as::<_, Stop>(&format!(
            "SELECT {STOP_COLUMNS} FROM stops WHERE line_id = ? ORDER BY sequence"
        ))
        .bind(line_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(stops)
    }

    /// Adds a stop to a line.
    ///
    /// ## Errors
    /// * `DbError::ForeignKeyViolation` - line doesn't exist
    /// * `DbError::UniqueViolation` - sequence already taken on that line
    pub async fn insert_stop(&self, line_id: i64, name: &str, sequence: i64) -> DbResult<Stop> {
        debug!(line_id, name = %name, sequence, "Inserting stop");

        let id = sqlx::query("INSERT INTO stops (line_id, name, sequence) VALUES (?, ?, ?)")
            .bind(line_id)
            .bind(name)
            .bind(sequence)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Stop {
            id,
            line_id,
            name: name.to_string(),
            sequence,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
