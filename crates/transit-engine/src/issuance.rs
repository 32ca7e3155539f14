//! # Ticket Issuance
//!
//! Both ways tickets come into existence.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  purchase_ticket (rider, paid)        generate_tickets_for_line (admin) │
//! │  ───────────────────────────          ───────────────────────────────── │
//! │  resolve type / line / stops          resolve type / line               │
//! │  price: ladder or face price          price: custom or as purchase      │
//! │  BEGIN                                BEGIN                             │
//! │    insert × quantity                    for each unit:                  │
//! │  COMMIT (all or nothing)                  SAVEPOINT → insert            │
//! │                                           ok: RELEASE  err: ROLLBACK TO │
//! │                                       COMMIT (partial batch is normal)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use transit_core::validation::{
    validate_bulk_quantity, validate_price, validate_product_code,
    validate_purchase_payment_method, validate_purchase_quantity, validate_validity_hours,
};
use transit_core::{
    CoreError, Line, Money, PaymentMethod, PriceQuote, PricingMode, Ticket, TicketType,
    ValidationError, ZoneLadder, DEFAULT_MAX_BULK_QUANTITY, MAX_PURCHASE_QUANTITY,
};
use transit_db::{Database, NewTicket};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Requests & Outcomes
// =============================================================================

/// A rider buying tickets.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub user_id: i64,
    pub ticket_type_code: String,
    pub line_id: Option<i64>,
    pub stop_from: Option<i64>,
    pub stop_to: Option<i64>,
    pub quantity: i64,
    /// Mobile money, card or cash.
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub metadata: serde_json::Value,
}

/// Tickets issued by one purchase.
#[derive(Debug, Clone, Serialize)]
pub struct Purchase {
    pub tickets: Vec<Ticket>,
    pub unit_price: Money,
    pub total: Money,
    /// Pricing zone, for distance-priced types.
    pub zone_label: Option<String>,
}

/// An administrator generating unassigned stock for a line.
#[derive(Debug, Clone)]
pub struct BulkGenerationRequest {
    pub line_id: i64,
    pub ticket_type_code: String,
    pub quantity: i64,
    pub validity_hours: i64,
    /// Overrides the computed unit price.
    pub custom_price: Option<Money>,
    pub requested_by: Option<i64>,
}

/// One unit of a batch that could not be inserted.
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    /// 1-based position in the batch.
    pub index: i64,
    pub error: String,
}

/// Result of a bulk generation. Partial batches are a normal outcome.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Payment reference shared by every ticket of the batch.
    pub batch_id: String,
    pub line: Line,
    pub ticket_type: TicketType,
    pub unit_price: Money,
    pub requested: i64,
    pub tickets: Vec<Ticket>,
    pub failures: Vec<UnitFailure>,
}

impl BatchOutcome {
    pub fn generated(&self) -> i64 {
        self.tickets.len() as i64
    }

    pub fn is_partial(&self) -> bool {
        self.generated() < self.requested
    }
}

/// Catalog entries and unit price an issuance runs against.
#[derive(Debug, Clone)]
pub struct ResolvedProduct {
    pub ticket_type: TicketType,
    pub line: Option<Line>,
    pub unit_price: Money,
    pub zone_label: Option<String>,
}

impl ResolvedProduct {
    /// Ticket fields shared by every unit issued for this product.
    pub(crate) fn template(
        &self,
        user_id: Option<i64>,
        payment_method: PaymentMethod,
        payment_reference: Option<String>,
        metadata: serde_json::Value,
    ) -> NewTicket {
        NewTicket {
            user_id,
            ticket_type_id: self.ticket_type.id,
            product_code: self.ticket_type.code.clone(),
            line_id: self.line.as_ref().map(|line| line.id),
            route_code: self.line.as_ref().map(|line| line.line_number.clone()),
            stop_from: None,
            stop_to: None,
            price_paid: self.unit_price,
            expires_at: self.ticket_type.expires_at(Utc::now()),
            trips_remaining: self.ticket_type.max_trips,
            payment_method,
            payment_reference,
            receipt_id: None,
            metadata,
        }
    }
}

// =============================================================================
// Service
// =============================================================================

/// Per-call quantity ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceLimits {
    pub max_purchase_quantity: i64,
    pub max_bulk_quantity: i64,
}

impl Default for IssuanceLimits {
    fn default() -> Self {
        IssuanceLimits {
            max_purchase_quantity: MAX_PURCHASE_QUANTITY,
            max_bulk_quantity: DEFAULT_MAX_BULK_QUANTITY,
        }
    }
}

/// Issues tickets through the ticket store.
#[derive(Debug, Clone)]
pub struct IssuanceService {
    db: Database,
    ladder: Arc<ZoneLadder>,
    limits: IssuanceLimits,
}

impl IssuanceService {
    pub fn new(db: Database, ladder: ZoneLadder, limits: IssuanceLimits) -> Self {
        IssuanceService {
            db,
            ladder: Arc::new(ladder),
            limits,
        }
    }

    pub fn ladder(&self) -> &ZoneLadder {
        &self.ladder
    }

    pub fn limits(&self) -> IssuanceLimits {
        self.limits
    }

    /// Fare for riding `line_id`.
    pub async fn quote(&self, line_id: i64, is_student: bool) -> EngineResult<PriceQuote> {
        let line = self
            .db
            .catalog()
            .get_line(line_id)
            .await?
            .ok_or(CoreError::LineNotFound(line_id))?;

        Ok(self
            .ladder
            .calculate_price(&line, is_student || line.is_student_line())?)
    }

    /// Looks up the ticket type, line and stops, and prices one unit.
    ///
    /// ## Errors
    /// * unknown or inactive ticket type / line
    /// * a stop that is not on the line, or stops without a line
    /// * a distance-priced type without a line
    pub async fn resolve(
        &self,
        ticket_type_code: &str,
        line_id: Option<i64>,
        stop_from: Option<i64>,
        stop_to: Option<i64>,
    ) -> EngineResult<ResolvedProduct> {
        let code = validate_product_code(ticket_type_code)?;
        let catalog = self.db.catalog();

        let ticket_type = catalog
            .get_ticket_type_by_code(&code)
            .await?
            .ok_or_else(|| CoreError::TicketTypeNotFound(code.clone()))?;
        if !ticket_type.is_active {
            return Err(CoreError::TicketTypeInactive(code).into());
        }

        let line = match line_id {
            Some(id) => {
                let line = catalog
                    .get_line(id)
                    .await?
                    .ok_or(CoreError::LineNotFound(id))?;
                if !line.is_active {
                    return Err(CoreError::LineInactive(id).into());
                }
                Some(line)
            }
            None => None,
        };

        for stop_id in [stop_from, stop_to].into_iter().flatten() {
            let stop = catalog
                .get_stop(stop_id)
                .await?
                .ok_or(CoreError::StopNotFound(stop_id))?;
            match &line {
                Some(line) if stop.line_id == line.id => {}
                Some(line) => {
                    return Err(CoreError::StopNotOnLine {
                        stop_id,
                        line_id: line.id,
                    }
                    .into())
                }
                None => return Err(ValidationError::required("line_id").into()),
            }
        }

        let (unit_price, zone_label) = match ticket_type.pricing_mode {
            PricingMode::Distance => {
                let line = line.as_ref().ok_or_else(|| CoreError::LineRequired {
                    ticket_type: code.clone(),
                })?;
                let is_student = ticket_type.student_discount || line.is_student_line();
                let quote = self.ladder.calculate_price(line, is_student)?;
                (quote.price, Some(quote.zone_label))
            }
            PricingMode::Flat => (ticket_type.price, None),
        };

        Ok(ResolvedProduct {
            ticket_type,
            line,
            unit_price,
            zone_label,
        })
    }

    /// Issues `quantity` tickets in one transaction: all or nothing.
    pub(crate) async fn issue(
        &self,
        template: &NewTicket,
        quantity: i64,
    ) -> EngineResult<Vec<Ticket>> {
        let tickets = self.db.tickets();
        let mut tx = self.db.begin().await?;

        let mut issued = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            issued.push(tickets.insert_ticket(&mut tx, template).await?);
        }

        tx.commit().await.map_err(transit_db::DbError::from)?;
        Ok(issued)
    }

    /// Rider purchase: prices the product and issues `quantity` tickets.
    pub async fn purchase_ticket(&self, request: PurchaseRequest) -> EngineResult<Purchase> {
        validate_purchase_quantity(request.quantity, self.limits.max_purchase_quantity)?;
        validate_purchase_payment_method(request.payment_method)?;

        let product = self
            .resolve(
                &request.ticket_type_code,
                request.line_id,
                request.stop_from,
                request.stop_to,
            )
            .await?;

        let mut template = product.template(
            Some(request.user_id),
            request.payment_method,
            request.payment_reference,
            request.metadata,
        );
        template.stop_from = request.stop_from;
        template.stop_to = request.stop_to;

        let total = product
            .unit_price
            .multiply_quantity(request.quantity)
            .ok_or_else(|| ValidationError::invalid_format("quantity", "total price overflows"))?;
        let tickets = self.issue(&template, request.quantity).await?;

        info!(
            user_id = request.user_id,
            ticket_type = %product.ticket_type.code,
            line_id = ?template.line_id,
            quantity = request.quantity,
            total = total.amount(),
            "Tickets purchased"
        );

        Ok(Purchase {
            tickets,
            unit_price: product.unit_price,
            total,
            zone_label: product.zone_label,
        })
    }

    /// Admin bulk generation of unassigned tickets for a line.
    ///
    /// Every unit runs in its own savepoint. A unit that fails is logged and
    /// reported in `failures`; the rest of the batch is kept. Only a failure
    /// of the store itself aborts (and rolls back) the whole batch.
    pub async fn generate_tickets_for_line(
        &self,
        request: BulkGenerationRequest,
    ) -> EngineResult<BatchOutcome> {
        validate_bulk_quantity(request.quantity, self.limits.max_bulk_quantity)?;
        validate_validity_hours(request.validity_hours)?;
        if let Some(price) = request.custom_price {
            validate_price("price_fcfa", price)?;
        }

        let product = self
            .resolve(&request.ticket_type_code, Some(request.line_id), None, None)
            .await?;
        let line = product
            .line
            .clone()
            .ok_or(CoreError::LineNotFound(request.line_id))?;

        let batch_id = Uuid::new_v4().to_string();
        let mut template = product.template(
            None,
            PaymentMethod::AdminGenerated,
            Some(batch_id.clone()),
            serde_json::json!({
                "batch_id": batch_id,
                "requested_by": request.requested_by,
            }),
        );
        template.price_paid = request.custom_price.unwrap_or(product.unit_price);
        template.expires_at = Some(Utc::now() + Duration::hours(request.validity_hours));

        info!(
            batch_id = %batch_id,
            line = %line.line_number,
            ticket_type = %product.ticket_type.code,
            quantity = request.quantity,
            "Starting bulk ticket generation"
        );

        let tickets_repo = self.db.tickets();
        let mut tx = self.db.begin().await?;
        let mut tickets = Vec::with_capacity(request.quantity as usize);
        let mut failures = Vec::new();

        for index in 1..=request.quantity {
            match tickets_repo.insert_ticket_isolated(&mut tx, &template).await {
                Ok(ticket) => tickets.push(ticket),
                Err(e) if e.is_unavailable() => return Err(EngineError::Db(e)),
                Err(e) => {
                    warn!(batch_id = %batch_id, index, error = %e, "Skipping failed ticket");
                    failures.push(UnitFailure {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        tx.commit().await.map_err(transit_db::DbError::from)?;

        let outcome = BatchOutcome {
            batch_id,
            line,
            unit_price: template.price_paid,
            ticket_type: product.ticket_type,
            requested: request.quantity,
            tickets,
            failures,
        };

        if outcome.is_partial() {
            warn!(
                batch_id = %outcome.batch_id,
                generated = outcome.generated(),
                requested = outcome.requested,
                "Partial ticket batch"
            );
        } else {
            info!(
                batch_id = %outcome.batch_id,
                generated = outcome.generated(),
                "Ticket batch generated"
            );
        }

        Ok(outcome)
    }
}
