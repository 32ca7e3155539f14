//! # Payment Reconciliation
//!
//! Turns payment-provider webhook events into receipts and tickets, exactly
//! once per provider transaction.
//!
//! ```text
//!   event ──► validate ──► insert_receipt (ON CONFLICT DO NOTHING)
//!                               │
//!              ┌────────────────┴────────────────┐
//!              ▼                                 ▼
//!          Created                           Existing
//!   completed? issue `quantity`       return stored receipt +
//!   tickets referencing the           its tickets,
//!   receipt's external_id             alreadyProcessed = true
//! ```
//!
//! If issuance fails after the receipt row is written, the receipt stays
//! without tickets. It is not retried here; operators find it through
//! [`ReconciliationService::list_unissued`].

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use transit_core::validation::{
    validate_currency, validate_external_id, validate_price, validate_purchase_quantity,
};
use transit_core::{
    CoreError, Money, PaymentMethod, PaymentReceipt, ReceiptStatus, Ticket, DEFAULT_CURRENCY,
};
use transit_db::{Database, NewReceipt, ReceiptInsert};

use crate::error::EngineResult;
use crate::issuance::IssuanceService;

// =============================================================================
// Wire Types
// =============================================================================

fn default_quantity() -> i64 {
    1
}

/// Webhook body sent by the payment provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    /// Provider transaction id, unique per payment.
    pub external_id: String,
    pub user_id: i64,
    /// Ticket type code.
    pub product_code: String,
    /// Public line number, required for distance-priced products.
    #[serde(default)]
    pub route_code: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub amount: Money,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: ReceiptStatus,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// What processing one event produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationOutcome {
    pub receipt: PaymentReceipt,
    pub tickets: Vec<Ticket>,
    /// The event had been processed before; nothing new was issued.
    pub already_processed: bool,
}

// =============================================================================
// Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationService {
    db: Database,
    issuance: IssuanceService,
    default_currency: String,
}

impl ReconciliationService {
    pub fn new(db: Database, issuance: IssuanceService) -> Self {
        ReconciliationService {
            db,
            issuance,
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Currency recorded when an event carries none.
    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    /// Records the event's receipt and, for a first completed delivery,
    /// issues its tickets.
    pub async fn process(&self, event: PaymentEvent) -> EngineResult<ReconciliationOutcome> {
        let external_id = validate_external_id(&event.external_id)?;
        let currency = event
            .currency
            .clone()
            .unwrap_or_else(|| self.default_currency.clone());
        validate_currency(&currency)?;
        validate_price("amount", event.amount)?;
        if event.status == ReceiptStatus::Completed {
            validate_purchase_quantity(event.quantity, self.issuance.limits().max_purchase_quantity)?;
        }

        let inserted = self
            .db
            .receipts()
            .insert_receipt(&NewReceipt {
                external_id: external_id.clone(),
                user_id: event.user_id,
                amount: event.amount,
                currency: currency.to_uppercase(),
                status: event.status,
                metadata: serde_json::json!({
                    "product_code": event.product_code,
                    "route_code": event.route_code,
                    "quantity": event.quantity,
                    "meta": event.meta,
                }),
            })
            .await?;

        let receipt = match inserted {
            ReceiptInsert::Existing(receipt) => {
                info!(external_id = %external_id, "Duplicate payment event, already processed");
                let tickets = self
                    .db
                    .tickets()
                    .list_by_receipt(&receipt.id)
                    .await?;
                return Ok(ReconciliationOutcome {
                    receipt,
                    tickets,
                    already_processed: true,
                });
            }
            ReceiptInsert::Created(receipt) => receipt,
        };

        if receipt.status != ReceiptStatus::Completed {
            info!(
                external_id = %external_id,
                status = ?receipt.status,
                "Payment not completed, no tickets issued"
            );
            return Ok(ReconciliationOutcome {
                receipt,
                tickets: Vec::new(),
                already_processed: false,
            });
        }

        let tickets = match self.issue_for_receipt(&event, &receipt).await {
            Ok(tickets) => tickets,
            Err(e) => {
                error!(
                    external_id = %external_id,
                    receipt_id = %receipt.id,
                    error = %e,
                    "Receipt stored but ticket issuance failed, needs operator follow-up"
                );
                return Err(e);
            }
        };

        info!(
            external_id = %external_id,
            user_id = receipt.user_id,
            tickets = tickets.len(),
            "Payment reconciled"
        );

        Ok(ReconciliationOutcome {
            receipt,
            tickets,
            already_processed: false,
        })
    }

    async fn issue_for_receipt(
        &self,
        event: &PaymentEvent,
        receipt: &PaymentReceipt,
    ) -> EngineResult<Vec<Ticket>> {
        let line_id = match event.route_code.as_deref().map(str::trim) {
            Some(route) if !route.is_empty() => {
                let line = self
                    .db
                    .catalog()
                    .get_line_by_number(route)
                    .await?
                    .ok_or_else(|| CoreError::RouteNotFound(route.to_string()))?;
                Some(line.id)
            }
            _ => None,
        };

        let product = self
            .issuance
            .resolve(&event.product_code, line_id, None, None)
            .await?;

        let expected = product.unit_price.multiply_quantity(event.quantity);
        if expected != Some(receipt.amount) {
            warn!(
                external_id = %receipt.external_id,
                paid = receipt.amount.amount(),
                expected = ?expected.map(|m| m.amount()),
                "Paid amount differs from computed price"
            );
        }

        let mut template = product.template(
            Some(receipt.user_id),
            PaymentMethod::PspWebhook,
            Some(receipt.external_id.clone()),
            serde_json::json!({
                "receipt_external_id": receipt.external_id,
                "receipt_id": receipt.id,
            }),
        );
        template.receipt_id = Some(receipt.id.clone());

        self.issuance.issue(&template, event.quantity).await
    }

    /// Completed receipts that never got their tickets.
    pub async fn list_unissued(&self, limit: i64) -> EngineResult<Vec<PaymentReceipt>> {
        Ok(self.db.receipts().list_unissued(limit).await?)
    }
}
