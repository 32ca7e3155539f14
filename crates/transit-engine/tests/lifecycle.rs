//! End-to-end ticket lifecycle against a real SQLite store.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use transit_core::scan::ScanRejection;
use transit_core::{
    CodeGenerator, CoreError, LineCategory, Money, PaymentMethod, PricingMode, ReceiptStatus,
    TicketStatus, ValidationMethod, ZoneLadder,
};
use transit_db::{Database, DbConfig, NewLine, NewTicket, NewTicketType, TicketFilter};
use transit_engine::{
    BulkGenerationRequest, EngineError, IssuanceLimits, IssuanceService, PaymentEvent,
    PurchaseRequest, ReconciliationService, ScanOutcome, ScanRequest, ScanValidator,
    TicketAdmin, WebhookVerifier,
};

// =============================================================================
// Fixtures
// =============================================================================

struct Catalog {
    line_12: i64,
    line_1: i64,
    student_line: i64,
    stop_on_12: i64,
    stop_on_1: i64,
}

async fn seed(db: &Database) -> Catalog {
    let catalog = db.catalog();

    for (code, price, mode, validity, trips, student) in [
        ("SIMPLE", 200, PricingMode::Distance, Some(24), 1, false),
        ("DAY_PASS", 500, PricingMode::Flat, Some(24), 3, false),
        ("STUDENT", 100, PricingMode::Flat, Some(24), 1, true),
    ] {
        catalog
            .insert_ticket_type(&NewTicketType {
                code: code.into(),
                name: code.into(),
                description: None,
                price: Money::fcfa(price),
                pricing_mode: mode,
                validity_hours: validity,
                max_trips: trips,
                student_discount: student,
            })
            .await
            .unwrap();
    }

    let line = |number: &str, km: f64, category: LineCategory| NewLine {
        line_number: number.into(),
        name: format!("Line {number}"),
        origin: "A".into(),
        destination: "B".into(),
        distance_km: km,
        category,
    };

    let line_12 = catalog.insert_line(&line("12", 12.0, LineCategory::Ordinary)).await.unwrap();
    let line_1 = catalog.insert_line(&line("1", 4.5, LineCategory::Ordinary)).await.unwrap();
    let student = catalog.insert_line(&line("U1", 10.0, LineCategory::Student)).await.unwrap();

    let stop_on_12 = catalog.insert_stop(line_12.id, "Adidogomé", 1).await.unwrap();
    let stop_on_1 = catalog.insert_stop(line_1.id, "Bè", 1).await.unwrap();

    Catalog {
        line_12: line_12.id,
        line_1: line_1.id,
        student_line: student.id,
        stop_on_12: stop_on_12.id,
        stop_on_1: stop_on_1.id,
    }
}

async fn setup() -> (Database, IssuanceService, Catalog) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let catalog = seed(&db).await;
    let issuance = IssuanceService::new(db.clone(), ZoneLadder::standard(), IssuanceLimits::default());
    (db, issuance, catalog)
}

fn purchase(user_id: i64, code: &str, line_id: Option<i64>) -> PurchaseRequest {
    PurchaseRequest {
        user_id,
        ticket_type_code: code.into(),
        line_id,
        stop_from: None,
        stop_to: None,
        quantity: 1,
        payment_method: PaymentMethod::MobileMoney,
        payment_reference: None,
        metadata: serde_json::json!({}),
    }
}

fn scan(code: &str) -> ScanRequest {
    ScanRequest {
        ticket_code: Some(code.into()),
        validator_device_id: Some("bus-12-front".into()),
        ..ScanRequest::default()
    }
}

fn webhook_event(external_id: &str, quantity: i64, amount: i64) -> PaymentEvent {
    serde_json::from_value(serde_json::json!({
        "external_id": external_id,
        "user_id": 42,
        "product_code": "SIMPLE",
        "route_code": "12",
        "quantity": quantity,
        "amount": amount,
        "status": "completed",
        "meta": { "msisdn": "+22890000000" }
    }))
    .unwrap()
}

// =============================================================================
// Purchase & Scan
// =============================================================================

#[tokio::test]
async fn test_purchase_then_scan_until_used() {
    let (db, issuance, catalog) = setup().await;

    let purchase = issuance
        .purchase_ticket(purchase(7, "SIMPLE", Some(catalog.line_12)))
        .await
        .unwrap();

    assert_eq!(purchase.tickets.len(), 1);
    assert_eq!(purchase.unit_price, Money::fcfa(200));
    assert_eq!(purchase.zone_label.as_deref(), Some("<= 20 km"));

    let ticket = &purchase.tickets[0];
    assert_eq!(ticket.price_paid, Money::fcfa(200));
    assert_eq!(ticket.status, TicketStatus::Active);
    assert_eq!(ticket.trips_remaining, 1);
    assert!(ticket.expires_at.is_some());

    let validator = ScanValidator::new(db.clone());

    match validator.validate(scan(&ticket.code)).await.unwrap() {
        ScanOutcome::Validated { ticket, validation } => {
            assert_eq!(ticket.status, TicketStatus::Used);
            assert_eq!(ticket.trips_remaining, 0);
            assert_eq!(validation.method, ValidationMethod::ManualCode);
            assert_eq!(validation.validator_device_id.as_deref(), Some("bus-12-front"));
        }
        other => panic!("expected validation, got {other:?}"),
    }

    let again = validator.validate(scan(&ticket.code)).await.unwrap();
    assert_eq!(again.rejection(), Some(ScanRejection::AlreadyUsed));

    let audit = db.tickets().list_validations(&ticket.id).await.unwrap();
    assert_eq!(audit.len(), 1);
}

#[tokio::test]
async fn test_scan_by_qr_payload() {
    let (db, issuance, catalog) = setup().await;
    let ticket = issuance
        .purchase_ticket(purchase(7, "DAY_PASS", Some(catalog.line_1)))
        .await
        .unwrap()
        .tickets
        .remove(0);

    let outcome = ScanValidator::new(db)
        .validate(ScanRequest {
            qr_payload: Some(ticket.qr_payload.clone()),
            ..ScanRequest::default()
        })
        .await
        .unwrap();

    match outcome {
        ScanOutcome::Validated { ticket, validation } => {
            assert_eq!(ticket.trips_remaining, 2);
            assert_eq!(ticket.status, TicketStatus::Active);
            assert_eq!(validation.method, ValidationMethod::QrScan);
        }
        other => panic!("expected validation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_code_is_not_found() {
    let (db, _, _) = setup().await;
    let outcome = ScanValidator::new(db)
        .validate(scan("TKT-20250101120000-DEADBEEF"))
        .await
        .unwrap();
    assert_eq!(outcome.rejection(), Some(ScanRejection::NotFound));
}

#[tokio::test]
async fn test_expired_ticket_is_rejected_and_persisted() {
    let (db, _, _) = setup().await;
    let day_pass = db
        .catalog()
        .get_ticket_type_by_code("DAY_PASS")
        .await
        .unwrap()
        .unwrap();

    let mut tx = db.begin().await.unwrap();
    let ticket = db
        .tickets()
        .insert_ticket(
            &mut tx,
            &NewTicket {
                user_id: Some(7),
                ticket_type_id: day_pass.id,
                product_code: day_pass.code.clone(),
                line_id: None,
                route_code: None,
                stop_from: None,
                stop_to: None,
                price_paid: Money::fcfa(500),
                expires_at: Some(Utc::now() - Duration::hours(1)),
                trips_remaining: 3,
                payment_method: PaymentMethod::Cash,
                payment_reference: None,
                receipt_id: None,
                metadata: serde_json::json!({}),
            },
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let validator = ScanValidator::new(db.clone());
    let outcome = validator.validate(scan(&ticket.code)).await.unwrap();

    match outcome {
        ScanOutcome::Rejected { rejection, ticket: Some(stored) } => {
            assert_eq!(rejection, ScanRejection::Expired);
            assert_eq!(stored.status, TicketStatus::Expired);
            assert_eq!(stored.trips_remaining, 3);
        }
        other => panic!("expected expiry, got {other:?}"),
    }

    let stored = db.tickets().find_by_code(&ticket.code).await.unwrap().unwrap();
    assert_eq!(stored.status, TicketStatus::Expired);
    assert!(db.tickets().list_validations(&ticket.id).await.unwrap().is_empty());

    let again = validator.validate(scan(&ticket.code)).await.unwrap();
    assert_eq!(again.rejection(), Some(ScanRejection::Expired));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_scans_redeem_once() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DbConfig::new(dir.path().join("scan.db")).max_connections(4))
        .await
        .unwrap();
    let catalog = seed(&db).await;
    let issuance = IssuanceService::new(db.clone(), ZoneLadder::standard(), IssuanceLimits::default());

    let ticket = issuance
        .purchase_ticket(purchase(7, "SIMPLE", Some(catalog.line_12)))
        .await
        .unwrap()
        .tickets
        .remove(0);

    let a = ScanValidator::new(db.clone());
    let b = ScanValidator::new(db.clone());
    let (first, second) = tokio::join!(a.validate(scan(&ticket.code)), b.validate(scan(&ticket.code)));
    let outcomes = [first.unwrap(), second.unwrap()];

    let validated = outcomes.iter().filter(|o| o.is_validated()).count();
    let already_used = outcomes
        .iter()
        .filter(|o| o.rejection() == Some(ScanRejection::AlreadyUsed))
        .count();
    assert_eq!(validated, 1);
    assert_eq!(already_used, 1);

    assert_eq!(db.tickets().list_validations(&ticket.id).await.unwrap().len(), 1);
    let stored = db.tickets().get_by_id(&ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TicketStatus::Used);
    assert_eq!(stored.trips_remaining, 0);

    db.close().await;
}

// =============================================================================
// Purchase Rules
// =============================================================================

#[tokio::test]
async fn test_purchase_rules() {
    let (db, issuance, catalog) = setup().await;

    // Distance pricing needs a line.
    assert!(matches!(
        issuance.purchase_ticket(purchase(7, "SIMPLE", None)).await,
        Err(EngineError::Core(CoreError::LineRequired { .. }))
    ));

    // Flat types keep their face price on any line.
    let pass = issuance
        .purchase_ticket(purchase(7, "DAY_PASS", Some(catalog.line_12)))
        .await
        .unwrap();
    assert_eq!(pass.unit_price, Money::fcfa(500));
    assert_eq!(pass.tickets[0].trips_remaining, 3);

    // Student lines price at the student fare.
    let student = issuance
        .purchase_ticket(purchase(7, "SIMPLE", Some(catalog.student_line)))
        .await
        .unwrap();
    assert_eq!(student.unit_price, Money::fcfa(100));

    // Stops must belong to the line.
    let mut wrong_stop = purchase(7, "SIMPLE", Some(catalog.line_12));
    wrong_stop.stop_from = Some(catalog.stop_on_1);
    assert!(matches!(
        issuance.purchase_ticket(wrong_stop).await,
        Err(EngineError::Core(CoreError::StopNotOnLine { .. }))
    ));

    let mut right_stop = purchase(7, "SIMPLE", Some(catalog.line_12));
    right_stop.stop_from = Some(catalog.stop_on_12);
    let ticket = issuance.purchase_ticket(right_stop).await.unwrap().tickets.remove(0);
    assert_eq!(ticket.stop_from, Some(catalog.stop_on_12));

    // Unknown and inactive types.
    assert!(matches!(
        issuance.purchase_ticket(purchase(7, "NOPE", Some(catalog.line_12))).await,
        Err(EngineError::Core(CoreError::TicketTypeNotFound(_)))
    ));
    db.catalog().set_ticket_type_active("DAY_PASS", false).await.unwrap();
    assert!(matches!(
        issuance.purchase_ticket(purchase(7, "DAY_PASS", None)).await,
        Err(EngineError::Core(CoreError::TicketTypeInactive(_)))
    ));

    // Quantity bounds.
    let mut too_many = purchase(7, "SIMPLE", Some(catalog.line_12));
    too_many.quantity = 51;
    assert!(matches!(
        issuance.purchase_ticket(too_many).await,
        Err(EngineError::Core(CoreError::Validation(_)))
    ));
}

#[tokio::test]
async fn test_multi_ticket_purchase_totals() {
    let (_, issuance, catalog) = setup().await;
    let mut request = purchase(7, "SIMPLE", Some(catalog.line_1));
    request.quantity = 3;

    let purchase = issuance.purchase_ticket(request).await.unwrap();
    assert_eq!(purchase.tickets.len(), 3);
    assert_eq!(purchase.unit_price, Money::fcfa(100));
    assert_eq!(purchase.total, Money::fcfa(300));

    let mut codes: Vec<_> = purchase.tickets.iter().map(|t| t.code.clone()).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 3);
}

// =============================================================================
// Bulk Generation
// =============================================================================

/// Sequential codes, repeating the previous one at position `duplicate_at`.
#[derive(Debug)]
struct CollidingCodes {
    counter: AtomicUsize,
    duplicate_at: usize,
}

impl CodeGenerator for CollidingCodes {
    fn generate(&self, _issued_at: DateTime<Utc>) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let n = if n == self.duplicate_at { n - 1 } else { n };
        format!("TKT-BULK-{n:05}")
    }
}

fn bulk(line_id: i64, quantity: i64) -> BulkGenerationRequest {
    BulkGenerationRequest {
        line_id,
        ticket_type_code: "SIMPLE".into(),
        quantity,
        validity_hours: 24,
        custom_price: None,
        requested_by: Some(1),
    }
}

#[tokio::test]
async fn test_bulk_generation_tolerates_failed_unit() {
    let db = Database::new(DbConfig::in_memory())
        .await
        .unwrap()
        .with_code_generator(Arc::new(CollidingCodes {
            counter: AtomicUsize::new(0),
            duplicate_at: 47,
        }));
    let catalog = seed(&db).await;
    let issuance = IssuanceService::new(db.clone(), ZoneLadder::standard(), IssuanceLimits::default());

    let outcome = issuance
        .generate_tickets_for_line(bulk(catalog.line_12, 100))
        .await
        .unwrap();

    assert_eq!(outcome.requested, 100);
    assert_eq!(outcome.generated(), 99);
    assert!(outcome.is_partial());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].index, 47);
    assert_eq!(outcome.unit_price, Money::fcfa(200));

    // The 99 survivors were committed.
    let stored = db
        .tickets()
        .list_by_payment_reference(&outcome.batch_id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 99);
    assert!(stored.iter().all(|t| t.user_id.is_none()));
    assert!(stored
        .iter()
        .all(|t| t.payment_method == PaymentMethod::AdminGenerated));
}

#[tokio::test]
async fn test_bulk_generation_custom_price_and_limits() {
    let (db, issuance, catalog) = setup().await;

    let mut request = bulk(catalog.line_1, 10);
    request.custom_price = Some(Money::fcfa(0));
    request.validity_hours = 48;
    let outcome = issuance.generate_tickets_for_line(request).await.unwrap();
    assert_eq!(outcome.generated(), 10);
    assert!(!outcome.is_partial());
    assert!(outcome.tickets.iter().all(|t| t.price_paid == Money::fcfa(0)));

    let filter = TicketFilter {
        unassigned_only: true,
        ..TicketFilter::default()
    };
    assert_eq!(db.tickets().list(&filter, 1, 50).await.unwrap().total, 10);

    for (quantity, hours) in [(0, 24), (1001, 24), (10, 0), (10, 8761)] {
        let mut request = bulk(catalog.line_1, quantity);
        request.validity_hours = hours;
        assert!(issuance.generate_tickets_for_line(request).await.is_err());
    }

    assert!(matches!(
        issuance.generate_tickets_for_line(bulk(9999, 10)).await,
        Err(EngineError::Core(CoreError::LineNotFound(9999)))
    ));
}

// =============================================================================
// Payment Reconciliation
// =============================================================================

#[tokio::test]
async fn test_webhook_is_idempotent() {
    let (db, issuance, _) = setup().await;
    let reconciliation = ReconciliationService::new(db.clone(), issuance);

    let first = reconciliation
        .process(webhook_event("psp_tx_001", 2, 400))
        .await
        .unwrap();
    assert!(!first.already_processed);
    assert_eq!(first.tickets.len(), 2);
    assert_eq!(first.receipt.status, ReceiptStatus::Completed);
    for ticket in &first.tickets {
        assert_eq!(ticket.user_id, Some(42));
        assert_eq!(ticket.payment_method, PaymentMethod::PspWebhook);
        assert_eq!(ticket.payment_reference.as_deref(), Some("psp_tx_001"));
        assert_eq!(ticket.metadata["receipt_external_id"], "psp_tx_001");
        assert_eq!(ticket.receipt_id.as_deref(), Some(first.receipt.id.as_str()));
    }

    let second = reconciliation
        .process(webhook_event("psp_tx_001", 2, 400))
        .await
        .unwrap();
    assert!(second.already_processed);
    assert_eq!(second.receipt.id, first.receipt.id);
    assert_eq!(second.tickets.len(), 2);

    let stored = db.tickets().list_by_receipt(&first.receipt.id).await.unwrap();
    assert_eq!(stored.len(), 2);

    let json = serde_json::to_value(&second).unwrap();
    assert_eq!(json["alreadyProcessed"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deliveries_issue_one_batch() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DbConfig::new(dir.path().join("webhook.db")).max_connections(4))
        .await
        .unwrap();
    seed(&db).await;
    let issuance = IssuanceService::new(db.clone(), ZoneLadder::standard(), IssuanceLimits::default());
    let reconciliation = ReconciliationService::new(db.clone(), issuance);

    let (a, b, c) = tokio::join!(
        reconciliation.process(webhook_event("psp_tx_race", 3, 600)),
        reconciliation.process(webhook_event("psp_tx_race", 3, 600)),
        reconciliation.process(webhook_event("psp_tx_race", 3, 600)),
    );
    let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

    let fresh: Vec<_> = outcomes.iter().filter(|o| !o.already_processed).collect();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].tickets.len(), 3);
    assert!(outcomes.iter().all(|o| o.receipt.id == fresh[0].receipt.id));

    let stored = db.tickets().list_by_receipt(&fresh[0].receipt.id).await.unwrap();
    assert_eq!(stored.len(), 3);
    let all = db.tickets().list(&TicketFilter::default(), 1, 100).await.unwrap();
    assert_eq!(all.total, 3);
}

#[tokio::test]
async fn test_non_completed_payments_issue_nothing() {
    let (db, issuance, _) = setup().await;
    let reconciliation = ReconciliationService::new(db.clone(), issuance);

    for status in ["failed", "pending"] {
        let mut event = webhook_event(&format!("psp_{status}"), 1, 200);
        event.status = serde_json::from_value(serde_json::json!(status)).unwrap();

        let outcome = reconciliation.process(event).await.unwrap();
        assert!(outcome.tickets.is_empty());
        assert!(!outcome.already_processed);
    }

    assert!(reconciliation.list_unissued(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_amount_mismatch_still_issues() {
    let (db, issuance, _) = setup().await;
    let reconciliation = ReconciliationService::new(db, issuance);

    let outcome = reconciliation
        .process(webhook_event("psp_underpaid", 1, 150))
        .await
        .unwrap();
    assert_eq!(outcome.tickets.len(), 1);
    assert_eq!(outcome.tickets[0].price_paid, Money::fcfa(200));
}

#[tokio::test]
async fn test_failed_issuance_leaves_unissued_receipt() {
    let (db, issuance, _) = setup().await;
    let reconciliation = ReconciliationService::new(db.clone(), issuance);

    let mut event = webhook_event("psp_bad_route", 1, 200);
    event.route_code = Some("999".into());

    assert!(matches!(
        reconciliation.process(event).await,
        Err(EngineError::Core(CoreError::RouteNotFound(_)))
    ));

    let unissued = reconciliation.list_unissued(10).await.unwrap();
    assert_eq!(unissued.len(), 1);
    assert_eq!(unissued[0].external_id, "psp_bad_route");
}

#[tokio::test]
async fn test_rider_reference_cannot_claim_a_receipt() {
    let (db, issuance, catalog) = setup().await;
    let reconciliation = ReconciliationService::new(db.clone(), issuance.clone());

    let mut event = webhook_event("psp_x", 1, 200);
    event.route_code = Some("999".into());
    assert!(reconciliation.process(event).await.is_err());

    let mut forged = purchase(7, "SIMPLE", Some(catalog.line_12));
    forged.payment_method = PaymentMethod::PspWebhook;
    forged.payment_reference = Some("psp_x".into());
    assert!(matches!(
        issuance.purchase_ticket(forged.clone()).await,
        Err(EngineError::Core(CoreError::Validation(_)))
    ));

    forged.payment_method = PaymentMethod::MobileMoney;
    let rider = issuance.purchase_ticket(forged).await.unwrap();
    assert_eq!(rider.tickets[0].receipt_id, None);

    let unissued = reconciliation.list_unissued(10).await.unwrap();
    assert_eq!(unissued.len(), 1);
    assert_eq!(unissued[0].external_id, "psp_x");

    let duplicate = reconciliation
        .process(webhook_event("psp_x", 1, 200))
        .await
        .unwrap();
    assert!(duplicate.already_processed);
    assert!(duplicate.tickets.is_empty());
}

#[tokio::test]
async fn test_signed_webhook_flow() {
    let verifier = WebhookVerifier::new(Some("whsec_sotral".into()));
    let body = serde_json::to_vec(&serde_json::json!({
        "external_id": "psp_signed",
        "user_id": 42,
        "product_code": "DAY_PASS",
        "amount": 500,
        "status": "completed"
    }))
    .unwrap();

    let signature = verifier.sign(&body).unwrap();
    assert!(verifier.verify(&body, Some(&signature)).is_ok());
    assert!(matches!(
        verifier.verify(&body, Some(&"0".repeat(64))),
        Err(EngineError::SignatureInvalid(_))
    ));

    let (db, issuance, _) = setup().await;
    let event: PaymentEvent = serde_json::from_slice(&body).unwrap();
    assert_eq!(event.quantity, 1);

    let outcome = ReconciliationService::new(db, issuance)
        .process(event)
        .await
        .unwrap();
    assert_eq!(outcome.tickets.len(), 1);
    assert_eq!(outcome.receipt.currency, "FCFA");
}

// =============================================================================
// Admin Lifecycle
// =============================================================================

#[tokio::test]
async fn test_cancel_and_assign() {
    let (db, issuance, catalog) = setup().await;
    let admin = TicketAdmin::new(db.clone());

    let stock = issuance
        .generate_tickets_for_line(bulk(catalog.line_12, 2))
        .await
        .unwrap();
    let first = &stock.tickets[0].code;
    let second = &stock.tickets[1].code;

    let assigned = admin.assign_ticket(first, 42).await.unwrap();
    assert_eq!(assigned.user_id, Some(42));
    assert!(matches!(
        admin.assign_ticket(first, 43).await,
        Err(EngineError::TicketAlreadyAssigned(_))
    ));

    let cancelled = admin.cancel_ticket(second).await.unwrap();
    assert_eq!(cancelled.status, TicketStatus::Cancelled);
    assert!(matches!(
        admin.cancel_ticket(second).await,
        Err(EngineError::TicketNotActive {
            status: TicketStatus::Cancelled,
            ..
        })
    ));

    let outcome = ScanValidator::new(db).validate(scan(second)).await.unwrap();
    assert_eq!(outcome.rejection(), Some(ScanRejection::Cancelled));

    assert!(matches!(
        admin.cancel_ticket("TKT-20250101120000-00000000").await,
        Err(EngineError::TicketNotFound(_))
    ));
}
