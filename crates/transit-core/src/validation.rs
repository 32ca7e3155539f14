//! # Validation Module
//!
//! Input validation rules applied before any service touches the store.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (axum Json<T>)                                │
//! │  └── Type validation (deserialization) → validation_error              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Services (transit-engine)                                    │
//! │  └── THIS MODULE: ranges, formats, allowed values                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE(tickets.code), UNIQUE(payment_receipts.external_id)        │
//! │  ├── CHECK(trips_remaining >= 0)                                       │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use transit_core::validation::{validate_purchase_quantity, validate_ticket_code};
//! use transit_core::MAX_PURCHASE_QUANTITY;
//!
//! let code = validate_ticket_code("  TKT-20250101120000-1A2B3C4D ").unwrap();
//! assert_eq!(code, "TKT-20250101120000-1A2B3C4D");
//! assert!(validate_purchase_quantity(0, MAX_PURCHASE_QUANTITY).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::PaymentMethod;
use crate::{DEFAULT_CURRENCY, MAX_PAGE_SIZE, MAX_VALIDITY_HOURS};

/// Highest page whose row offset still fits an i64 at the largest page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a ticket code and returns it trimmed.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Letters, digits and hyphens only
pub fn validate_ticket_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("ticket_code"));
    }

    if code.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "ticket_code".to_string(),
            max: 64,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::invalid_format(
            "ticket_code",
            "must contain only letters, numbers and hyphens",
        ));
    }

    Ok(code.to_string())
}

/// Validates a ticket type code (`SIMPLE`, `CARNET_10`).
pub fn validate_product_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::required("product_code"));
    }

    if code.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "product_code".to_string(),
            max: 32,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::invalid_format(
            "product_code",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(code.to_string())
}

/// Validates a payment provider transaction id.
pub fn validate_external_id(external_id: &str) -> ValidationResult<String> {
    let external_id = external_id.trim();

    if external_id.is_empty() {
        return Err(ValidationError::required("external_id"));
    }

    if external_id.len() > 128 {
        return Err(ValidationError::TooLong {
            field: "external_id".to_string(),
            max: 128,
        });
    }

    Ok(external_id.to_string())
}

/// Only the platform currency is accepted.
pub fn validate_currency(currency: &str) -> ValidationResult<()> {
    if currency.trim().eq_ignore_ascii_case(DEFAULT_CURRENCY) {
        Ok(())
    } else {
        Err(ValidationError::NotAllowed {
            field: "currency".to_string(),
            allowed: vec![DEFAULT_CURRENCY.to_string()],
        })
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

fn validate_range(field: &str, value: i64, min: i64, max: i64) -> ValidationResult<()> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        });
    }
    Ok(())
}

/// Tickets per rider purchase: `1..=max`.
pub fn validate_purchase_quantity(quantity: i64, max: i64) -> ValidationResult<()> {
    validate_range("quantity", quantity, 1, max)
}

/// Tickets per admin bulk call: `1..=max`.
pub fn validate_bulk_quantity(quantity: i64, max: i64) -> ValidationResult<()> {
    validate_range("quantity", quantity, 1, max)
}

/// Validity window of generated tickets: `1..=8760` hours.
pub fn validate_validity_hours(hours: i64) -> ValidationResult<()> {
    validate_range("validity_hours", hours, 1, MAX_VALIDITY_HOURS)
}

/// Prices may be zero (free passes) but never negative.
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates listing pagination. `page` is 1-based.
pub fn validate_pagination(page: i64, limit: i64) -> ValidationResult<()> {
    if page < 1 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }
    validate_range("page", page, 1, MAX_PAGE)?;
    validate_range("limit", limit, 1, MAX_PAGE_SIZE)
}

/// Riders pay by mobile money, card or cash. Webhook and admin
/// issuance have their own paths.
pub fn validate_purchase_payment_method(method: PaymentMethod) -> ValidationResult<()> {
    if method.is_direct_purchase() {
        return Ok(());
    }
    Err(ValidationError::NotAllowed {
        field: "payment_method".to_string(),
        allowed: vec![
            "mobile_money".to_string(),
            "card".to_string(),
            "cash".to_string(),
        ],
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_PURCHASE_QUANTITY;

    #[test]
    fn test_validate_ticket_code() {
        assert_eq!(
            validate_ticket_code(" TKT-20250101120000-1A2B3C4D\n").unwrap(),
            "TKT-20250101120000-1A2B3C4D"
        );

        assert!(validate_ticket_code("").is_err());
        assert!(validate_ticket_code("   ").is_err());
        assert!(validate_ticket_code("TKT 123").is_err());
        assert!(validate_ticket_code("'; DROP TABLE tickets; --").is_err());
        assert!(validate_ticket_code(&"A".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_product_code() {
        assert!(validate_product_code("SIMPLE").is_ok());
        assert!(validate_product_code("CARNET_10").is_ok());
        assert!(validate_product_code("").is_err());
        assert!(validate_product_code("DAY PASS").is_err());
    }

    #[test]
    fn test_validate_external_id() {
        assert_eq!(validate_external_id(" psp_123 ").unwrap(), "psp_123");
        assert!(validate_external_id("").is_err());
        assert!(validate_external_id(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("FCFA").is_ok());
        assert!(validate_currency("fcfa").is_ok());
        assert!(matches!(
            validate_currency("EUR"),
            Err(ValidationError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_quantities() {
        assert!(validate_purchase_quantity(1, MAX_PURCHASE_QUANTITY).is_ok());
        assert!(validate_purchase_quantity(50, MAX_PURCHASE_QUANTITY).is_ok());
        assert!(validate_purchase_quantity(0, MAX_PURCHASE_QUANTITY).is_err());
        assert!(validate_purchase_quantity(51, MAX_PURCHASE_QUANTITY).is_err());

        assert!(validate_bulk_quantity(1000, 1000).is_ok());
        assert!(validate_bulk_quantity(1001, 1000).is_err());
        assert!(validate_bulk_quantity(-3, 1000).is_err());
    }

    #[test]
    fn test_validate_validity_hours() {
        assert!(validate_validity_hours(1).is_ok());
        assert!(validate_validity_hours(8760).is_ok());
        assert!(validate_validity_hours(0).is_err());
        assert!(validate_validity_hours(8761).is_err());
    }

    #[test]
    fn test_validate_price_and_pagination() {
        assert!(validate_price("price_fcfa", Money::zero()).is_ok());
        assert!(validate_price("price_fcfa", Money::fcfa(-1)).is_err());

        assert!(validate_pagination(1, 20).is_ok());
        assert!(validate_pagination(0, 20).is_err());
        assert!(validate_pagination(1, 101).is_err());
    }

    #[test]
    fn test_pagination_offset_fits_i64() {
        assert!(validate_pagination(MAX_PAGE, MAX_PAGE_SIZE).is_ok());
        assert!((MAX_PAGE - 1).checked_mul(MAX_PAGE_SIZE).is_some());

        assert!(matches!(
            validate_pagination(i64::MAX, 100),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "page"
        ));
        assert!(validate_pagination(MAX_PAGE + 1, 1).is_err());
    }

    #[test]
    fn test_purchase_payment_method() {
        assert!(validate_purchase_payment_method(PaymentMethod::MobileMoney).is_ok());
        assert!(validate_purchase_payment_method(PaymentMethod::Cash).is_ok());
        assert!(matches!(
            validate_purchase_payment_method(PaymentMethod::PspWebhook),
            Err(ValidationError::NotAllowed { .. })
        ));
        assert!(validate_purchase_payment_method(PaymentMethod::AdminGenerated).is_err());
    }
}
