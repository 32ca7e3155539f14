//! # Money Module
//!
//! Provides the `Money` type for fares, receipts and prices paid.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FCFA HAS NO MINOR UNIT                                                 │
//! │                                                                         │
//! │  A fare is 200 FCFA, never 199.99 FCFA. Every amount in the system is   │
//! │  a whole number of francs stored as i64:                                │
//! │                                                                         │
//! │    zone ladder price ──► ticket.price_paid ──► receipt.amount           │
//! │                                                                         │
//! │  Floating point never touches a price.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use transit_core::money::Money;
//!
//! let fare = Money::fcfa(200);
//! let total = fare.multiply_quantity(3).unwrap();
//! assert_eq!(total.amount(), 600);
//! assert_eq!(total.to_string(), "600 FCFA");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

use crate::DEFAULT_CURRENCY;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole FCFA.
///
/// ## Design Decisions
/// - **i64 (signed)**: paid-vs-expected differences can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Transparent on the wire**: serializes as a bare number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from a whole FCFA amount.
    #[inline]
    pub const fn fcfa(amount: i64) -> Self {
        Money(amount)
    }

    /// Returns the amount in FCFA.
    #[inline]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit fare by a ticket count. `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use transit_core::money::Money;
    ///
    /// let unit = Money::fcfa(150);
    /// assert_eq!(unit.multiply_quantity(4).map(|m| m.amount()), Some(600));
    /// assert_eq!(Money::fcfa(i64::MAX).multiply_quantity(2), None);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(amount) => Some(Money(amount)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, DEFAULT_CURRENCY)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
