//! Monetary amount value object.
//!
//! Payment providers report amounts in minor units (cents). This type
//! converts them to exact decimal major units so ledger records never
//! accumulate floating-point drift.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An exact monetary amount with its ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    /// Creates a Money value from a decimal amount in major units.
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: normalize_currency(currency),
        }
    }

    /// Creates a Money value from provider minor units (cents).
    ///
    /// `999` minor units become `9.99` major units.
    pub fn from_minor_units(minor: i64, currency: &str) -> Self {
        Self {
            amount: Decimal::new(minor, 2),
            currency: normalize_currency(currency),
        }
    }

    /// Returns the amount in major units.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns the upper-cased currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Returns true if the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Providers send lower-case codes; the ledger stores upper-case.
/// An absent code falls back to USD.
fn normalize_currency(currency: &str) -> String {
    if currency.is_empty() {
        "USD".to_string()
    } else {
        currency.to_uppercase()
    }
}
