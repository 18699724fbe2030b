//! Amounts in integer minor units. No floats anywhere near money.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A non-negative amount in minor units (cents) with an ISO 4217 currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor_units: i64,
    currency: String,
}

impl Money {
    pub fn new(minor_units: i64, currency: impl Into<String>) -> Result<Self, ValidationError> {
        let currency = currency.into();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidCurrency(currency));
        }
        Ok(Self {
            minor_units: minor_units.max(0),
            currency,
        })
    }

    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}.{:02}",
            self.currency,
            self.minor_units / 100,
            self.minor_units % 100
        )
    }
}
