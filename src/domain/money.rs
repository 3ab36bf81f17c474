use crate::error::CommissionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO-style currency code (`SAR`, `USD`, ...). Normalized to uppercase on
/// construction so lookups in the rate table never miss on casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Currency {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl From<&str> for Currency {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monetary value tagged with its currency.
///
/// Arithmetic is only defined within one currency; crossing currencies must
/// go through the rate table explicitly, so a mixed-currency sum cannot
/// happen by accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Same-currency addition; a currency mismatch is a caller bug surfaced
    /// as a validation error rather than a silently wrong figure.
    pub fn checked_add(&self, other: &Money) -> Result<Money, CommissionError> {
        if self.currency != other.currency {
            return Err(CommissionError::validation(format!(
                "currency mismatch: {} + {}",
                self.currency, other.currency
            )));
        }
        Ok(Money::new(self.amount + other.amount, self.currency.clone()))
    }

    /// Multiplies the amount by a plain factor (order count, percentage).
    pub fn scaled(&self, factor: Decimal) -> Money {
        Money::new(self.amount * factor, self.currency.clone())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
