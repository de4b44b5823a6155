//! Amount type
//!
//! Domain primitive for transfer amounts in minor currency units.
//! All amounts are validated at construction time, ensuring invalid values
//! cannot exist in the system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum amount accepted for a single movement (minor units)
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Amount represents a validated amount of money moved in one operation.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum value is [`MAX_AMOUNT`]
///
/// # Example
/// ```
/// use simple_ledger::domain::Amount;
///
/// let amount = Amount::new(250).unwrap();
/// assert_eq!(amount.value(), 250);
/// assert_eq!(amount.debit(), -250);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

/// Errors that can occur when creating an Amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount must be positive (got {0})")]
    NotPositive(i64),

    #[error("amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value <= 0
    /// - `AmountError::Overflow` if value > [`MAX_AMOUNT`]
    pub fn new(value: i64) -> Result<Self, AmountError> {
        if value <= 0 {
            return Err(AmountError::NotPositive(value));
        }

        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    /// Get the underlying value.
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Signed entry amount for the debited side.
    pub fn debit(&self) -> i64 {
        -self.0
    }

    /// Signed entry amount for the credited side.
    pub fn credit(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Amount {
    type Error = AmountError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(100);
        assert_eq!(amount.unwrap().value(), 100);
    }

    #[test]
    fn test_amount_zero_rejected() {
        assert!(matches!(Amount::new(0), Err(AmountError::NotPositive(0))));
    }

    #[test]
    fn test_amount_negative_rejected() {
        assert!(matches!(Amount::new(-5), Err(AmountError::NotPositive(-5))));
    }

    #[test]
    fn test_amount_overflow() {
        assert!(matches!(Amount::new(MAX_AMOUNT + 1), Err(AmountError::Overflow)));
        assert!(Amount::new(MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_debit_and_credit_cancel_out() {
        let amount = Amount::new(30).unwrap();
        assert_eq!(amount.debit() + amount.credit(), 0);
    }

    #[test]
    fn test_amount_deserialize_validates() {
        let ok: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(ok.value(), 42);

        let err = serde_json::from_str::<Amount>("0");
        assert!(err.is_err());
    }
}
