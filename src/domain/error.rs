//! Domain Error Types
//!
//! Validation failures raised before a request reaches the ledger.

use thiserror::Error;

/// Request-level rule violations
///
/// These are independent of the web and storage layers; the HTTP layer maps
/// every variant to a 400-class response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Currency code is not one we open accounts in
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Account currency differs from the requested currency
    #[error("Account {account_id} currency mismatch: {found} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        expected: String,
        found: String,
    },

    /// Invalid amount (zero, negative, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Transfer to same account
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// Page parameters out of range
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}

impl DomainError {
    /// Create a currency mismatch error
    pub fn currency_mismatch(
        account_id: i64,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::CurrencyMismatch {
            account_id,
            expected: expected.into(),
            found: found.into(),
        }
    }
}
