//! Ledger Errors
//!
//! The error taxonomy seen by callers of the transfer orchestrator.

use crate::domain::AmountError;
use crate::store::{StoreError, TxError, TxStage};

/// Errors returned by ledger operations
///
/// Every variant other than `TransactionFailure` at commit and
/// `RollbackFailed` guarantees the store holds no partial transfer.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Referenced account absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected before any transaction began
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Debit would leave the source account negative
    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {amount}")]
    InsufficientFunds {
        account_id: i64,
        balance: i64,
        amount: i64,
    },

    /// Unexpected uniqueness or integrity violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connectivity or driver failure during a statement
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Begin or commit failed
    #[error("Transaction {stage} failed: {source}")]
    TransactionFailure { stage: TxStage, source: StoreError },

    /// Work failed and the rollback that followed failed too
    #[error("{original} (rollback failed: {rollback})")]
    RollbackFailed {
        original: Box<LedgerError>,
        rollback: StoreError,
    },
}

impl LedgerError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Check if retrying the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::TransactionFailure { stage, .. } => *stage == TxStage::Begin,
            _ => false,
        }
    }

    /// Check if the failure came from storage rather than business rules
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::TransactionFailure { .. } | Self::RollbackFailed { .. }
        )
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(what) => Self::Conflict(what),
            err @ StoreError::Unavailable(_) => Self::StoreUnavailable(err),
        }
    }
}

impl From<TxError<LedgerError>> for LedgerError {
    fn from(err: TxError<LedgerError>) -> Self {
        match err {
            TxError::Begin(source) => Self::TransactionFailure {
                stage: TxStage::Begin,
                source,
            },
            TxError::Work(err) => err,
            TxError::Commit(source) => Self::TransactionFailure {
                stage: TxStage::Commit,
                source,
            },
            TxError::Rollback { original, rollback } => Self::RollbackFailed {
                original: Box::new(original),
                rollback,
            },
        }
    }
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
