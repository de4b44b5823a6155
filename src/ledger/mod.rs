//! Ledger module
//!
//! The money-movement workflow: one transfer, executed as one atomic unit.

mod error;
mod transfer;

pub use error::LedgerError;
pub use transfer::{FundsPolicy, TransferOrchestrator, TransferTxParams, TransferTxResult};
