//! simple_ledger Library
//!
//! Re-exports modules for integration testing and the binaries.

pub mod api;
pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod ledger;
pub mod store;
pub mod util;

pub use config::Config;
pub use domain::{Account, Amount, AmountError, Currency, DomainError, Entry, OperationContext, Transfer};
pub use error::{AppError, AppResult};
pub use ledger::{FundsPolicy, LedgerError, TransferOrchestrator, TransferTxParams, TransferTxResult};
