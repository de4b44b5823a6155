//! Domain module
//!
//! Core ledger records and the validated primitives that guard them.

pub mod amount;
pub mod context;
pub mod currency;
pub mod error;
pub mod models;

pub use amount::{Amount, AmountError};
pub use context::OperationContext;
pub use currency::Currency;
pub use error::DomainError;
pub use models::{Account, Entry, Transfer};
