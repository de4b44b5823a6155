//! Store module
//!
//! Persistence layer: the record store capability, the transaction executor
//! that scopes it, and the PostgreSQL and in-process backends.

mod error;
pub mod executor;
pub mod memory;
pub mod postgres;
mod record_store;

pub use error::StoreError;
pub use executor::{settle, Completion, TransactionExecutor, TxError, TxStage};
pub use memory::{MemoryDatabase, MemoryRecordStore, MemoryTransactionExecutor, TableStats};
pub use postgres::{PgRecordStore, PgTransactionExecutor, PgTxRecordStore};
pub use record_store::{
    AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, CreateTransferParams,
    ListAccountsParams, ListEntriesParams, ListTransfersParams, RecordStore,
};
