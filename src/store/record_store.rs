//! Record Store
//!
//! Typed CRUD primitives over accounts, entries and transfers. Each backend
//! provides two implementations: one bound to an open transaction and one
//! bound to the ambient pool. Neither performs balance arithmetic beyond the
//! single-row `balance + amount` update, nor any cross-record checks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Account, Entry, Transfer};

use super::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAccountsParams {
    pub owner: String,
    pub limit: i64,
    pub offset: i64,
}

/// Atomic `balance = balance + amount` on one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAccountBalanceParams {
    pub id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntriesParams {
    pub account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Transfers where `from_account_id` is the source OR `to_account_id` is the
/// destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Anything that can run ledger queries.
///
/// Methods take `&mut self` so a transactional implementation can hand its
/// connection to each statement in turn.
#[async_trait]
pub trait RecordStore: Send {
    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError>;

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError>;

    /// Read an account and hold its row lock until the transaction ends.
    /// Outside a transaction this degrades to a plain read.
    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError>;

    async fn list_accounts(&mut self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError>;

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError>;

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError>;

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError>;

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer, StoreError>;

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError>;

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError>;
}
