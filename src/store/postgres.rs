//! PostgreSQL backend
//!
//! Query functions are generic over `PgExecutor`, so the same SQL runs on a
//! pooled connection or inside an open transaction. `PgRecordStore` and
//! `PgTxRecordStore` are thin `RecordStore` adapters over them.

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{PgConnection, PgExecutor, PgPool};
use std::fmt;

use crate::domain::{Account, Entry, Transfer};

use super::executor::{settle, Completion, TransactionExecutor, TxError};
use super::record_store::{
    AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, CreateTransferParams,
    ListAccountsParams, ListEntriesParams, ListTransfersParams, RecordStore,
};
use super::StoreError;

// =========================================================================
// Queries
// =========================================================================

mod queries {
    use super::*;

    pub async fn create_account<'e, E: PgExecutor<'e>>(
        executor: E,
        params: CreateAccountParams,
    ) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(params.owner)
        .bind(params.balance)
        .bind(params.currency)
        .fetch_one(executor)
        .await?;

        Ok(account)
    }

    pub async fn get_account<'e, E: PgExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| StoreError::not_found("account", id))
    }

    // NO KEY UPDATE: does not block inserts of entries/transfers that only
    // take KEY SHARE on the referenced account.
    pub async fn get_account_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE id = $1
            FOR NO KEY UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| StoreError::not_found("account", id))
    }

    pub async fn list_accounts<'e, E: PgExecutor<'e>>(
        executor: E,
        params: ListAccountsParams,
    ) -> Result<Vec<Account>, StoreError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE owner = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(params.owner)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await?;

        Ok(accounts)
    }

    pub async fn add_account_balance<'e, E: PgExecutor<'e>>(
        executor: E,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance = balance + $2
            WHERE id = $1
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(params.id)
        .bind(params.amount)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| StoreError::not_found("account", params.id))
    }

    pub async fn create_entry<'e, E: PgExecutor<'e>>(
        executor: E,
        params: CreateEntryParams,
    ) -> Result<Entry, StoreError> {
        let entry = sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(executor)
        .await?;

        Ok(entry)
    }

    pub async fn get_entry<'e, E: PgExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Entry, StoreError> {
        sqlx::query_as::<_, Entry>(
            "SELECT id, account_id, amount, created_at FROM entries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| StoreError::not_found("entry", id))
    }

    pub async fn list_entries<'e, E: PgExecutor<'e>>(
        executor: E,
        params: ListEntriesParams,
    ) -> Result<Vec<Entry>, StoreError> {
        let entries = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }

    pub async fn create_transfer<'e, E: PgExecutor<'e>>(
        executor: E,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(executor)
        .await?;

        Ok(transfer)
    }

    pub async fn get_transfer<'e, E: PgExecutor<'e>>(
        executor: E,
        id: i64,
    ) -> Result<Transfer, StoreError> {
        sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| StoreError::not_found("transfer", id))
    }

    pub async fn list_transfers<'e, E: PgExecutor<'e>>(
        executor: E,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        let transfers = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE from_account_id = $1 OR to_account_id = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await?;

        Ok(transfers)
    }
}

// =========================================================================
// Record stores
// =========================================================================

/// Record store over the pool; every statement autocommits
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        queries::create_account(&self.pool, params).await
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        queries::get_account(&self.pool, id).await
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError> {
        queries::get_account(&self.pool, id).await
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        queries::list_accounts(&self.pool, params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        queries::add_account_balance(&self.pool, params).await
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        queries::create_entry(&self.pool, params).await
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        queries::get_entry(&self.pool, id).await
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        queries::list_entries(&self.pool, params).await
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer, StoreError> {
        queries::create_transfer(&self.pool, params).await
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        queries::get_transfer(&self.pool, id).await
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        queries::list_transfers(&self.pool, params).await
    }
}

/// Record store bound to the connection of an open transaction
pub struct PgTxRecordStore<'t> {
    conn: &'t mut PgConnection,
}

impl<'t> PgTxRecordStore<'t> {
    pub fn new(conn: &'t mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RecordStore for PgTxRecordStore<'_> {
    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        queries::create_account(&mut *self.conn, params).await
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        queries::get_account(&mut *self.conn, id).await
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError> {
        queries::get_account_for_update(&mut *self.conn, id).await
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        queries::list_accounts(&mut *self.conn, params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        queries::add_account_balance(&mut *self.conn, params).await
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        queries::create_entry(&mut *self.conn, params).await
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        queries::get_entry(&mut *self.conn, id).await
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        queries::list_entries(&mut *self.conn, params).await
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer, StoreError> {
        queries::create_transfer(&mut *self.conn, params).await
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        queries::get_transfer(&mut *self.conn, id).await
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        queries::list_transfers(&mut *self.conn, params).await
    }
}

// =========================================================================
// Executor
// =========================================================================

/// Transaction executor over an injected connection pool
#[derive(Debug, Clone)]
pub struct PgTransactionExecutor {
    pool: PgPool,
}

impl PgTransactionExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionExecutor for PgTransactionExecutor {
    type Ambient = PgRecordStore;

    fn ambient(&self) -> PgRecordStore {
        PgRecordStore::new(self.pool.clone())
    }

    async fn run_atomic<T, E, F>(&self, work: F) -> Result<T, TxError<E>>
    where
        T: Send + 'static,
        E: fmt::Debug + fmt::Display + Send + 'static,
        F: for<'s> FnOnce(&'s mut dyn RecordStore) -> BoxFuture<'s, Result<T, E>> + Send + 'static,
    {
        // A dropped `Transaction` rolls back when its connection returns to the pool.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TxError::Begin(e.into()))?;

        let outcome = {
            let mut store = PgTxRecordStore::new(&mut *tx);
            work(&mut store).await
        };

        settle(outcome, |completion| async move {
            match completion {
                Completion::Commit => tx.commit().await?,
                Completion::Rollback => tx.rollback().await?,
            }
            Ok::<(), StoreError>(())
        })
        .await
    }
}
