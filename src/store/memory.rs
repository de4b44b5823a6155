//! In-process backend
//!
//! Holds the three tables in memory with the same transactional contract as
//! PostgreSQL under READ COMMITTED: writes are staged per transaction and
//! published on commit, and every row touched by `add_account_balance` or
//! `get_account_for_update` stays locked until commit or rollback. Row locks
//! are real async mutexes, so two transactions that lock the same rows in
//! opposite order deadlock here too.
//!
//! Intended for tests and local runs. Not optimized for performance.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::domain::{Account, Entry, Transfer};

use super::executor::{settle, Completion, TransactionExecutor, TxError};
use super::record_store::{
    AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, CreateTransferParams,
    ListAccountsParams, ListEntriesParams, ListTransfersParams, RecordStore,
};
use super::StoreError;

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

/// Identifier sequences. Like database sequences, values consumed by a
/// rolled-back transaction are not reused.
#[derive(Debug, Default)]
struct Sequences {
    accounts: AtomicI64,
    entries: AtomicI64,
    transfers: AtomicI64,
}

fn next_id(sequence: &AtomicI64) -> i64 {
    sequence.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<RowLock<()>>>>,
    sequences: Sequences,
}

/// Row counts and balance total of the committed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub accounts: usize,
    pub entries: usize,
    pub transfers: usize,
    pub total_balance: i64,
}

/// Shared handle to one in-process database
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.shared
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, id: i64) -> Arc<RowLock<()>> {
        let mut locks = self
            .shared
            .row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().clone()
    }

    /// Committed state summary
    pub fn stats(&self) -> TableStats {
        let tables = self.tables();
        TableStats {
            accounts: tables.accounts.len(),
            entries: tables.entries.len(),
            transfers: tables.transfers.len(),
            total_balance: tables.accounts.values().map(|a| a.balance).sum(),
        }
    }
}

// =========================================================================
// Transactional store
// =========================================================================

/// Record store bound to one open in-process transaction
pub struct MemoryTxRecordStore {
    db: MemoryDatabase,
    accounts: BTreeMap<i64, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    locks: HashMap<i64, OwnedMutexGuard<()>>,
}

impl MemoryTxRecordStore {
    fn begin(db: MemoryDatabase) -> Self {
        Self {
            db,
            accounts: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
            locks: HashMap::new(),
        }
    }

    async fn lock_row(&mut self, id: i64) {
        if !self.locks.contains_key(&id) {
            let guard = self.db.row_lock(id).lock_owned().await;
            self.locks.insert(id, guard);
        }
    }

    fn read_account(&self, id: i64) -> Result<Account, StoreError> {
        if let Some(account) = self.accounts.get(&id) {
            return Ok(account.clone());
        }
        self.db
            .tables()
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("account", id))
    }

    fn account_exists(&self, id: i64) -> bool {
        self.accounts.contains_key(&id) || self.db.tables().accounts.contains_key(&id)
    }

    fn visible_accounts(&self) -> BTreeMap<i64, Account> {
        let mut accounts = self.db.tables().accounts.clone();
        accounts.extend(self.accounts.iter().map(|(id, a)| (*id, a.clone())));
        accounts
    }

    fn owner_currency_taken(accounts: &BTreeMap<i64, Account>, candidate: &Account) -> bool {
        accounts.values().any(|a| {
            a.id != candidate.id && a.owner == candidate.owner && a.currency == candidate.currency
        })
    }

    fn commit(self) -> Result<(), StoreError> {
        let MemoryTxRecordStore {
            db,
            accounts,
            entries,
            transfers,
            locks,
        } = self;

        let mut tables = db.tables();

        // Another transaction may have committed the same (owner, currency)
        // since this one staged its insert.
        for account in accounts.values() {
            if !tables.accounts.contains_key(&account.id)
                && Self::owner_currency_taken(&tables.accounts, account)
            {
                return Err(StoreError::Conflict("record already exists".to_string()));
            }
        }

        tables.accounts.extend(accounts);
        tables.entries.extend(entries.into_iter().map(|e| (e.id, e)));
        tables.transfers.extend(transfers.into_iter().map(|t| (t.id, t)));
        drop(tables);

        // Row locks are released only after the new state is visible
        drop(locks);
        Ok(())
    }

    fn rollback(self) {
        // Staged rows and row locks are dropped together
        drop(self);
    }
}

#[async_trait]
impl RecordStore for MemoryTxRecordStore {
    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let account = Account {
            id: next_id(&self.db.shared.sequences.accounts),
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };

        if Self::owner_currency_taken(&self.visible_accounts(), &account) {
            return Err(StoreError::Conflict("record already exists".to_string()));
        }

        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        self.read_account(id)
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError> {
        self.lock_row(id).await;
        self.read_account(id)
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        Ok(self
            .visible_accounts()
            .into_values()
            .filter(|a| a.owner == params.owner)
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .collect())
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.lock_row(params.id).await;

        let mut account = self.read_account(params.id)?;
        account.balance = account
            .balance
            .checked_add(params.amount)
            .ok_or_else(|| StoreError::Conflict("value violates a store constraint".to_string()))?;

        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        if !self.account_exists(params.account_id) {
            return Err(StoreError::NotFound("referenced account".to_string()));
        }

        let entry = Entry {
            id: next_id(&self.db.shared.sequences.entries),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        if let Some(entry) = self.entries.iter().find(|e| e.id == id) {
            return Ok(entry.clone());
        }
        self.db
            .tables()
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("entry", id))
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        // Staged ids may be lower than ids committed since this transaction began
        let mut entries = self.db.tables().entries.clone();
        entries.extend(self.entries.iter().map(|e| (e.id, e.clone())));

        Ok(entries
            .into_values()
            .filter(|e| e.account_id == params.account_id)
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .collect())
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer, StoreError> {
        if params.amount <= 0 {
            return Err(StoreError::Conflict("value violates a store constraint".to_string()));
        }
        if !self.account_exists(params.from_account_id) || !self.account_exists(params.to_account_id)
        {
            return Err(StoreError::NotFound("referenced account".to_string()));
        }

        let transfer = Transfer {
            id: next_id(&self.db.shared.sequences.transfers),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        if let Some(transfer) = self.transfers.iter().find(|t| t.id == id) {
            return Ok(transfer.clone());
        }
        self.db
            .tables()
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("transfer", id))
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        let mut transfers = self.db.tables().transfers.clone();
        transfers.extend(self.transfers.iter().map(|t| (t.id, t.clone())));

        Ok(transfers
            .into_values()
            .filter(|t| {
                t.from_account_id == params.from_account_id || t.to_account_id == params.to_account_id
            })
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .collect())
    }
}

// =========================================================================
// Ambient store
// =========================================================================

/// Record store outside any transaction: reads see committed rows, each
/// write commits on its own.
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    db: MemoryDatabase,
}

impl MemoryRecordStore {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }

    fn snapshot(&self) -> MemoryTxRecordStore {
        MemoryTxRecordStore::begin(self.db.clone())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let mut tx = self.snapshot();
        let account = tx.create_account(params).await?;
        tx.commit()?;
        Ok(account)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        self.snapshot().read_account(id)
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError> {
        self.snapshot().read_account(id)
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        self.snapshot().list_accounts(params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        let mut tx = self.snapshot();
        let account = tx.add_account_balance(params).await?;
        tx.commit()?;
        Ok(account)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        let mut tx = self.snapshot();
        let entry = tx.create_entry(params).await?;
        tx.commit()?;
        Ok(entry)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        self.snapshot().get_entry(id).await
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        self.snapshot().list_entries(params).await
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer, StoreError> {
        let mut tx = self.snapshot();
        let transfer = tx.create_transfer(params).await?;
        tx.commit()?;
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        self.snapshot().get_transfer(id).await
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.snapshot().list_transfers(params).await
    }
}

// =========================================================================
// Executor
// =========================================================================

/// Transaction executor over a [`MemoryDatabase`]
#[derive(Debug, Clone, Default)]
pub struct MemoryTransactionExecutor {
    db: MemoryDatabase,
}

impl MemoryTransactionExecutor {
    pub fn new(db: MemoryDatabase) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &MemoryDatabase {
        &self.db
    }
}

#[async_trait]
impl TransactionExecutor for MemoryTransactionExecutor {
    type Ambient = MemoryRecordStore;

    fn ambient(&self) -> MemoryRecordStore {
        MemoryRecordStore::new(self.db.clone())
    }

    async fn run_atomic<T, E, F>(&self, work: F) -> Result<T, TxError<E>>
    where
        T: Send + 'static,
        E: fmt::Debug + fmt::Display + Send + 'static,
        F: for<'s> FnOnce(&'s mut dyn RecordStore) -> BoxFuture<'s, Result<T, E>> + Send + 'static,
    {
        let mut store = MemoryTxRecordStore::begin(self.db.clone());
        let outcome = work(&mut store).await;

        settle(outcome, |completion| async move {
            match completion {
                Completion::Commit => store.commit(),
                Completion::Rollback => {
                    store.rollback();
                    Ok(())
                }
            }
        })
        .await
    }
}
