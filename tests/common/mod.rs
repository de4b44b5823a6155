//! Common test utilities

#![allow(dead_code)]

use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::BoxFuture;
use simple_ledger::domain::{Account, Entry, Transfer};
use simple_ledger::store::{
    AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, CreateTransferParams,
    ListAccountsParams, ListEntriesParams, ListTransfersParams, MemoryDatabase,
    MemoryTransactionExecutor, RecordStore, StoreError, TransactionExecutor, TxError,
};
use simple_ledger::{db, Config, TransferOrchestrator};
use sqlx::PgPool;

pub const TEST_API_KEY: &str = "test_key_123";

/// Fresh in-process ledger
pub fn memory_ledger() -> TransferOrchestrator<MemoryTransactionExecutor> {
    TransferOrchestrator::new(MemoryTransactionExecutor::new(MemoryDatabase::new()))
}

/// Open an account directly through the store
pub async fn open_account(
    store: &mut impl RecordStore,
    owner: &str,
    balance: i64,
    currency: &str,
) -> Account {
    store
        .create_account(CreateAccountParams {
            owner: owner.to_string(),
            balance,
            currency: currency.to_string(),
        })
        .await
        .expect("Failed to create account")
}

/// Connect to DATABASE_URL and apply migrations.
///
/// Tables are not emptied; tests run in parallel and use random owners.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("DATABASE_URL must be set for tests");

    let pool = db::connect(&config).await.expect("Failed to connect to DB");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

// =========================================================================
// Fault injection
// =========================================================================

/// Shared script for a [`ScriptedExecutor`]: which mutating call to fail
/// and the log of calls made so far.
#[derive(Debug, Default)]
pub struct Script {
    fail_at: Option<usize>,
    mutations: usize,
    calls: Vec<String>,
}

/// Wraps the in-process executor and fails the Nth mutating store call
/// (1-based) of every unit of work.
#[derive(Debug, Clone)]
pub struct ScriptedExecutor {
    inner: MemoryTransactionExecutor,
    script: Arc<Mutex<Script>>,
}

impl ScriptedExecutor {
    pub fn new(inner: MemoryTransactionExecutor) -> Self {
        Self {
            inner,
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    pub fn fail_at(&self, step: usize) {
        let mut script = self.script.lock().unwrap();
        script.fail_at = Some(step);
    }

    /// Calls recorded inside transactions, in order
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl TransactionExecutor for ScriptedExecutor {
    type Ambient = <MemoryTransactionExecutor as TransactionExecutor>::Ambient;

    fn ambient(&self) -> Self::Ambient {
        self.inner.ambient()
    }

    async fn run_atomic<T, E, F>(&self, work: F) -> Result<T, TxError<E>>
    where
        T: Send + 'static,
        E: fmt::Debug + fmt::Display + Send + 'static,
        F: for<'s> FnOnce(&'s mut dyn RecordStore) -> BoxFuture<'s, Result<T, E>> + Send + 'static,
    {
        {
            let mut script = self.script.lock().unwrap();
            script.mutations = 0;
            script.calls.clear();
        }
        let script = self.script.clone();

        self.inner
            .run_atomic(move |store| {
                Box::pin(async move {
                    let mut scripted = ScriptedStore { inner: store, script };
                    work(&mut scripted).await
                })
            })
            .await
    }
}

struct ScriptedStore<'a> {
    inner: &'a mut dyn RecordStore,
    script: Arc<Mutex<Script>>,
}

impl ScriptedStore<'_> {
    fn record(&self, call: String) {
        self.script.lock().unwrap().calls.push(call);
    }

    fn mutate(&self, call: String) -> Result<(), StoreError> {
        let mut script = self.script.lock().unwrap();
        script.mutations += 1;
        script.calls.push(call);
        if script.fail_at == Some(script.mutations) {
            return Err(StoreError::Unavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl<'a> RecordStore for ScriptedStore<'a> {
    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        self.mutate("create_account".to_string())?;
        self.inner.create_account(params).await
    }

    async fn get_account(&mut self, id: i64) -> Result<Account, StoreError> {
        self.record(format!("get_account({})", id));
        self.inner.get_account(id).await
    }

    async fn get_account_for_update(&mut self, id: i64) -> Result<Account, StoreError> {
        self.record(format!("get_account_for_update({})", id));
        self.inner.get_account_for_update(id).await
    }

    async fn list_accounts(&mut self, params: ListAccountsParams) -> Result<Vec<Account>, StoreError> {
        self.inner.list_accounts(params).await
    }

    async fn add_account_balance(
        &mut self,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError> {
        self.mutate(format!("add_account_balance({})", params.id))?;
        self.inner.add_account_balance(params).await
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        self.mutate(format!("create_entry({})", params.account_id))?;
        self.inner.create_entry(params).await
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry, StoreError> {
        self.inner.get_entry(id).await
    }

    async fn list_entries(&mut self, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError> {
        self.inner.list_entries(params).await
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer, StoreError> {
        self.mutate("create_transfer".to_string())?;
        self.inner.create_transfer(params).await
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer, StoreError> {
        self.inner.get_transfer(id).await
    }

    async fn list_transfers(
        &mut self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.inner.list_transfers(params).await
    }
}
