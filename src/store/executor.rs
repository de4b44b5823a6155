//! Transaction Executor
//!
//! Scoped acquisition of one atomic unit of work. The executor owns the
//! transaction for the whole call: `work` only ever sees a borrowed
//! `RecordStore`, so the transaction cannot escape or be reused, and `work`
//! has no way to open a nested one.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::{RecordStore, StoreError};

/// Point at which a transaction failed outside of the caller's work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Begin,
    Commit,
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxStage::Begin => write!(f, "begin"),
            TxStage::Commit => write!(f, "commit"),
        }
    }
}

/// Outcome of `run_atomic` when it does not commit.
///
/// `Work` means the caller's work failed and the transaction was cleanly
/// rolled back. Every other variant is a storage failure.
#[derive(Debug, thiserror::Error)]
pub enum TxError<E>
where
    E: fmt::Debug + fmt::Display,
{
    #[error("Failed to begin transaction: {0}")]
    Begin(#[source] StoreError),

    #[error("{0}")]
    Work(E),

    #[error("Failed to commit transaction: {0}")]
    Commit(#[source] StoreError),

    #[error("{original} (rollback also failed: {rollback})")]
    Rollback { original: E, rollback: StoreError },
}

/// How to finish a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Commit,
    Rollback,
}

/// Commit on success, roll back on failure, never both.
///
/// `finish` is called exactly once. A failed rollback is reported together
/// with the error that triggered it.
pub async fn settle<T, E, F, Fut>(outcome: Result<T, E>, finish: F) -> Result<T, TxError<E>>
where
    E: fmt::Debug + fmt::Display,
    F: FnOnce(Completion) -> Fut,
    Fut: Future<Output = Result<(), StoreError>>,
{
    match outcome {
        Ok(value) => {
            finish(Completion::Commit).await.map_err(TxError::Commit)?;
            Ok(value)
        }
        Err(original) => match finish(Completion::Rollback).await {
            Ok(()) => Err(TxError::Work(original)),
            Err(rollback) => Err(TxError::Rollback { original, rollback }),
        },
    }
}

/// Runs units of work atomically against one backend.
#[async_trait]
pub trait TransactionExecutor: Send + Sync {
    /// Record store bound to the ambient, non-transactional connection
    type Ambient: RecordStore + 'static;

    fn ambient(&self) -> Self::Ambient;

    /// Begin a transaction, run `work` against a store bound to it, then
    /// commit or roll back.
    ///
    /// Dropping the returned future before it completes rolls back.
    async fn run_atomic<T, E, F>(&self, work: F) -> Result<T, TxError<E>>
    where
        T: Send + 'static,
        E: fmt::Debug + fmt::Display + Send + 'static,
        F: for<'s> FnOnce(&'s mut dyn RecordStore) -> BoxFuture<'s, Result<T, E>> + Send + 'static;
}
