//! Transfer Orchestrator
//!
//! Moves an amount from one account to another: one transfer record, two
//! entries and two balance updates, all inside a single `run_atomic`.

use serde::{Deserialize, Serialize};

use crate::domain::{Account, Amount, Entry, Transfer};
use crate::store::{
    AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, RecordStore,
    TransactionExecutor,
};

use super::LedgerError;

/// Input of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl TransferTxParams {
    pub fn new(from_account_id: i64, to_account_id: i64, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Preconditions checked before any transaction is opened
    pub fn validate(&self) -> Result<Amount, LedgerError> {
        let amount = Amount::new(self.amount)?;

        if self.from_account_id == self.to_account_id {
            return Err(LedgerError::invalid_argument(
                "Cannot transfer to the same account",
            ));
        }

        Ok(amount)
    }
}

/// Everything a successful transfer created or changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Whether a transfer may leave the source account negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FundsPolicy {
    #[default]
    RequireSufficient,
    AllowOverdraft,
}

/// Runs transfers through a transaction executor
#[derive(Debug, Clone)]
pub struct TransferOrchestrator<X> {
    executor: X,
    funds_policy: FundsPolicy,
}

impl<X: TransactionExecutor> TransferOrchestrator<X> {
    pub fn new(executor: X) -> Self {
        Self {
            executor,
            funds_policy: FundsPolicy::default(),
        }
    }

    pub fn with_funds_policy(mut self, funds_policy: FundsPolicy) -> Self {
        self.funds_policy = funds_policy;
        self
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn funds_policy(&self) -> FundsPolicy {
        self.funds_policy
    }

    /// Move `params.amount` from the source to the destination account.
    ///
    /// Nothing is written unless every step succeeds. Errors are never
    /// retried here; see [`LedgerError::is_retryable`].
    pub async fn transfer(&self, params: TransferTxParams) -> Result<TransferTxResult, LedgerError> {
        let amount = params.validate()?;
        let funds_policy = self.funds_policy;

        tracing::debug!(
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount,
            "Starting transfer"
        );

        let outcome = self
            .executor
            .run_atomic(move |store| {
                Box::pin(transfer_tx(store, params, amount, funds_policy))
            })
            .await;

        match outcome {
            Ok(result) => {
                tracing::info!(
                    transfer_id = result.transfer.id,
                    from_account_id = params.from_account_id,
                    to_account_id = params.to_account_id,
                    amount = params.amount,
                    "Transfer committed"
                );
                Ok(result)
            }
            Err(err) => {
                let err = LedgerError::from(err);
                if err.is_storage_failure() {
                    tracing::error!(
                        from_account_id = params.from_account_id,
                        to_account_id = params.to_account_id,
                        error = %err,
                        "Transfer failed in storage"
                    );
                } else {
                    tracing::warn!(
                        from_account_id = params.from_account_id,
                        to_account_id = params.to_account_id,
                        error = %err,
                        "Transfer rejected"
                    );
                }
                Err(err)
            }
        }
    }
}

/// The unit of work run inside the transaction
async fn transfer_tx(
    store: &mut dyn RecordStore,
    params: TransferTxParams,
    amount: Amount,
    funds_policy: FundsPolicy,
) -> Result<TransferTxResult, LedgerError> {
    let transfer = store
        .create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: amount.value(),
        })
        .await?;

    let from_entry = store
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: amount.debit(),
        })
        .await?;

    let to_entry = store
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: amount.credit(),
        })
        .await?;

    // Row locks are always taken in ascending id order, whatever the
    // direction, so opposite transfers over one pair cannot deadlock.
    let (from_account, to_account) = if params.from_account_id < params.to_account_id {
        add_money(
            store,
            params.from_account_id,
            amount.debit(),
            params.to_account_id,
            amount.credit(),
        )
        .await?
    } else {
        let (to_account, from_account) = add_money(
            store,
            params.to_account_id,
            amount.credit(),
            params.from_account_id,
            amount.debit(),
        )
        .await?;
        (from_account, to_account)
    };

    // The source row is locked, so this balance cannot be stale
    if funds_policy == FundsPolicy::RequireSufficient && from_account.balance < 0 {
        return Err(LedgerError::InsufficientFunds {
            account_id: from_account.id,
            balance: from_account.balance - amount.debit(),
            amount: amount.value(),
        });
    }

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Apply two balance changes, `first` before `second`
async fn add_money(
    store: &mut dyn RecordStore,
    first_id: i64,
    first_amount: i64,
    second_id: i64,
    second_amount: i64,
) -> Result<(Account, Account), LedgerError> {
    let first = store
        .add_account_balance(AddAccountBalanceParams {
            id: first_id,
            amount: first_amount,
        })
        .await?;

    let second = store
        .add_account_balance(AddAccountBalanceParams {
            id: second_id,
            amount: second_amount,
        })
        .await?;

    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        CreateAccountParams, ListEntriesParams, MemoryDatabase, MemoryTransactionExecutor,
    };

    async fn setup(balances: &[i64]) -> (TransferOrchestrator<MemoryTransactionExecutor>, Vec<i64>) {
        let executor = MemoryTransactionExecutor::new(MemoryDatabase::new());
        let mut store = executor.ambient();

        let mut ids = Vec::new();
        for (i, balance) in balances.iter().enumerate() {
            let account = store
                .create_account(CreateAccountParams {
                    owner: format!("owner{}", i),
                    balance: *balance,
                    currency: "USD".to_string(),
                })
                .await
                .unwrap();
            ids.push(account.id);
        }

        (TransferOrchestrator::new(executor), ids)
    }

    #[test]
    fn test_params_validation() {
        assert!(TransferTxParams::new(1, 2, 10).validate().is_ok());
        assert!(matches!(
            TransferTxParams::new(1, 2, 0).validate(),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            TransferTxParams::new(1, 2, -3).validate(),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            TransferTxParams::new(4, 4, 10).validate(),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_transfer_example_scenario() {
        let (ledger, ids) = setup(&[100, 50]).await;

        let result = ledger
            .transfer(TransferTxParams::new(ids[0], ids[1], 30))
            .await
            .unwrap();

        assert_eq!(result.from_account.balance, 70);
        assert_eq!(result.to_account.balance, 80);
        assert_eq!(result.transfer.from_account_id, ids[0]);
        assert_eq!(result.transfer.to_account_id, ids[1]);
        assert_eq!(result.transfer.amount, 30);
        assert_eq!(result.from_entry.account_id, ids[0]);
        assert_eq!(result.from_entry.amount, -30);
        assert_eq!(result.to_entry.account_id, ids[1]);
        assert_eq!(result.to_entry.amount, 30);
    }

    #[tokio::test]
    async fn test_transfer_towards_lower_id() {
        let (ledger, ids) = setup(&[100, 50]).await;

        let result = ledger
            .transfer(TransferTxParams::new(ids[1], ids[0], 20))
            .await
            .unwrap();

        assert_eq!(result.from_account.id, ids[1]);
        assert_eq!(result.from_account.balance, 30);
        assert_eq!(result.to_account.id, ids[0]);
        assert_eq!(result.to_account.balance, 120);
    }

    #[tokio::test]
    async fn test_insufficient_funds_rolls_back() {
        let (ledger, ids) = setup(&[10, 0]).await;

        let err = ledger
            .transfer(TransferTxParams::new(ids[0], ids[1], 11))
            .await
            .unwrap_err();

        match err {
            LedgerError::InsufficientFunds { account_id, balance, amount } => {
                assert_eq!(account_id, ids[0]);
                assert_eq!(balance, 10);
                assert_eq!(amount, 11);
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }

        let stats = ledger.executor().database().stats();
        assert_eq!(stats.transfers, 0);
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_balance, 10);
    }

    #[tokio::test]
    async fn test_overdraft_policy_allows_negative_balance() {
        let (ledger, ids) = setup(&[10, 0]).await;
        let ledger = ledger.with_funds_policy(FundsPolicy::AllowOverdraft);

        let result = ledger
            .transfer(TransferTxParams::new(ids[0], ids[1], 25))
            .await
            .unwrap();

        assert_eq!(result.from_account.balance, -15);
        assert_eq!(result.to_account.balance, 25);
    }

    #[tokio::test]
    async fn test_missing_destination_is_not_found() {
        let (ledger, ids) = setup(&[100]).await;

        let err = ledger
            .transfer(TransferTxParams::new(ids[0], ids[0] + 1000, 5))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::NotFound(_)));
        let stats = ledger.executor().database().stats();
        assert_eq!(stats.transfers, 0);
        assert_eq!(stats.total_balance, 100);
    }

    #[tokio::test]
    async fn test_entries_sum_to_balance() {
        let (ledger, ids) = setup(&[0, 0]).await;
        let ledger = ledger.with_funds_policy(FundsPolicy::AllowOverdraft);

        for amount in [5, 7, 11] {
            ledger
                .transfer(TransferTxParams::new(ids[0], ids[1], amount))
                .await
                .unwrap();
        }

        let mut store = ledger.executor().ambient();
        for id in &ids {
            let account = store.get_account(*id).await.unwrap();
            let entries = store
                .list_entries(ListEntriesParams { account_id: *id, limit: 100, offset: 0 })
                .await
                .unwrap();
            let sum: i64 = entries.iter().map(|e| e.amount).sum();
            assert_eq!(account.balance, sum);
        }
    }
}
