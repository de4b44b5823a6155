//! API Routes
//!
//! HTTP endpoint definitions. Handlers authorize the caller and validate
//! input; money movement itself is delegated to the transfer orchestrator.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::domain::{Account, Currency, DomainError, OperationContext};
use crate::error::{AppError, AppResult};
use crate::ledger::{TransferOrchestrator, TransferTxParams, TransferTxResult};
use crate::store::{CreateAccountParams, ListAccountsParams, RecordStore, StoreError, TransactionExecutor};

/// Shared handler state
#[derive(Debug)]
pub struct AppState<X> {
    pub executor: X,
    pub ledger: Arc<TransferOrchestrator<X>>,
}

impl<X: Clone> Clone for AppState<X> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<X: TransactionExecutor + Clone> AppState<X> {
    pub fn new(ledger: TransferOrchestrator<X>) -> Self {
        Self {
            executor: ledger.executor().clone(),
            ledger: Arc::new(ledger),
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListAccountsQuery {
    pub page_id: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
}

const MIN_PAGE_SIZE: i64 = 5;
const MAX_PAGE_SIZE: i64 = 10;

impl ListAccountsQuery {
    /// `(limit, offset)` for a validated page
    fn limit_offset(&self) -> Result<(i64, i64), DomainError> {
        if self.page_id < 1 {
            return Err(DomainError::InvalidPagination(
                "page_id must be at least 1".to_string(),
            ));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(DomainError::InvalidPagination(format!(
                "page_size must be between {} and {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        Ok((self.page_size, (self.page_id - 1) * self.page_size))
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router<X>() -> Router<AppState<X>>
where
    X: TransactionExecutor + Clone + 'static,
{
    Router::new()
        .route("/accounts", post(create_account::<X>).get(list_accounts::<X>))
        .route("/accounts/:id", get(get_account::<X>))
        .route("/transfers", post(create_transfer::<X>))
}

/// The caller named by the auth middleware
fn require_owner(context: &OperationContext) -> AppResult<&str> {
    context.owner.as_deref().ok_or(AppError::MissingOwner)
}

async fn load_account(store: &mut impl RecordStore, id: i64) -> AppResult<Account> {
    store.get_account(id).await.map_err(|e| match e {
        StoreError::NotFound(_) => AppError::AccountNotFound(id),
        other => AppError::Store(other),
    })
}

// =========================================================================
// POST /accounts
// =========================================================================

/// Open an account for the caller, starting at zero balance
async fn create_account<X>(
    State(state): State<AppState<X>>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CreateAccountRequest>,
) -> AppResult<(StatusCode, Json<Account>)>
where
    X: TransactionExecutor + Clone + 'static,
{
    let owner = require_owner(&context)?;
    let currency: Currency = request.currency.parse()?;

    let account = state
        .executor
        .ambient()
        .create_account(CreateAccountParams {
            owner: owner.to_string(),
            balance: 0,
            currency: currency.to_string(),
        })
        .await?;

    tracing::info!(
        account_id = account.id,
        currency = %account.currency,
        correlation_id = ?context.correlation_id,
        "Account created"
    );

    Ok((StatusCode::CREATED, Json(account)))
}

// =========================================================================
// GET /accounts/:id
// =========================================================================

async fn get_account<X>(
    State(state): State<AppState<X>>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<i64>,
) -> AppResult<Json<Account>>
where
    X: TransactionExecutor + Clone + 'static,
{
    require_owner(&context)?;
    let account = load_account(&mut state.executor.ambient(), id).await?;

    if !context.is_owner(&account.owner) {
        return Err(AppError::AccountNotOwned(id));
    }

    Ok(Json(account))
}

// =========================================================================
// GET /accounts?page_id&page_size
// =========================================================================

async fn list_accounts<X>(
    State(state): State<AppState<X>>,
    Extension(context): Extension<OperationContext>,
    Query(query): Query<ListAccountsQuery>,
) -> AppResult<Json<Vec<Account>>>
where
    X: TransactionExecutor + Clone + 'static,
{
    let owner = require_owner(&context)?;
    let (limit, offset) = query.limit_offset()?;

    let accounts = state
        .executor
        .ambient()
        .list_accounts(ListAccountsParams {
            owner: owner.to_string(),
            limit,
            offset,
        })
        .await?;

    Ok(Json(accounts))
}

// =========================================================================
// POST /transfers
// =========================================================================

/// Check an account exists and is held in `currency`
async fn valid_account(
    store: &mut impl RecordStore,
    id: i64,
    currency: Currency,
) -> AppResult<Account> {
    let account = load_account(store, id).await?;

    if account.currency != currency.code() {
        return Err(DomainError::currency_mismatch(id, currency.code(), account.currency).into());
    }

    Ok(account)
}

async fn create_transfer<X>(
    State(state): State<AppState<X>>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<TransferRequest>,
) -> AppResult<Json<TransferTxResult>>
where
    X: TransactionExecutor + Clone + 'static,
{
    require_owner(&context)?;
    let currency: Currency = request.currency.parse()?;

    if request.amount <= 0 {
        return Err(DomainError::InvalidAmount("amount must be positive".to_string()).into());
    }
    if request.from_account_id == request.to_account_id {
        return Err(DomainError::SameAccountTransfer.into());
    }

    let mut store = state.executor.ambient();
    let from_account = valid_account(&mut store, request.from_account_id, currency).await?;
    if !context.is_owner(&from_account.owner) {
        return Err(AppError::AccountNotOwned(from_account.id));
    }
    valid_account(&mut store, request.to_account_id, currency).await?;

    let result = state
        .ledger
        .transfer(TransferTxParams::new(
            request.from_account_id,
            request.to_account_id,
            request.amount,
        ))
        .await?;

    tracing::info!(
        transfer_id = result.transfer.id,
        correlation_id = ?context.correlation_id,
        "Transfer completed"
    );

    Ok(Json(result))
}
