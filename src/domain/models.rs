//! Ledger records
//!
//! Rows of the `accounts`, `entries` and `transfers` tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A balance-holding account.
///
/// `balance` is in minor currency units and is only ever changed inside a
/// transaction, together with the entry that explains the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// One signed balance movement against one account.
///
/// Positive amounts are credits, negative amounts are debits. Entries are
/// append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// A completed movement of `amount` from one account to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}
