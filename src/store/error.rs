//! Record Store Errors
//!
//! Driver errors are classified here, once, so nothing above the record
//! store ever inspects a raw `sqlx::Error`.

/// PostgreSQL SQLSTATE codes we classify explicitly
mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const CHECK_VIOLATION: &str = "23514";
    pub const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
}

/// Errors that can occur in record store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record matches the identifier, or a referenced record is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness or integrity constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connectivity, pool or driver failure
    #[error("Store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

impl StoreError {
    pub fn not_found(entity: &str, id: i64) -> Self {
        StoreError::NotFound(format!("{} {}", entity, id))
    }

    /// Check if this error is transient (retrying the whole operation may help)
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::RowNotFound => {
                return StoreError::NotFound("record".to_string());
            }
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
            _ => None,
        };

        match code.as_deref() {
            Some(sqlstate::UNIQUE_VIOLATION) => {
                tracing::debug!(error = %err, "Unique violation");
                StoreError::Conflict("record already exists".to_string())
            }
            Some(sqlstate::FOREIGN_KEY_VIOLATION) => {
                tracing::debug!(error = %err, "Foreign key violation");
                StoreError::NotFound("referenced account".to_string())
            }
            Some(sqlstate::CHECK_VIOLATION) | Some(sqlstate::NUMERIC_VALUE_OUT_OF_RANGE) => {
                tracing::debug!(error = %err, "Constraint violation");
                StoreError::Conflict("value violates a store constraint".to_string())
            }
            _ => StoreError::Unavailable(err),
        }
    }
}
