//! Store error type and SQLx error mapping.
//!
//! | SQLx error | `StoreError` |
//! |------------|--------------|
//! | `Database` (any code) | `Database` with the driver message |
//! | `PoolClosed`, `PoolTimedOut` | `Database` |
//! | `ColumnDecode`, `Decode`, `ColumnNotFound` | `CorruptRow` |
//! | other | `Database` |
//!
//! Unique and foreign-key violations are recognised at the call site, where
//! the table being written tells which conflict to report.

use thiserror::Error;

use stockledger_core::DomainError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// A stored row could not be turned back into a domain value.
    #[error("corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

impl StoreError {
    pub fn corrupt(table: &'static str, message: impl ToString) -> Self {
        StoreError::CorruptRow {
            table,
            message: message.to_string(),
        }
    }
}

/// Map SQLx errors to `StoreError`.
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Database {
            operation,
            message: db_err.message().to_string(),
        },
        sqlx::Error::PoolClosed => StoreError::Database {
            operation,
            message: "connection pool closed".to_string(),
        },
        sqlx::Error::PoolTimedOut => StoreError::Database {
            operation,
            message: "timed out waiting for a connection".to_string(),
        },
        sqlx::Error::ColumnDecode { index, source } => StoreError::CorruptRow {
            table: operation,
            message: format!("column {index}: {source}"),
        },
        sqlx::Error::ColumnNotFound(column) => StoreError::CorruptRow {
            table: operation,
            message: format!("missing column {column}"),
        },
        sqlx::Error::Decode(source) => StoreError::CorruptRow {
            table: operation,
            message: source.to_string(),
        },
        other => StoreError::Database {
            operation,
            message: other.to_string(),
        },
    }
}

/// Check if an error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Check if an error is a foreign key violation.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_foreign_key_violation(),
        _ => false,
    }
}

/// Driver message of a database error, or empty.
pub(crate) fn db_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        _ => String::new(),
    }
}
