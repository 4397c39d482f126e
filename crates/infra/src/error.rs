//! Storage-level error model shared by the stock store, movement log and directory.

use thiserror::Error;

use stockmaster_core::DomainError;

/// Stock store / movement log operation error.
///
/// These are **infrastructure errors** as seen by the store. Business rule failures
/// detected under the product lock (`InsufficientStock`) are reported here too, because
/// only the store sees the serialized quantity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("product not found")]
    NotFound,

    #[error("insufficient stock: available {available}")]
    InsufficientStock { available: i64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Contention or timeout; safe to retry with backoff.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// Unexpected failure; the unit of work has been rolled back.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InsufficientStock { available, .. } => {
                StoreError::InsufficientStock { available }
            }
            DomainError::NotFound => StoreError::NotFound,
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                StoreError::InvalidArgument(msg)
            }
        }
    }
}

/// Map SQLx errors to `StoreError`.
///
/// | SQLx error | SQLSTATE | StoreError |
/// |---|---|---|
/// | Database (unique violation) | `23505` | `Conflict` |
/// | Database (foreign key violation) | `23503` | `NotFound` |
/// | Database (check violation) | `23514` | `InvalidArgument` |
/// | Database (lock not available, serialization, deadlock, statement timeout) | `55P03`, `40001`, `40P01`, `57014` | `Transient` |
/// | PoolTimedOut / Io | N/A | `Transient` |
/// | anything else | | `Persistence` |
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound,
                Some("23514") => StoreError::InvalidArgument(msg),
                Some("55P03" | "40001" | "40P01" | "57014") => StoreError::Transient(msg),
                _ => StoreError::Persistence(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Transient(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Transient(format!("io error in {}: {}", operation, e)),
        sqlx::Error::PoolClosed => {
            StoreError::Persistence(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Persistence(format!("sqlx error in {}: {}", operation, err)),
    }
}
