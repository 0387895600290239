//! Store error model.
//!
//! Domain failures (validation, invariants, missing or stale references) pass
//! through unchanged inside `StoreError::Domain`; everything else is a backend
//! failure.
//!
//! ## SQLx error mapping
//!
//! | SQLx error                    | PostgreSQL code | StoreError                         |
//! |-------------------------------|-----------------|------------------------------------|
//! | Database (unique violation)   | `23505`         | `Domain(Conflict)`                 |
//! | Database (foreign key)        | `23503`         | `Domain(Validation)`               |
//! | Database (check constraint)   | `23514`         | `Domain(InvariantViolation)`       |
//! | anything else                 | any             | `Backend`                          |

use thiserror::Error;

use storefront_core::DomainError;

/// Result type used by storage adapters.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("backend failure in {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::Domain(DomainError::not_found(entity, id))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Domain(DomainError::NotFound { .. }))
    }

    pub fn is_stale_reference(&self) -> bool {
        matches!(self, Self::Domain(DomainError::StaleReference { .. }))
    }
}

pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Domain(DomainError::conflict(msg)),
                Some("23503") => StoreError::Domain(DomainError::validation(msg)),
                Some("23514") => StoreError::Domain(DomainError::invariant(msg)),
                _ => StoreError::backend(operation, msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::backend(operation, "connection pool closed"),
        other => StoreError::backend(operation, other.to_string()),
    }
}
