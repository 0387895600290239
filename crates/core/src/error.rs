//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, missing references). Storage concerns belong in the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A record identity was supplied but the persisted record is gone.
    ///
    /// Distinct from `NotFound`: the caller held a reference that used to be
    /// valid (edit of a deleted entry, concurrent removal, corrupted id).
    #[error("stale reference to {entity} {id}")]
    StaleReference { entity: &'static str, id: String },

    /// A conflict occurred (e.g. duplicate or out-of-order state change).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn stale(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::StaleReference {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_entity_and_id() {
        let err = DomainError::not_found("product", 42);
        assert_eq!(err.to_string(), "product 42 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn stale_reference_is_not_a_plain_not_found() {
        let err = DomainError::stale("stock entry", 7);
        assert_eq!(err.to_string(), "stale reference to stock entry 7");
        assert!(!err.is_not_found());
    }
}
