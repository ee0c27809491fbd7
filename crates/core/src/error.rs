// Central Error Type for the data core

use serde::Serialize;
use thiserror::Error;

use crate::mapper::MappingError;

/// Application-level error type
///
/// Every store-specific failure is translated into one of these variants before it
/// leaves the infrastructure layer, so callers never see raw driver codes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Connection pool exhausted after waiting {waited_ms} ms")]
    PoolExhausted { waited_ms: u64 },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Connection unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Optimistic conflict: {0}")]
    OptimisticConflict(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Statement timed out after {timeout_ms} ms")]
    StatementTimeout { timeout_ms: u64 },

    #[error("Invalid statement parameters: {0}")]
    InvalidParameters(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Stable, store-independent outcome a facade renders for an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// "no such resource"
    NotFound,
    /// "conflict, retry with fresh state"
    Conflict,
    /// "temporarily unavailable"
    Unavailable,
    /// The request itself was malformed
    Invalid,
    Internal,
}

impl Outcome {
    pub fn message(&self) -> &'static str {
        match self {
            Outcome::NotFound => "no such resource",
            Outcome::Conflict => "conflict, retry with fresh state",
            Outcome::Unavailable => "temporarily unavailable",
            Outcome::Invalid => "invalid request",
            Outcome::Internal => "internal error",
        }
    }
}

impl AppError {
    /// Classify this error for the request-handling facade.
    pub fn outcome(&self) -> Outcome {
        match self {
            AppError::NotFound(_) => Outcome::NotFound,
            AppError::ConstraintViolation(_) | AppError::OptimisticConflict(_) => {
                Outcome::Conflict
            }
            AppError::PoolExhausted { .. }
            | AppError::PoolClosed
            | AppError::ConnectionUnavailable(_)
            | AppError::StatementTimeout { .. }
            | AppError::TransactionFailed(_) => Outcome::Unavailable,
            AppError::Validation(_) | AppError::Serialization(_) => Outcome::Invalid,
            // Wire payloads that fail strict decoding are client errors; row mapping
            // failures are ours.
            AppError::Mapping(MappingError::Wire(_)) => Outcome::Invalid,
            AppError::Mapping(_)
            | AppError::InvalidParameters(_)
            | AppError::Config(_)
            | AppError::Database(_)
            | AppError::Internal(_) => Outcome::Internal,
        }
    }

    /// Whether the failure happened before any statement could have mutated state,
    /// so the whole unit of work may be retried by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::PoolExhausted { .. } | AppError::ConnectionUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            AppError::NotFound("post 1".into()).outcome(),
            Outcome::NotFound
        );
        assert_eq!(
            AppError::OptimisticConflict("post 1".into()).outcome(),
            Outcome::Conflict
        );
        assert_eq!(
            AppError::ConstraintViolation("fk".into()).outcome(),
            Outcome::Conflict
        );
        assert_eq!(
            AppError::PoolExhausted { waited_ms: 100 }.outcome(),
            Outcome::Unavailable
        );
        assert_eq!(AppError::PoolClosed.outcome(), Outcome::Unavailable);
        assert_eq!(
            AppError::Mapping(MappingError::Wire("unknown field".into())).outcome(),
            Outcome::Invalid
        );
        assert_eq!(
            AppError::Mapping(MappingError::MissingColumn {
                table: "posts",
                column: "title".into()
            })
            .outcome(),
            Outcome::Internal
        );
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(Outcome::NotFound.message(), "no such resource");
        assert_eq!(Outcome::Conflict.message(), "conflict, retry with fresh state");
        assert_eq!(Outcome::Unavailable.message(), "temporarily unavailable");
    }

    #[test]
    fn test_transient_errors() {
        assert!(AppError::PoolExhausted { waited_ms: 5 }.is_transient());
        assert!(AppError::ConnectionUnavailable("refused".into()).is_transient());
        assert!(!AppError::TransactionFailed("commit".into()).is_transient());
        assert!(!AppError::NotFound("x".into()).is_transient());
    }
}
