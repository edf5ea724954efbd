//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is deterministic and surfaced to the caller synchronously; none of
/// them is retried automatically. Infrastructure failures (storage, transport) have
/// their own error types in `larder-infra`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input, rejected before any state change.
    #[error("validation failed on `{field}`: {message}")]
    Validation { field: String, message: String },

    /// A referenced aggregate, material, product, etc. does not exist.
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },

    /// The operation is not allowed in the aggregate's current state.
    #[error("cannot {operation} while {state}")]
    InvalidStateTransition {
        state: String,
        operation: &'static str,
    },

    /// Uniqueness violation or stale version.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An internal consistency rule was broken (indicates a bug or corrupt history).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(state: impl core::fmt::Display, operation: &'static str) -> Self {
        Self::InvalidStateTransition {
            state: state.to_string(),
            operation,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Whether this error reports a forbidden state transition.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidStateTransition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_names_state_and_operation() {
        let err = DomainError::invalid_transition("PAID", "checkout");
        assert_eq!(err.to_string(), "cannot checkout while PAID");
        assert!(err.is_invalid_transition());
    }

    #[test]
    fn validation_message_names_field() {
        let err = DomainError::validation("quantity", "must be positive");
        assert_eq!(err.to_string(), "validation failed on `quantity`: must be positive");
    }
}
