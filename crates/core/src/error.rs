//! Errors raised by domain types before anything reaches storage.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Rejection of a domain operation.
///
/// Only deterministic rule failures live here. Lock contention, missing rows and
/// backend outages are storage errors and are reported by the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Caller input is malformed: empty SKU, negative opening stock, unknown movement type.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A textual id did not parse. The message starts with the id type's name.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The operation would leave stock in a state the ledger forbids, such as
    /// retiring a product that still has units on hand.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The entity's lifecycle forbids the operation, e.g. moving stock of a retired product.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Machine-readable code carried in the `error` field of API error bodies.
    /// Malformed ids and malformed fields share `validation_error`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidId(_) => "validation_error",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::Conflict(_) => "conflict",
        }
    }

    /// Human-readable detail without the category prefix of `Display`.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m) | Self::InvalidId(m) | Self::InvariantViolation(m) | Self::Conflict(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_fields_share_the_validation_code() {
        assert_eq!(DomainError::validation("SKU cannot be empty").code(), "validation_error");
        assert_eq!(DomainError::invalid_id("UserId: bad").code(), "validation_error");
        assert_eq!(DomainError::invariant("stock left").code(), "invariant_violation");
        assert_eq!(DomainError::conflict("retired").code(), "conflict");
    }

    #[test]
    fn message_drops_the_display_prefix() {
        let err = DomainError::conflict("product 1 is retired");
        assert_eq!(err.to_string(), "conflict: product 1 is retired");
        assert_eq!(err.message(), "product 1 is retired");
    }
}
