//! Error types for the escrow service.

use crate::domain::{Currency, TransactionStatus};
use crate::ports::GatewayError;

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error("Transaction is {actual}, expected {expected}")]
    InvalidState {
        expected: TransactionStatus,
        actual: TransactionStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The message shown to clients, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            AppError::BadRequest(m)
            | AppError::Unauthorized(m)
            | AppError::Forbidden(m)
            | AppError::NotFound(m)
            | AppError::Conflict(m)
            | AppError::Upstream(m)
            | AppError::Unavailable(m)
            | AppError::Internal(m) => m,
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ValidationError(msg) => AppError::BadRequest(msg),
            DomainError::InvalidState { .. } => AppError::Conflict(err.to_string()),
            e => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
        }
    }
}

impl From<escrow_fees::FeeError> for AppError {
    fn from(err: escrow_fees::FeeError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured(name) => {
                AppError::Unavailable(format!("{} is not configured", name))
            }
            e => AppError::Upstream(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err: AppError = RepoError::Domain(DomainError::ValidationError("bad".into())).into();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "bad"));
    }

    #[test]
    fn test_invalid_state_maps_to_conflict() {
        let err: AppError = DomainError::InvalidState {
            expected: TransactionStatus::InEscrow,
            actual: TransactionStatus::Pending,
        }
        .into();
        assert_eq!(err.message(), "Transaction is PENDING, expected IN_ESCROW");
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_unconfigured_gateway_is_unavailable() {
        let err: AppError = GatewayError::NotConfigured("sms").into();
        assert!(matches!(err, AppError::Unavailable(_)));
    }

    #[test]
    fn test_fee_error_is_bad_request() {
        let err: AppError = escrow_fees::FeeError::NoRuleFound.into();
        assert_eq!(err.message(), "No commission rule found for this amount.");
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
