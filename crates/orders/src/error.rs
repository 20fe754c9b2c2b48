use crate::order_book::SubmissionError;
use crate::pending::PendingStoreError;
use condswap_core::{ErrorCode, HasErrorCode};
use condswap_oracle::OracleError;
use thiserror::Error;

/// Terminal failures of the order pipeline. Every variant maps to a stable [`ErrorCode`].
#[derive(Debug, Error)]
pub enum OrderError {
    /// Missing or malformed request field.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Token symbol or address is not in the configured registry.
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// Amount is non-numeric, negative, zero, or finer than the token's decimals.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Invariant violation while building predicate or extension bytes.
    #[error("Predicate encoding error: {0}")]
    PredicateEncoding(String),

    /// Pending id never issued, already consumed, or expired.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PendingStoreError> for OrderError {
    fn from(err: PendingStoreError) -> Self {
        OrderError::OrderNotFound(err.to_string())
    }
}

impl HasErrorCode for OrderError {
    fn code(&self) -> ErrorCode {
        match self {
            OrderError::Validation(_) => ErrorCode::Validation,
            OrderError::UnknownAsset(_) => ErrorCode::UnknownAsset,
            OrderError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            OrderError::Oracle(e) => e.code(),
            OrderError::PredicateEncoding(_) => ErrorCode::PredicateEncoding,
            OrderError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            OrderError::Unauthorized(_) => ErrorCode::Unauthorized,
            OrderError::Submission(e) => e.code(),
            OrderError::Internal(_) => ErrorCode::Internal,
        }
    }
}
