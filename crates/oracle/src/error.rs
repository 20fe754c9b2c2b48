use condswap_core::{ErrorCode, HasErrorCode};
use std::time::Duration;
use thiserror::Error;

/// Errors from oracle reads and registry administration.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Index id was never assigned or is inactive.
    #[error("Unknown index: {0}")]
    UnknownIndex(u64),

    /// A backend could not produce a value right now.
    #[error("Oracle unavailable for index {index_id}: {reason}")]
    Unavailable { index_id: u64, reason: String },

    /// Administrative call from someone other than the owner.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed administrative input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// JSON-RPC level error.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Return data did not match the expected ABI.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A read exceeded its deadline.
    #[error("Oracle read timed out after {0:?}")]
    Timeout(Duration),
}

impl OracleError {
    /// Returns true if the failure is transient and a later read may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OracleError::Unavailable { .. }
                | OracleError::Rpc(_)
                | OracleError::Http(_)
                | OracleError::Timeout(_)
        )
    }
}

impl HasErrorCode for OracleError {
    fn code(&self) -> ErrorCode {
        match self {
            OracleError::UnknownIndex(_) => ErrorCode::UnknownIndex,
            OracleError::Unauthorized(_) => ErrorCode::Unauthorized,
            OracleError::InvalidArgument(_) => ErrorCode::Validation,
            OracleError::Unavailable { .. }
            | OracleError::Rpc(_)
            | OracleError::Http(_)
            | OracleError::Decode(_)
            | OracleError::Timeout(_) => ErrorCode::OracleUnavailable,
        }
    }
}
