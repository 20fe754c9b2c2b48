use serde::{Serialize, Serializer};
use std::fmt;

/// Stable, UI-branchable error code carried by every terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Validation,
    UnknownIndex,
    UnknownAsset,
    InvalidAmount,
    OracleUnavailable,
    PredicateEncoding,
    SubmissionAllowance,
    SubmissionReverted,
    SubmissionRateLimited,
    SubmissionUnknown,
    OrderNotFound,
    Unauthorized,
    Config,
    Internal,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::UnknownIndex => "UNKNOWN_INDEX",
            ErrorCode::UnknownAsset => "UNKNOWN_ASSET",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::OracleUnavailable => "ORACLE_UNAVAILABLE",
            ErrorCode::PredicateEncoding => "PREDICATE_ENCODING_ERROR",
            ErrorCode::SubmissionAllowance => "SUBMISSION_ALLOWANCE",
            ErrorCode::SubmissionReverted => "SUBMISSION_REVERTED",
            ErrorCode::SubmissionRateLimited => "SUBMISSION_RATE_LIMITED",
            ErrorCode::SubmissionUnknown => "SUBMISSION_UNKNOWN",
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Config => "CONFIG_ERROR",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }

    /// True for caller mistakes that no amount of retrying fixes.
    #[must_use]
    pub const fn is_client_error(self) -> bool {
        matches!(
            self,
            ErrorCode::Validation
                | ErrorCode::UnknownIndex
                | ErrorCode::UnknownAsset
                | ErrorCode::InvalidAmount
                | ErrorCode::OrderNotFound
                | ErrorCode::Unauthorized
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Implemented by every crate error so the HTTP layer can branch on codes.
pub trait HasErrorCode {
    fn code(&self) -> ErrorCode;
}
