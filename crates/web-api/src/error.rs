use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use condswap_core::{ErrorCode, HasErrorCode};
use condswap_orders::types::ErrorBody;
use condswap_orders::OrderError;
use serde::Serialize;

/// Error envelope returned by every route: `{success: false, error: {code, message}}`.
#[derive(Debug)]
pub struct ApiError(ErrorBody);

#[derive(Serialize)]
struct Envelope<'a> {
    success: bool,
    error: &'a ErrorBody,
}

impl ApiError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self(ErrorBody {
            code,
            message: message.into(),
        })
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.0.code
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        status_for(self.0.code)
    }
}

#[must_use]
pub const fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation
        | ErrorCode::UnknownAsset
        | ErrorCode::UnknownIndex
        | ErrorCode::InvalidAmount => StatusCode::BAD_REQUEST,
        ErrorCode::OrderNotFound => StatusCode::NOT_FOUND,
        ErrorCode::Unauthorized => StatusCode::FORBIDDEN,
        ErrorCode::OracleUnavailable
        | ErrorCode::SubmissionAllowance
        | ErrorCode::SubmissionReverted
        | ErrorCode::SubmissionRateLimited
        | ErrorCode::SubmissionUnknown => StatusCode::BAD_GATEWAY,
        ErrorCode::PredicateEncoding | ErrorCode::Config | ErrorCode::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        Self(ErrorBody::from_error(&err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = %self.0.code, message = %self.0.message, "Request failed");
        }
        let body = Envelope {
            success: false,
            error: &self.0,
        };
        (status, Json(body)).into_response()
    }
}
