//! Error responses.
//!
//! Every failure leaves the API as
//! `{"error": {"code": "...", "message": "...", "line": n}}`, with `line`
//! present only for line-level validation errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use ledgerline_core::GlError;
use ledgerline_shared::AppError;

/// Failure of a request, either from the ledger or from the HTTP layer.
#[derive(Debug)]
pub enum ApiError {
    /// A ledger operation failed.
    Ledger(GlError),
    /// Authentication, malformed input or another non-domain failure.
    App(AppError),
}

impl ApiError {
    /// Shorthand for a malformed request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::App(AppError::BadRequest(message.into()))
    }

    fn status(&self) -> StatusCode {
        let code = match self {
            Self::Ledger(e) => e.status_code(),
            Self::App(e) => e.status_code(),
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Ledger(e) => ErrorBody {
                code: e.error_code(),
                message: e.to_string(),
                line: e.line(),
            },
            Self::App(e) => ErrorBody {
                code: e.error_code(),
                message: e.to_string(),
                line: None,
            },
        }
    }
}

impl From<GlError> for ApiError {
    fn from(err: GlError) -> Self {
        Self::Ledger(err)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

/// Inner error object.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable reason code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Offending 1-based line number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();
        if status.is_server_error() {
            error!(code = body.code, error = %body.message, "Request failed");
        } else if status == StatusCode::CONFLICT {
            warn!(code = body.code, error = %body.message, "Request conflicted");
        }
        (status, Json(ErrorEnvelope { error: body })).into_response()
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
