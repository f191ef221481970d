//! Mapping of [`Error`] onto HTTP responses.

use crate::Error;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// An [`Error`] rendered as `{"error": ..., "field"?: ...}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl ApiError {
    /// Status code for the wrapped error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidInput(_) | Error::Validation { .. } | Error::Conflict(_) => {
                StatusCode::BAD_REQUEST
            },
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::OperationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.0 {
            Error::Validation { field, reason } => ErrorBody {
                error: format!("invalid {field}: {reason}"),
                field: Some(field),
            },
            Error::OperationFailed { operation, cause } => {
                tracing::error!(%operation, %cause, "Request failed");
                ErrorBody {
                    error: format!("internal error during {operation}"),
                    field: None,
                }
            },
            other => ErrorBody {
                error: other.to_string(),
                field: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
