use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use uptime_core::QueryError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::NotFound { .. } | QueryError::GroupNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            QueryError::InvalidRange { .. } => ApiError::BadRequest(e.to_string()),
            QueryError::Storage(inner) => {
                tracing::error!(error = %inner, "Query failed");
                ApiError::Internal(inner.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_kind, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorBody {
            error: error_kind.to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}
