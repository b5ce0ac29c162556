use std::fmt;

use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug)]
pub enum AppError {
    /// The retrieval descriptor cannot be executed (page size, cursor).
    InvalidDescriptor(String),
    BadRequest(&'static str),
    Unauthorized,
    NotFound,
    /// The backing store failed or could not be reached.
    StorageUnavailable(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidDescriptor(msg) => write!(f, "invalid descriptor: {msg}"),
            AppError::BadRequest(msg) => f.write_str(msg),
            AppError::Unauthorized => f.write_str("Unauthorized"),
            AppError::NotFound => f.write_str("Not found"),
            AppError::StorageUnavailable(msg) => write!(f, "storage unavailable: {msg}"),
            AppError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidDescriptor(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        warn!(error = %err, "Storage operation failed");
        AppError::StorageUnavailable(err.to_string())
    }
}

impl From<time::error::Format> for AppError {
    fn from(err: time::error::Format) -> Self {
        error!(error = %err, "Timestamp formatting failed");
        AppError::Internal(err.to_string())
    }
}
