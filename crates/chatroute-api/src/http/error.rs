//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
///
/// Routing itself never fails; these cover malformed input only.
#[derive(Debug)]
pub enum AppError {
    /// Validation error.
    Validation(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let request_id = uuid::Uuid::now_v7().to_string();
        let body = ApiResponse::error(code, message, request_id, 0);
        (status, body).into_response()
    }
}
