//! HTTP mapping for pipeline errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::models::ErrorBody;
use crate::error::LembarError;

impl IntoResponse for LembarError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!("OCR processing error: {:?}", self);
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = ErrorBody {
            error: self.to_string(),
            details: self.detail().map(str::to_string),
        };

        (status, Json(body)).into_response()
    }
}
