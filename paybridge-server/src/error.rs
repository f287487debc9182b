//! HTTP mapping of the core error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use paybridge::PaymentError;

/// Wraps [`PaymentError`] so handlers can use `?` and still produce the
/// right status code and JSON body.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ApiError(#[from] pub PaymentError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PaymentError::Validation(_) => StatusCode::BAD_REQUEST,
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            // upstream trouble; the payer can retry the checkout
            PaymentError::Auth(_) | PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Duplicate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "success": false, "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
