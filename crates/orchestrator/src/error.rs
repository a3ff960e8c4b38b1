//! Maps `RouterError` onto the HTTP surface's JSON error body and
//! status code, per `RouterError::http_status()`/`kind()`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contracts::RouterError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

pub struct ApiError(pub RouterError);

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: ErrorDetail { kind: self.0.kind(), message: self.0.to_string() },
        };
        (status, Json(body)).into_response()
    }
}
