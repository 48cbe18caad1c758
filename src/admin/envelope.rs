//! Response envelope (spec §6): `{ success, data, meta?, error? }` with
//! stable error codes, the way `server::server::routes` handlers translate
//! internal errors into typed JSON.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::AggregatorError;

#[derive(Debug, Serialize)]
pub struct Meta {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope { success: true, data: Some(data), meta: None, error: None }
    }

    pub fn ok_with_meta(data: T, meta: Meta) -> Self {
        Envelope { success: true, data: Some(data), meta: Some(meta), error: None }
    }
}

impl Envelope<()> {
    pub fn err(code: &'static str, message: impl Into<String>) -> Self {
        Envelope { success: false, data: None, meta: None, error: Some(ErrorBody { code, message: message.into(), details: None }) }
    }
}

/// Maps [`AggregatorError`] onto an HTTP status and the stable error
/// envelope (spec §6, §7).
pub struct ApiError(pub AggregatorError);

impl From<AggregatorError> for ApiError {
    fn from(err: AggregatorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AggregatorError::AlreadyRunning => StatusCode::CONFLICT,
            AggregatorError::NotFound => StatusCode::NOT_FOUND,
            AggregatorError::Repository(crate::error::RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            AggregatorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Envelope::<()>::err(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_running_maps_to_409() {
        let err = ApiError(AggregatorError::AlreadyRunning);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
