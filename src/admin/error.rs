//! API error taxonomy.
//!
//! The admin UI distinguishes "no data in range" (200, empty array) from
//! "bad request" (4xx) from "backend unavailable" (5xx); this type carries
//! the latter two.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::collector::CollectorError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("trace storage unavailable")]
    StorageUnavailable,
}

impl From<CollectorError> for ApiError {
    fn from(e: CollectorError) -> Self {
        tracing::error!(error = %e, "collector read failed");
        Self::StorageUnavailable
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
