//! HTTP error mapping
//!
//! Every error body has the shape `{"error": {"code", "message", ...}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Failure reported by the pathfinder
    #[error(transparent)]
    Pathfinder(#[from] Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, missing) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Pathfinder(err) => match err {
                Error::EntityNotInGraph { missing } => (
                    StatusCode::NOT_FOUND,
                    "NOT_IN_GRAPH",
                    "One or more artists not present in the filtered collaboration graph"
                        .to_string(),
                    Some(missing),
                ),
                Error::NotReady => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "NOT_READY",
                    err.to_string(),
                    None,
                ),
                Error::SearchExhausted { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "SEARCH_EXHAUSTED",
                    err.to_string(),
                    None,
                ),
                Error::CatalogUnavailable(_) => {
                    error!("{}", err);
                    (StatusCode::BAD_GATEWAY, "CATALOG_UNAVAILABLE", err.to_string(), None)
                }
                other => {
                    error!("Request failed: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        other.to_string(),
                        None,
                    )
                }
            },
        };

        let mut detail = json!({
            "code": code,
            "message": message,
        });
        if let Some(missing) = missing {
            detail["missing"] = json!(missing);
        }

        (status, Json(json!({ "error": detail }))).into_response()
    }
}
