//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Whether a graph snapshot has been published
    pub graph_ready: bool,
}

/// GET /health
///
/// Answers immediately, even while the graph is still loading.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "sdos-pf".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        graph_ready: state.manager.is_ready().await,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
