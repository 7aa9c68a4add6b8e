//! sdos-pf library - artist collaboration pathfinder
//!
//! Builds an undirected artist collaboration graph from a MusicBrainz catalog,
//! caches it on disk and answers shortest-path queries between two artists,
//! reporting the recording that links each hop.

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod cache;
pub mod catalog;
pub mod error;
pub mod graph;
pub mod logging;
pub mod manager;
pub mod search;

pub use error::{Error, Result};
pub use manager::{GraphManager, ManagerSettings, PathOutcome, PathQuery, PathStep};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<GraphManager>,
}

impl AppState {
    pub fn new(manager: Arc<GraphManager>) -> Self {
        Self { manager }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(api::search_artists))
        .route("/api/path", post(api::find_path))
        .route("/api/rebuild", post(api::rebuild_graph))
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
