//! Path and rebuild endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use sdos_common::ArtistId;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiError;
use crate::manager::{PathQuery, PathStep, RebuildSummary};
use crate::search::ExcludedEdges;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub source_id: ArtistId,
    pub target_id: ArtistId,
    /// Rebuild the graph from the catalog before searching
    #[serde(default)]
    pub rebuild: Option<bool>,
    /// Collaborations to avoid, as `[a, b]` pairs
    #[serde(default)]
    pub exclude_edges: Option<Vec<Vec<ArtistId>>>,
}

#[derive(Debug, Serialize)]
pub struct PathResponse {
    pub found: bool,
    /// Search time in seconds
    pub seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degrees: Option<usize>,
    pub path: Vec<PathStep>,
}

/// POST /api/path
pub async fn find_path(
    State(state): State<AppState>,
    request: Result<Json<PathRequest>, JsonRejection>,
) -> Result<Json<PathResponse>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let excluded = request
        .exclude_edges
        .as_deref()
        .map(ExcludedEdges::from_lists)
        .unwrap_or_default();
    let query = PathQuery::new(request.source_id, request.target_id)
        .excluding(excluded)
        .with_rebuild(request.rebuild.unwrap_or(false));

    let outcome = state.manager.find_path(query).await?;
    let seconds = outcome.elapsed.as_secs_f64();

    if !outcome.found {
        return Ok(Json(PathResponse {
            found: false,
            seconds,
            degrees: None,
            path: Vec::new(),
        }));
    }

    let path = state
        .manager
        .describe_path(request.source_id, &outcome.path)
        .await;
    Ok(Json(PathResponse {
        found: true,
        seconds,
        degrees: Some(outcome.hop_count),
        path,
    }))
}

/// POST /api/rebuild
pub async fn rebuild_graph(State(state): State<AppState>) -> Result<Json<RebuildSummary>, ApiError> {
    info!("Graph rebuild requested over HTTP");
    let summary = state.manager.rebuild().await?;
    Ok(Json(summary))
}
