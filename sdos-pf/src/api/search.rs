//! Artist search endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use sdos_common::ArtistMatch;
use serde::Deserialize;

use super::ApiError;
use crate::AppState;

pub const DEFAULT_SEARCH_LIMIT: i64 = 10;
pub const MAX_SEARCH_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Artist name (required, non-blank)
    pub q: Option<String>,
    /// Maximum number of hits, clamped to 1..=50
    pub limit: Option<i64>,
}

/// GET /api/search?q=NAME&limit=N
///
/// Ranked artist matches: exact name, then alias, then substring.
pub async fn search_artists(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<ArtistMatch>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query parameter 'q' must not be empty".to_string()));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT) as usize;

    let matches = state.manager.search_artists(query, limit).await?;
    Ok(Json(matches))
}
