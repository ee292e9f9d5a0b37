use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::{
    error::AppResult,
    models::{MovieCandidate, MovieSummary, TmdbId},
    services::ResponseValidator,
};

const TRENDING_LIMIT: usize = 20;
const SEARCH_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

fn summaries(validator: &ResponseValidator, candidates: &[MovieCandidate]) -> Vec<MovieSummary> {
    candidates
        .iter()
        .map(|c| validator.summary(c, None, ""))
        .collect()
}

/// Handler for the trending list, enriched with details
pub async fn trending(State(state): State<AppState>) -> AppResult<Json<Vec<MovieSummary>>> {
    let recommender = &state.recommender;
    let candidates = recommender
        .catalog()
        .trending_candidates(TRENDING_LIMIT)
        .await?;

    Ok(Json(summaries(recommender.validator(), &candidates)))
}

/// Handler for title search (`?q=<title>&page=<n>`)
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Vec<MovieSummary>>> {
    let recommender = &state.recommender;
    let candidates = recommender
        .catalog()
        .search(&params.q, params.page, SEARCH_LIMIT)
        .await?;

    Ok(Json(summaries(recommender.validator(), &candidates)))
}

pub async fn details(
    State(state): State<AppState>,
    Path(tmdb_id): Path<TmdbId>,
) -> AppResult<Json<MovieSummary>> {
    let recommender = &state.recommender;
    let candidate = recommender.catalog().movie_details(tmdb_id).await?;
    Ok(Json(recommender.validator().summary(&candidate, None, "")))
}
