use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::{
    error::AppResult,
    models::{Receipt, RecommendationRequest, RecommendationResponse, TmdbId},
    services::RefineRequest,
};

#[derive(Debug, Deserialize)]
pub struct RefineBody {
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub keep_tmdb_ids: Vec<TmdbId>,
    #[serde(default)]
    pub reject_tmdb_ids: Vec<TmdbId>,
}

#[derive(Debug, Deserialize)]
pub struct ReactBody {
    pub tmdb_id: TmdbId,
    pub positive: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectBody {
    pub tmdb_id: TmdbId,
}

/// Handler for the top-level recommendation
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let response = state.recommender.recommend(request).await?;
    Ok(Json(response))
}

pub async fn refine(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<RefineBody>,
) -> AppResult<Json<RecommendationResponse>> {
    let refine = RefineRequest {
        feedback: body.feedback,
        keep_ids: body.keep_tmdb_ids,
        reject_ids: body.reject_tmdb_ids,
    };
    let response = state
        .recommender
        .sessions()
        .refine(&session_id, refine)
        .await?;
    Ok(Json(response))
}

pub async fn react(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<ReactBody>,
) -> AppResult<Json<Value>> {
    state
        .recommender
        .sessions()
        .react(&session_id, body.tmdb_id, body.positive, body.reason)
        .await?;
    Ok(Json(json!({ "message": "Reaction recorded" })))
}

pub async fn select(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<SelectBody>,
) -> AppResult<Json<Value>> {
    state
        .recommender
        .sessions()
        .select(&session_id, body.tmdb_id)
        .await?;
    Ok(Json(json!({
        "message": "Selection recorded",
        "tmdb_id": body.tmdb_id
    })))
}

pub async fn receipt(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<Receipt>> {
    let receipt = state.recommender.sessions().receipt(&session_id).await?;
    Ok(Json(receipt))
}
