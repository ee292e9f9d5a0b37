use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MovieSummary, TmdbId};

/// Validated recommendation returned to the caller.
///
/// Every `tmdb_id` in `best_pick` and `additional_picks` belongs to the
/// candidate pool the response was validated against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResponse {
    pub session_id: String,
    pub best_pick: MovieSummary,
    pub additional_picks: Vec<MovieSummary>,
    pub narrow_question: Option<String>,
    pub overlap_summary: Option<String>,
    pub model_used: String,
}

impl RecommendationResponse {
    /// Best pick first, then additional picks in order
    pub fn picked_ids(&self) -> Vec<TmdbId> {
        std::iter::once(self.best_pick.tmdb_id)
            .chain(self.additional_picks.iter().map(|p| p.tmdb_id))
            .collect()
    }
}

/// Pattern-cache body: a response with its session ID stripped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedRecommendation {
    pub best_pick: MovieSummary,
    pub additional_picks: Vec<MovieSummary>,
    pub narrow_question: Option<String>,
    pub overlap_summary: Option<String>,
    pub model_used: String,
}

impl CachedRecommendation {
    pub fn into_response(self, session_id: String) -> RecommendationResponse {
        RecommendationResponse {
            session_id,
            best_pick: self.best_pick,
            additional_picks: self.additional_picks,
            narrow_question: self.narrow_question,
            overlap_summary: self.overlap_summary,
            model_used: self.model_used,
        }
    }
}

impl From<&RecommendationResponse> for CachedRecommendation {
    fn from(response: &RecommendationResponse) -> Self {
        Self {
            best_pick: response.best_pick.clone(),
            additional_picks: response.additional_picks.clone(),
            narrow_question: response.narrow_question.clone(),
            overlap_summary: response.overlap_summary.clone(),
            model_used: response.model_used.clone(),
        }
    }
}

// ============================================================================
// Model Output Types
// ============================================================================

/// Structured output the model is instructed to emit.
///
/// Field types are deliberately loose: models occasionally quote numbers or
/// return bullet lists as arrays, and those should not count as malformed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelRecommendation {
    #[serde(default)]
    pub best_pick: Option<ModelPick>,
    #[serde(default)]
    pub additional_picks: Vec<ModelPick>,
    #[serde(default)]
    pub narrow_question: Option<String>,
    #[serde(default)]
    pub overlap_summary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelPick {
    #[serde(default)]
    pub tmdb_id: Value,
    #[serde(default)]
    pub rationale: Value,
    #[serde(default)]
    pub match_score: Value,
}

impl ModelPick {
    /// Catalog ID as a number; accepts `550` and `"550"`
    pub fn tmdb_id(&self) -> Option<TmdbId> {
        match &self.tmdb_id {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn rationale(&self) -> String {
        match &self.rationale {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }

    /// Match score clamped to the 1–10 scale the prompt asks for
    pub fn match_score(&self) -> Option<f64> {
        let score = match &self.match_score {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        score.is_finite().then(|| score.clamp(1.0, 10.0))
    }
}
