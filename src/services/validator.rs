//! Closed-world validation of model output
//!
//! Whatever the model returns, the response built here only references
//! movies from the candidate pool it was given. Anomalies are repaired and
//! reported, never raised.

use std::collections::HashSet;

use serde_json::Value;

use super::prompt::ADDITIONAL_PICKS;
use crate::models::{
    CandidatePool, MovieCandidate, MovieSummary, ModelRecommendation, RecommendationResponse,
    TmdbId,
};

pub const PARSE_FALLBACK_BEST_RATIONALE: &str = "Top rated match";
pub const PARSE_FALLBACK_RATIONALE: &str = "Highly rated";
pub const BACKFILL_RATIONALE: &str = "Strong match";
pub const UNAVAILABLE_BEST_RATIONALE: &str = "Top rated match (AI temporarily unavailable)";
pub const UNAVAILABLE_RATIONALE: &str = "Highly rated match";
pub const FALLBACK_NARROW_QUESTION: &str =
    "Would you prefer something more action-packed or more character-driven?";
pub const FALLBACK_MODEL_SUFFIX: &str = " (fallback)";

/// Outcome of decoding raw model text
#[derive(Debug, Clone)]
pub enum ParseResult {
    Structured(ModelRecommendation),
    Malformed { reason: String },
}

impl ParseResult {
    /// Strips a markdown code fence if present, then decodes a JSON object
    pub fn from_raw(raw: &str) -> Self {
        let text = strip_code_fence(raw);

        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                return ParseResult::Malformed {
                    reason: e.to_string(),
                }
            }
        };
        if !value.is_object() {
            return ParseResult::Malformed {
                reason: "top-level JSON value is not an object".to_string(),
            };
        }

        match serde_json::from_value(value) {
            Ok(recommendation) => ParseResult::Structured(recommendation),
            Err(e) => ParseResult::Malformed {
                reason: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationAnomaly {
    /// Output was not the structured shape; rating fallback used
    Malformed { reason: String },
    /// Best pick missing or outside the pool; first candidate substituted
    HallucinatedBestPick { tmdb_id: Option<TmdbId> },
    /// Additional pick outside the pool; dropped
    HallucinatedAdditionalPick { tmdb_id: Option<TmdbId> },
    /// Pick repeating an earlier one; dropped
    DuplicatePick { tmdb_id: TmdbId },
    /// Unused candidates appended to reach the target pick count
    Backfilled { count: usize },
    /// Model call exhausted its retries; rating fallback used
    ModelUnavailable { reason: String },
}

/// What the validator had to repair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub anomalies: Vec<ValidationAnomaly>,
}

impl ValidationReport {
    pub fn hallucination_count(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| {
                matches!(
                    a,
                    ValidationAnomaly::HallucinatedBestPick { .. }
                        | ValidationAnomaly::HallucinatedAdditionalPick { .. }
                )
            })
            .count()
    }

    pub fn is_malformed(&self) -> bool {
        self.anomalies
            .iter()
            .any(|a| matches!(a, ValidationAnomaly::Malformed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    fn record(&mut self, anomaly: ValidationAnomaly) {
        self.anomalies.push(anomaly);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub response: RecommendationResponse,
    pub report: ValidationReport,
}

#[derive(Debug, Clone)]
pub struct ResponseValidator {
    image_base_url: String,
}

impl ResponseValidator {
    pub fn new(image_base_url: impl Into<String>) -> Self {
        Self {
            image_base_url: image_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Parses and validates raw model text against the pool
    pub fn parse_response(
        &self,
        raw_text: &str,
        pool: &CandidatePool,
        session_id: &str,
        model_used: &str,
    ) -> Validated {
        match ParseResult::from_raw(raw_text) {
            ParseResult::Structured(recommendation) => {
                self.validate(recommendation, pool, session_id, model_used)
            }
            ParseResult::Malformed { reason } => {
                let preview: String = raw_text.chars().take(200).collect();
                tracing::warn!(
                    reason = %reason,
                    raw = %preview,
                    "Model response parse failed"
                );
                Validated {
                    response: self.rank_by_rating(pool, session_id, model_used),
                    report: ValidationReport {
                        anomalies: vec![ValidationAnomaly::Malformed { reason }],
                    },
                }
            }
        }
    }

    /// Checks every pick against the pool, substitutes a hallucinated best
    /// pick, drops hallucinated or repeated additional picks and backfills
    /// up to the target count.
    pub fn validate(
        &self,
        recommendation: ModelRecommendation,
        pool: &CandidatePool,
        session_id: &str,
        model_used: &str,
    ) -> Validated {
        let mut report = ValidationReport::default();

        let best_pick = match recommendation
            .best_pick
            .as_ref()
            .and_then(|pick| pick.tmdb_id().and_then(|id| pool.get(id)).map(|c| (pick, c)))
        {
            Some((pick, candidate)) => self.summary(candidate, pick.match_score(), pick.rationale()),
            None => {
                let claimed = recommendation.best_pick.as_ref().and_then(|p| p.tmdb_id());
                tracing::warn!(tmdb_id = ?claimed, "Hallucinated best pick");
                report.record(ValidationAnomaly::HallucinatedBestPick { tmdb_id: claimed });

                let (score, rationale) = recommendation
                    .best_pick
                    .as_ref()
                    .map(|p| (p.match_score(), p.rationale()))
                    .unwrap_or((None, String::new()));
                self.summary(pool.first(), score, rationale)
            }
        };

        let mut used: HashSet<TmdbId> = HashSet::from([best_pick.tmdb_id]);
        let mut additional_picks = Vec::with_capacity(ADDITIONAL_PICKS);

        for pick in &recommendation.additional_picks {
            let claimed = pick.tmdb_id();
            let Some(candidate) = claimed.and_then(|id| pool.get(id)) else {
                tracing::warn!(tmdb_id = ?claimed, "Hallucinated additional pick");
                report.record(ValidationAnomaly::HallucinatedAdditionalPick { tmdb_id: claimed });
                continue;
            };
            if !used.insert(candidate.tmdb_id) {
                report.record(ValidationAnomaly::DuplicatePick {
                    tmdb_id: candidate.tmdb_id,
                });
                continue;
            }
            if additional_picks.len() < ADDITIONAL_PICKS {
                additional_picks.push(self.summary(
                    candidate,
                    pick.match_score(),
                    pick.rationale(),
                ));
            }
        }

        let before = additional_picks.len();
        for candidate in pool.iter() {
            if additional_picks.len() >= ADDITIONAL_PICKS {
                break;
            }
            if used.insert(candidate.tmdb_id) {
                additional_picks.push(self.summary(candidate, None, BACKFILL_RATIONALE));
            }
        }
        let backfilled = additional_picks.len() - before;
        if backfilled > 0 {
            tracing::debug!(count = backfilled, "Backfilled additional picks");
            report.record(ValidationAnomaly::Backfilled { count: backfilled });
        }

        Validated {
            response: RecommendationResponse {
                session_id: session_id.to_string(),
                best_pick,
                additional_picks,
                narrow_question: recommendation.narrow_question,
                overlap_summary: recommendation.overlap_summary,
                model_used: model_used.to_string(),
            },
            report,
        }
    }

    /// Deterministic ranking used when the model output is unusable
    pub fn rank_by_rating(
        &self,
        pool: &CandidatePool,
        session_id: &str,
        model_used: &str,
    ) -> RecommendationResponse {
        let ranked = by_rating_desc(pool);

        RecommendationResponse {
            session_id: session_id.to_string(),
            best_pick: self.summary(ranked[0], None, PARSE_FALLBACK_BEST_RATIONALE),
            additional_picks: ranked[1..]
                .iter()
                .take(ADDITIONAL_PICKS)
                .map(|c| self.summary(c, None, PARSE_FALLBACK_RATIONALE))
                .collect(),
            narrow_question: Some(FALLBACK_NARROW_QUESTION.to_string()),
            overlap_summary: None,
            model_used: model_used.to_string(),
        }
    }

    /// Deterministic ranking used when the model could not be reached at all
    pub fn model_unavailable(
        &self,
        pool: &CandidatePool,
        session_id: &str,
        model_used: &str,
        reason: &str,
    ) -> Validated {
        tracing::warn!(
            model = %model_used,
            candidates = pool.len(),
            reason = %reason,
            "Model fallback activated"
        );
        let ranked = by_rating_desc(pool);

        let response = RecommendationResponse {
            session_id: session_id.to_string(),
            best_pick: self.summary(ranked[0], Some(8.0), UNAVAILABLE_BEST_RATIONALE),
            additional_picks: ranked[1..]
                .iter()
                .take(ADDITIONAL_PICKS)
                .enumerate()
                .map(|(i, c)| self.summary(c, Some(7.0 - 0.5 * i as f64), UNAVAILABLE_RATIONALE))
                .collect(),
            narrow_question: Some(FALLBACK_NARROW_QUESTION.to_string()),
            overlap_summary: None,
            model_used: format!("{}{}", model_used, FALLBACK_MODEL_SUFFIX),
        };

        Validated {
            response,
            report: ValidationReport {
                anomalies: vec![ValidationAnomaly::ModelUnavailable {
                    reason: reason.to_string(),
                }],
            },
        }
    }

    pub fn summary(
        &self,
        candidate: &MovieCandidate,
        match_score: Option<f64>,
        rationale: impl Into<String>,
    ) -> MovieSummary {
        MovieSummary::from_candidate(candidate, &self.image_base_url, match_score, rationale)
    }
}

/// Rating descending; ties keep pool order
fn by_rating_desc(pool: &CandidatePool) -> Vec<&MovieCandidate> {
    let mut ranked: Vec<&MovieCandidate> = pool.iter().collect();
    ranked.sort_by(|a, b| b.vote_average.total_cmp(&a.vote_average));
    ranked
}

fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the opening fence line, including any language tag
    let body = match rest.find('\n') {
        Some(index) => &rest[index + 1..],
        None => return text,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

    fn candidate(tmdb_id: TmdbId, vote_average: f64) -> MovieCandidate {
        MovieCandidate {
            tmdb_id,
            title: format!("Movie {}", tmdb_id),
            overview: String::new(),
            release_date: None,
            genres: vec!["Drama".to_string()],
            genre_ids: vec![18],
            vote_average,
            vote_count: 100,
            popularity: 1.0,
            runtime: None,
            poster_path: Some("/p.jpg".to_string()),
            backdrop_path: None,
            original_language: "en".to_string(),
            director_names: vec![],
            cast_names: vec![],
        }
    }

    /// Six candidates; 104 has the highest rating
    fn pool() -> CandidatePool {
        CandidatePool::new(vec![
            candidate(101, 7.1),
            candidate(102, 6.5),
            candidate(103, 7.9),
            candidate(104, 8.8),
            candidate(105, 5.9),
            candidate(106, 7.0),
        ])
        .unwrap()
    }

    fn validator() -> ResponseValidator {
        ResponseValidator::new(IMAGE_BASE)
    }

    fn ids(response: &RecommendationResponse) -> Vec<TmdbId> {
        response.picked_ids()
    }

    #[test]
    fn test_well_formed_output() {
        let raw = r#"{
            "best_pick": {"tmdb_id": 103, "rationale": "Great", "match_score": 9},
            "additional_picks": [
                {"tmdb_id": 101, "rationale": "a", "match_score": 8},
                {"tmdb_id": 102, "rationale": "b", "match_score": 7},
                {"tmdb_id": 104, "rationale": "c", "match_score": 7},
                {"tmdb_id": 105, "rationale": "d", "match_score": 6},
                {"tmdb_id": 106, "rationale": "e", "match_score": 6}
            ],
            "narrow_question": "Funny or tense?"
        }"#;
        let validated = validator().parse_response(raw, &pool(), "s", "model");

        assert!(validated.report.is_clean());
        assert_eq!(validated.response.best_pick.tmdb_id, 103);
        assert_eq!(validated.response.best_pick.match_score, Some(9.0));
        assert_eq!(validated.response.additional_picks.len(), 5);
        assert_eq!(validated.response.narrow_question.as_deref(), Some("Funny or tense?"));
        assert_eq!(
            validated.response.best_pick.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/p.jpg")
        );
    }

    #[test]
    fn test_hallucinated_best_pick_substitutes_first_candidate() {
        let raw = r#"{"best_pick": {"tmdb_id": 99999, "rationale": "x", "match_score": 9}, "additional_picks": []}"#;
        let validated = validator().parse_response(raw, &pool(), "s", "model");

        assert_eq!(validated.response.best_pick.tmdb_id, 101);
        assert_eq!(validated.report.hallucination_count(), 1);
        assert_eq!(
            validated.report.anomalies[0],
            ValidationAnomaly::HallucinatedBestPick {
                tmdb_id: Some(99999)
            }
        );
    }

    #[test]
    fn test_hallucinated_additional_picks_dropped_then_backfilled() {
        let raw = r#"{
            "best_pick": {"tmdb_id": 104, "rationale": "x", "match_score": 9},
            "additional_picks": [
                {"tmdb_id": 5000, "rationale": "fake", "match_score": 8},
                {"tmdb_id": 106, "rationale": "real", "match_score": 7}
            ]
        }"#;
        let validated = validator().parse_response(raw, &pool(), "s", "model");
        let response = &validated.response;

        assert_eq!(ids(response), vec![104, 106, 101, 102, 103, 105]);
        assert_eq!(response.additional_picks[0].rationale, "real");
        assert_eq!(response.additional_picks[1].rationale, BACKFILL_RATIONALE);
        assert_eq!(validated.report.hallucination_count(), 1);
        assert!(validated
            .report
            .anomalies
            .contains(&ValidationAnomaly::Backfilled { count: 4 }));
    }

    #[test]
    fn test_duplicates_removed() {
        let raw = r#"{
            "best_pick": {"tmdb_id": 101},
            "additional_picks": [{"tmdb_id": 101}, {"tmdb_id": 102}, {"tmdb_id": 102}]
        }"#;
        let validated = validator().parse_response(raw, &pool(), "s", "model");
        let picked = ids(&validated.response);

        let unique: HashSet<TmdbId> = picked.iter().copied().collect();
        assert_eq!(unique.len(), picked.len());
        assert_eq!(picked.len(), 6);
        assert_eq!(validated.report.hallucination_count(), 0);
    }

    #[test]
    fn test_extra_picks_truncated() {
        let pool = CandidatePool::new((1..=10).map(|id| candidate(id, 7.0)).collect()).unwrap();
        let additional: Vec<String> = (2..=10)
            .map(|id| format!(r#"{{"tmdb_id": {}}}"#, id))
            .collect();
        let raw = format!(
            r#"{{"best_pick": {{"tmdb_id": 1}}, "additional_picks": [{}]}}"#,
            additional.join(",")
        );
        let validated = validator().parse_response(&raw, &pool, "s", "model");
        assert_eq!(validated.response.additional_picks.len(), ADDITIONAL_PICKS);
    }

    #[test]
    fn test_prose_falls_back_to_rating_order() {
        let raw = "I think you would love Inception, it's a classic!";
        let validated = validator().parse_response(raw, &pool(), "s", "model");
        let response = &validated.response;

        assert!(validated.report.is_malformed());
        assert_eq!(response.best_pick.tmdb_id, 104);
        assert_eq!(response.best_pick.rationale, PARSE_FALLBACK_BEST_RATIONALE);
        assert_eq!(ids(response), vec![104, 103, 101, 106, 102, 105]);
        assert_eq!(response.narrow_question.as_deref(), Some(FALLBACK_NARROW_QUESTION));
        assert_eq!(response.model_used, "model");
    }

    #[test]
    fn test_non_object_json_is_malformed() {
        let validated = validator().parse_response("[1, 2, 3]", &pool(), "s", "model");
        assert!(validated.report.is_malformed());
        assert_eq!(validated.response.best_pick.tmdb_id, 104);
    }

    #[test]
    fn test_code_fence_stripped() {
        let raw = "```json\n{\"best_pick\": {\"tmdb_id\": 102}, \"additional_picks\": []}\n```";
        let validated = validator().parse_response(raw, &pool(), "s", "model");
        assert!(!validated.report.is_malformed());
        assert_eq!(validated.response.best_pick.tmdb_id, 102);
    }

    #[test]
    fn test_missing_best_pick_is_substituted() {
        let validated = validator().parse_response(r#"{"additional_picks": []}"#, &pool(), "s", "m");
        assert_eq!(validated.response.best_pick.tmdb_id, 101);
        assert_eq!(
            validated.report.anomalies[0],
            ValidationAnomaly::HallucinatedBestPick { tmdb_id: None }
        );
    }

    #[test]
    fn test_small_pool_backfills_what_exists() {
        let pool = CandidatePool::new(vec![candidate(1, 7.0), candidate(2, 6.0)]).unwrap();
        let validated = validator().parse_response(r#"{"best_pick": {"tmdb_id": 2}}"#, &pool, "s", "m");
        assert_eq!(ids(&validated.response), vec![2, 1]);
    }

    #[test]
    fn test_model_unavailable_fallback() {
        let validated = validator().model_unavailable(&pool(), "s", "claude-opus-4-6", "HTTP 529");
        let response = &validated.response;

        assert_eq!(response.model_used, "claude-opus-4-6 (fallback)");
        assert_eq!(response.best_pick.tmdb_id, 104);
        assert_eq!(response.best_pick.match_score, Some(8.0));
        assert_eq!(response.best_pick.rationale, UNAVAILABLE_BEST_RATIONALE);
        let scores: Vec<Option<f64>> = response
            .additional_picks
            .iter()
            .map(|p| p.match_score)
            .collect();
        assert_eq!(
            scores,
            vec![Some(7.0), Some(6.5), Some(6.0), Some(5.5), Some(5.0)]
        );
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
        assert_eq!(strip_code_fence("```{}```"), "```{}```");
    }
}
