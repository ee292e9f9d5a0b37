//! Recommendation orchestrator
//!
//! Flow:
//! 1. Cache check: normalized request → pattern cache. A hit skips straight
//!    to session creation.
//! 2. Candidate fetch: discover + trending, falling back to trending alone.
//! 3. Score and prompt: complexity tier picks the model.
//! 4. Model call with retry, then closed-world validation.
//! 5. Pattern cache write (background), session write (awaited).

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::{
    cache_key::{normalize_cache_key, PATTERN_CACHE_TTL_SECONDS},
    catalog::{CandidateQuery, CatalogClient},
    complexity::{ComplexityScore, ComplexityScorer},
    generation::Generator,
    prompt::build_prompt,
    sanitize::sanitize_request,
    session::SessionManager,
    validator::{ResponseValidator, ValidationReport},
};
use crate::{
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        CachedRecommendation, CandidatePool, MovieCandidate, RecommendationRequest,
        RecommendationResponse, SessionState,
    },
};

/// Trending movies used when the filtered fetch comes back empty
pub const FALLBACK_TRENDING_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CacheCheck,
    CandidateFetch,
    ScoreAndPrompt,
    ModelCall,
    Validate,
    CacheStore,
    SessionStore,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CacheCheck => "cache_check",
            Stage::CandidateFetch => "candidate_fetch",
            Stage::ScoreAndPrompt => "score_and_prompt",
            Stage::ModelCall => "model_call",
            Stage::Validate => "validate",
            Stage::CacheStore => "cache_store",
            Stage::SessionStore => "session_store",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished recommendation with the path it took
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub response: RecommendationResponse,
    pub stages: Vec<Stage>,
    pub complexity: ComplexityScore,
    /// `None` on a pattern-cache hit
    pub report: Option<ValidationReport>,
    pub from_cache: bool,
}

/// Stage log for one request
struct Trace<'a> {
    session_id: &'a str,
    stages: Vec<Stage>,
}

impl<'a> Trace<'a> {
    fn new(session_id: &'a str) -> Self {
        Self {
            session_id,
            stages: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(session_id = %self.session_id, stage = %stage, "Recommendation stage");
        self.stages.push(stage);
    }
}

#[derive(Clone)]
pub struct Recommender {
    cache: Cache,
    catalog: CatalogClient,
    scorer: ComplexityScorer,
    generator: Arc<Generator>,
    sessions: SessionManager,
    max_candidates: usize,
}

impl Recommender {
    pub fn new(
        cache: Cache,
        catalog: CatalogClient,
        scorer: ComplexityScorer,
        generator: Arc<Generator>,
        sessions: SessionManager,
        max_candidates: usize,
    ) -> Self {
        Self {
            cache,
            catalog,
            scorer,
            generator,
            sessions,
            max_candidates,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// Validator shared with every generation turn; also renders summaries
    /// for the catalog passthrough endpoints
    pub fn validator(&self) -> &ResponseValidator {
        self.generator.validator()
    }

    pub async fn recommend(&self, request: RecommendationRequest) -> AppResult<RecommendationResponse> {
        self.run(request).await.map(|r| r.response)
    }

    pub async fn run(&self, request: RecommendationRequest) -> AppResult<Recommendation> {
        request.validate()?;

        let request = sanitize_request(&request).value;
        let session_id = Uuid::new_v4().to_string();
        let complexity = self.scorer.score(&request);
        let mut trace = Trace::new(&session_id);

        tracing::info!(
            session_id = %session_id,
            mode = request.mode.as_str(),
            users = request.users.len(),
            score = complexity.score,
            tier = %complexity.tier,
            model = %complexity.model,
            "Recommendation requested"
        );

        trace.enter(Stage::CacheCheck);
        let cache_key = CacheKey::Pattern(normalize_cache_key(&request));
        if let Some(cached) = self
            .cache
            .get_from_cache::<CachedRecommendation>(&cache_key)
            .await?
        {
            tracing::info!(session_id = %session_id, key = %cache_key, "Pattern cache hit");
            let response = cached.into_response(session_id.clone());

            trace.enter(Stage::SessionStore);
            let picked = response.picked_ids();
            let mut session = SessionState::new(
                session_id.clone(),
                request,
                picked.clone(),
                response.model_used.clone(),
            );
            session.extend_presented(picked);
            session.complexity = Some(complexity.clone());
            session.from_cache = true;
            self.sessions.create(&session).await;

            trace.enter(Stage::Done);
            return Ok(Recommendation {
                response,
                stages: trace.stages,
                complexity,
                report: None,
                from_cache: true,
            });
        }

        trace.enter(Stage::CandidateFetch);
        let candidates = self.fetch_candidates(&request).await;
        let pool = CandidatePool::new(candidates).ok_or_else(|| {
            tracing::error!(session_id = %session_id, "No candidates from any source");
            AppError::external("catalog", "No movie candidates found")
        })?;

        trace.enter(Stage::ScoreAndPrompt);
        let prompt = build_prompt(&pool, &request)?;

        trace.enter(Stage::ModelCall);
        let generation = self
            .generator
            .generate(&pool, prompt, &session_id, &complexity.model)
            .await;
        trace.enter(Stage::Validate);

        if generation.is_cacheable() {
            trace.enter(Stage::CacheStore);
            self.cache.set_in_background(
                &cache_key,
                &CachedRecommendation::from(&generation.validated.response),
                PATTERN_CACHE_TTL_SECONDS,
            );
        }

        trace.enter(Stage::SessionStore);
        let response = generation.validated.response;
        let mut session = SessionState::new(
            session_id.clone(),
            request,
            pool.ids(),
            complexity.model.clone(),
        );
        session.extend_presented(response.picked_ids());
        session.token_usage = generation.usage;
        session.complexity = Some(complexity.clone());
        self.sessions.create(&session).await;

        trace.enter(Stage::Done);
        tracing::info!(
            session_id = %session_id,
            candidates = pool.len(),
            best_pick = response.best_pick.tmdb_id,
            model_used = %response.model_used,
            "Recommendation complete"
        );

        Ok(Recommendation {
            response,
            stages: trace.stages,
            complexity,
            report: Some(generation.validated.report),
            from_cache: false,
        })
    }

    /// Filtered fetch first, trending second. Empty means nothing was found.
    async fn fetch_candidates(&self, request: &RecommendationRequest) -> Vec<MovieCandidate> {
        let query = CandidateQuery::from_request(request, self.max_candidates);
        match self.catalog.fetch_candidates(&query).await {
            Ok(candidates) if !candidates.is_empty() => return candidates,
            Ok(_) => tracing::warn!("No filtered candidates, falling back to trending"),
            Err(e) => tracing::warn!(error = %e, "Candidate fetch failed, falling back to trending"),
        }

        self.catalog
            .trending_candidates(FALLBACK_TRENDING_LIMIT)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Trending fallback failed");
                Vec::new()
            })
    }
}
