//! Multi-turn session operations
//!
//! Every operation that takes a session id loads the session first and
//! reports `NotFound` when it is gone; nothing here creates a session
//! implicitly. Concurrent writers to one session race with last-write-wins.

use std::sync::Arc;

use super::{
    catalog::CatalogClient,
    generation::Generator,
    prompt::{build_refine_prompt, RefineContext},
    sanitize::sanitize_user_message,
};
use crate::{
    db::SessionStore,
    error::{AppError, AppResult},
    models::{CandidatePool, Receipt, RecommendationResponse, SessionState, TmdbId},
};

/// Feedback for one refine turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefineRequest {
    pub feedback: String,
    pub keep_ids: Vec<TmdbId>,
    pub reject_ids: Vec<TmdbId>,
}

#[derive(Clone)]
pub struct SessionManager {
    store: SessionStore,
    catalog: CatalogClient,
    generator: Arc<Generator>,
}

impl SessionManager {
    pub fn new(store: SessionStore, catalog: CatalogClient, generator: Arc<Generator>) -> Self {
        Self {
            store,
            catalog,
            generator,
        }
    }

    pub async fn create(&self, session: &SessionState) {
        self.store.save(session).await;
        tracing::info!(
            session_id = %session.session_id,
            candidates = session.candidate_ids.len(),
            from_cache = session.from_cache,
            "Session created"
        );
    }

    pub async fn get(&self, session_id: &str) -> AppResult<SessionState> {
        self.store
            .load(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session", session_id))
    }

    pub async fn react(
        &self,
        session_id: &str,
        tmdb_id: TmdbId,
        positive: bool,
        reason: Option<String>,
    ) -> AppResult<()> {
        let mut session = self.get(session_id).await?;
        let reason = reason.map(|r| sanitize_user_message(&r).value);
        session.record_reaction(tmdb_id, positive, reason);
        self.store.save(&session).await;

        tracing::info!(
            session_id = %session_id,
            tmdb_id = tmdb_id,
            positive = positive,
            "Reaction recorded"
        );
        Ok(())
    }

    /// Sets the final selection. A later call overwrites an earlier one.
    pub async fn select(&self, session_id: &str, tmdb_id: TmdbId) -> AppResult<()> {
        let mut session = self.get(session_id).await?;
        if let Some(previous) = session.select(tmdb_id).filter(|p| *p != tmdb_id) {
            tracing::info!(
                session_id = %session_id,
                previous = previous,
                tmdb_id = tmdb_id,
                "Final selection replaced"
            );
        }
        self.store.save(&session).await;

        tracing::info!(session_id = %session_id, tmdb_id = tmdb_id, "Selection recorded");
        Ok(())
    }

    /// Re-runs generation over the original candidates minus the rejected
    /// ones, using a condensed context rather than conversation history.
    pub async fn refine(
        &self,
        session_id: &str,
        refine: RefineRequest,
    ) -> AppResult<RecommendationResponse> {
        let mut session = self.get(session_id).await?;

        let remaining: Vec<TmdbId> = session
            .candidate_ids
            .iter()
            .copied()
            .filter(|id| !refine.reject_ids.contains(id))
            .collect();
        if remaining.is_empty() {
            return Err(AppError::InvalidInput(
                "Every candidate in this session has been rejected".to_string(),
            ));
        }

        let candidates = self.catalog.enrich_ids(&remaining).await?;
        let pool = CandidatePool::new(candidates)
            .ok_or_else(|| AppError::external("catalog", "No movie candidates found"))?;

        let feedback = sanitize_user_message(&refine.feedback).value;
        let context = RefineContext {
            feedback: &feedback,
            keep_ids: &refine.keep_ids,
            reject_ids: &refine.reject_ids,
        };
        let prompt = build_refine_prompt(&pool, &session, &context)?;

        let model_id = session.model_used.clone();
        let generation = self
            .generator
            .generate(&pool, prompt, session_id, &model_id)
            .await;
        let response = generation.validated.response;

        session.extend_presented(response.picked_ids());
        session.advance_turn(generation.usage);
        self.store.save(&session).await;

        tracing::info!(
            session_id = %session_id,
            turn = session.turn_count,
            pool_size = pool.len(),
            rejected = refine.reject_ids.len(),
            "Session refined"
        );

        Ok(response)
    }

    pub async fn receipt(&self, session_id: &str) -> AppResult<Receipt> {
        Ok(self.get(session_id).await?.receipt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Cache;
    use crate::models::{
        RecommendationRequest, TmdbCredits, TmdbGenre, TmdbMovieDetails, TokenUsage, UserProfile,
    };
    use crate::services::catalog::MockCatalogProvider;
    use crate::services::llm::{Completion, MockLanguageModel, RetryPolicy};
    use crate::services::validator::ResponseValidator;

    fn details(id: TmdbId) -> TmdbMovieDetails {
        TmdbMovieDetails {
            id,
            title: format!("Movie {}", id),
            overview: None,
            release_date: Some("2015-05-01".to_string()),
            genres: vec![TmdbGenre {
                id: 35,
                name: "Comedy".to_string(),
            }],
            vote_average: 6.0 + id as f64 / 10.0,
            vote_count: 500,
            popularity: 10.0,
            runtime: Some(95),
            poster_path: None,
            backdrop_path: None,
            original_language: Some("en".to_string()),
            credits: TmdbCredits::default(),
        }
    }

    async fn manager(catalog: MockCatalogProvider, model: MockLanguageModel) -> SessionManager {
        let (cache, _handle) = Cache::in_memory().await;
        let generator = Generator::new(
            Arc::new(model),
            ResponseValidator::new("https://image.tmdb.org/t/p"),
            RetryPolicy::immediate(3),
            1500,
        );
        SessionManager::new(
            SessionStore::new(cache),
            CatalogClient::new(Arc::new(catalog), 4),
            Arc::new(generator),
        )
    }

    fn session(id: &str) -> SessionState {
        let mut session = SessionState::new(
            id.to_string(),
            RecommendationRequest::solo(UserProfile::named("Alex")),
            vec![1, 2, 3, 4, 5, 6, 7],
            "claude-haiku-4-5-20250514".to_string(),
        );
        session.extend_presented([1, 2, 3, 4, 5, 6]);
        session
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let mut model = MockLanguageModel::new();
        model.expect_complete().never();
        let manager = manager(MockCatalogProvider::new(), model).await;

        let refine = manager.refine("missing", RefineRequest::default()).await;
        assert!(matches!(refine, Err(AppError::NotFound(_))));
        assert!(manager.react("missing", 1, true, None).await.unwrap_err().is_not_found());
        assert!(manager.select("missing", 1).await.unwrap_err().is_not_found());
        assert!(manager.receipt("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_react_and_select_persist() {
        let manager = manager(MockCatalogProvider::new(), MockLanguageModel::new()).await;
        manager.create(&session("s1")).await;

        manager
            .react("s1", 2, true, Some("Loved it".to_string()))
            .await
            .unwrap();
        manager.react("s1", 3, false, None).await.unwrap();
        manager.select("s1", 2).await.unwrap();
        manager.select("s1", 4).await.unwrap();
        // Still reactable after selection
        manager.react("s1", 5, true, None).await.unwrap();

        let stored = manager.get("s1").await.unwrap();
        assert_eq!(stored.reactions.len(), 3);
        assert_eq!(stored.reactions[0].reason.as_deref(), Some("Loved it"));
        assert_eq!(stored.final_selection, Some(4));

        let receipt = manager.receipt("s1").await.unwrap();
        assert_eq!(receipt.movies_liked, 2);
        assert_eq!(receipt.movies_passed, 1);
        assert_eq!(receipt.final_pick_tmdb_id, Some(4));
    }

    #[tokio::test]
    async fn test_refine_excludes_rejected_and_extends_history() {
        let mut catalog = MockCatalogProvider::new();
        catalog
            .expect_details()
            .withf(|id| *id != 2 && *id != 3)
            .returning(|id| Ok(details(id)));

        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .withf(|request| {
                request.model == "claude-haiku-4-5-20250514"
                    && request.user_prompt.contains("- User rejected: [2, 3]")
                    && request.user_prompt.contains("- Current feedback: lighter please")
                    && !request.user_prompt.contains("[TMDB ID: 2]")
            })
            .times(1)
            .returning(|_| {
                Ok(Completion {
                    text: r#"{"best_pick": {"tmdb_id": 7, "rationale": "Light", "match_score": 8},
                             "additional_picks": [{"tmdb_id": 2}, {"tmdb_id": 5}]}"#
                        .to_string(),
                    usage: TokenUsage {
                        input_tokens: 50,
                        output_tokens: 10,
                        ..Default::default()
                    },
                })
            });

        let manager = manager(catalog, model).await;
        manager.create(&session("s2")).await;

        let response = manager
            .refine(
                "s2",
                RefineRequest {
                    feedback: "lighter please".to_string(),
                    keep_ids: vec![1],
                    reject_ids: vec![2, 3],
                },
            )
            .await
            .unwrap();

        let picked = response.picked_ids();
        assert_eq!(picked[0], 7);
        assert!(!picked.contains(&2));
        assert!(!picked.contains(&3));
        assert_eq!(picked.len(), 5);

        let stored = manager.get("s2").await.unwrap();
        assert_eq!(stored.turn_count, 2);
        assert_eq!(stored.presented_ids.len(), 6 + picked.len());
        assert_eq!(&stored.presented_ids[6..], picked.as_slice());
        assert_eq!(stored.token_usage.total(), 60);
    }

    #[tokio::test]
    async fn test_refine_rejecting_everything_is_invalid() {
        let mut model = MockLanguageModel::new();
        model.expect_complete().never();
        let manager = manager(MockCatalogProvider::new(), model).await;
        manager.create(&session("s3")).await;

        let result = manager
            .refine(
                "s3",
                RefineRequest {
                    reject_ids: vec![1, 2, 3, 4, 5, 6, 7],
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
