//! Catalog abstraction
//!
//! A `CatalogProvider` speaks the provider's native shapes (discover, trending
//! and search stubs, full details). `CatalogClient` sits on top of it and turns
//! those into enriched, de-duplicated `MovieCandidate`s for the recommender.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{
    error::{AppError, AppResult},
    models::{MovieCandidate, RecommendationRequest, TmdbId, TmdbMovie, TmdbMovieDetails},
};

pub mod genres;
pub mod tmdb;

pub use genres::resolve_genre_ids;
pub use tmdb::TmdbProvider;

/// Filters for the discover endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverFilters {
    pub with_genres: Vec<u32>,
    pub without_genres: Vec<u32>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub min_vote_average: f64,
    pub min_vote_count: u32,
}

impl Default for DiscoverFilters {
    fn default() -> Self {
        Self {
            with_genres: Vec::new(),
            without_genres: Vec::new(),
            year_min: None,
            year_max: None,
            min_vote_average: 5.5,
            min_vote_count: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrendingWindow {
    Day,
    #[default]
    Week,
}

impl TrendingWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendingWindow::Day => "day",
            TrendingWindow::Week => "week",
        }
    }
}

/// Trait for movie catalog providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Filtered catalog listing, best rated first
    async fn discover(&self, filters: &DiscoverFilters) -> AppResult<Vec<TmdbMovie>>;

    async fn trending(&self, window: TrendingWindow) -> AppResult<Vec<TmdbMovie>>;

    /// Title search, one page of results in provider relevance order
    async fn search(&self, query: &str, page: u32) -> AppResult<Vec<TmdbMovie>>;

    /// Full record for one movie including credits
    async fn details(&self, tmdb_id: TmdbId) -> AppResult<TmdbMovieDetails>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Longest title query forwarded to the provider
pub const MAX_SEARCH_QUERY_CHARS: usize = 200;

/// What to source candidates for
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateQuery {
    pub liked_genres: Vec<String>,
    pub disliked_genres: Vec<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub max_candidates: usize,
}

impl CandidateQuery {
    /// Genres are merged across all users; year bounds come from the
    /// primary user.
    pub fn from_request(request: &RecommendationRequest, max_candidates: usize) -> Self {
        let year_range = request
            .primary_user()
            .and_then(|user| user.year_range.as_ref());

        Self {
            liked_genres: request.liked_genres(),
            disliked_genres: request.disliked_genres(),
            year_min: year_range.and_then(|range| range.min),
            year_max: year_range.and_then(|range| range.max),
            max_candidates,
        }
    }
}

#[derive(Clone)]
pub struct CatalogClient {
    provider: Arc<dyn CatalogProvider>,
    enrich_concurrency: usize,
}

impl CatalogClient {
    pub fn new(provider: Arc<dyn CatalogProvider>, enrich_concurrency: usize) -> Self {
        Self {
            provider,
            enrich_concurrency: enrich_concurrency.max(1),
        }
    }

    /// Sources and enriches candidates for a query.
    ///
    /// Discover and trending are queried together. One of them failing is
    /// tolerated; both failing is an error. An empty result is not an error,
    /// the caller decides what to fall back to.
    pub async fn fetch_candidates(&self, query: &CandidateQuery) -> AppResult<Vec<MovieCandidate>> {
        let excluded = resolve_genre_ids(&query.disliked_genres);
        let filters = DiscoverFilters {
            with_genres: resolve_genre_ids(&query.liked_genres),
            without_genres: excluded.clone(),
            year_min: query.year_min,
            year_max: query.year_max,
            ..Default::default()
        };

        let (discovered, trending) = tokio::join!(
            self.provider.discover(&filters),
            self.provider.trending(TrendingWindow::Week)
        );

        let (discovered, trending) = match (discovered, trending) {
            (Err(e), Err(trending_err)) => {
                tracing::error!(error = %e, trending_error = %trending_err, "Catalog discover and trending both failed");
                return Err(e);
            }
            (discovered, trending) => (
                discovered.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Catalog discover failed, using trending only");
                    Vec::new()
                }),
                trending.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Catalog trending failed, using discover only");
                    Vec::new()
                }),
            ),
        };

        let stubs = merge_stubs(discovered, trending, &excluded, query.max_candidates);

        tracing::info!(
            with_genres = ?filters.with_genres,
            without_genres = ?filters.without_genres,
            year_min = ?query.year_min,
            year_max = ?query.year_max,
            stub_count = stubs.len(),
            "Fetched candidate stubs"
        );

        if stubs.is_empty() {
            return Ok(Vec::new());
        }

        self.enrich_ids(&stubs).await
    }

    /// Plain trending list, enriched
    pub async fn trending_candidates(&self, limit: usize) -> AppResult<Vec<MovieCandidate>> {
        let ids: Vec<TmdbId> = self
            .provider
            .trending(TrendingWindow::Week)
            .await?
            .into_iter()
            .map(|movie| movie.id)
            .take(limit)
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.enrich_ids(&ids).await
    }

    /// Title search, enriched. Blank queries are rejected before any
    /// provider call; over-long ones are cut to `MAX_SEARCH_QUERY_CHARS`.
    pub async fn search(&self, query: &str, page: u32, limit: usize) -> AppResult<Vec<MovieCandidate>> {
        let query: String = query.trim().chars().take(MAX_SEARCH_QUERY_CHARS).collect();
        if query.is_empty() {
            return Err(AppError::InvalidInput(
                "Search query must not be empty".to_string(),
            ));
        }

        let ids: Vec<TmdbId> = self
            .provider
            .search(&query, page.max(1))
            .await?
            .into_iter()
            .map(|movie| movie.id)
            .take(limit)
            .collect();

        tracing::info!(query = %query, page = page, result_count = ids.len(), "Catalog search");

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.enrich_ids(&ids).await
    }

    /// Fetches full details for each id in parallel, preserving order.
    ///
    /// Individual failures are dropped. Fails only when every lookup fails.
    pub async fn enrich_ids(&self, ids: &[TmdbId]) -> AppResult<Vec<MovieCandidate>> {
        let semaphore = Arc::new(Semaphore::new(self.enrich_concurrency));
        let mut tasks = Vec::with_capacity(ids.len());

        for &tmdb_id in ids {
            let provider = Arc::clone(&self.provider);
            let permits = Arc::clone(&semaphore);
            let task = tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                provider.details(tmdb_id).await.map(MovieCandidate::from)
            });
            tasks.push((tmdb_id, task));
        }

        let mut candidates = Vec::with_capacity(tasks.len());
        let mut error_count = 0usize;

        for (tmdb_id, task) in tasks {
            match task.await {
                Ok(Ok(candidate)) => candidates.push(candidate),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, tmdb_id = tmdb_id, "Candidate enrichment failed");
                    error_count += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, tmdb_id = tmdb_id, "Task join error");
                    error_count += 1;
                }
            }
        }

        if error_count > 0 {
            tracing::warn!(
                success_count = candidates.len(),
                error_count = error_count,
                "Partial enrichment failure"
            );
        }

        if candidates.is_empty() && error_count > 0 {
            return Err(AppError::external(
                self.provider.name(),
                "Failed to enrich any candidates",
            ));
        }

        Ok(candidates)
    }

    pub async fn movie_details(&self, tmdb_id: TmdbId) -> AppResult<MovieCandidate> {
        self.provider.details(tmdb_id).await.map(MovieCandidate::from)
    }
}

/// Discover results first, then trending. First occurrence of an id wins;
/// anything tagged with an excluded genre is removed before truncation.
fn merge_stubs(
    discovered: Vec<TmdbMovie>,
    trending: Vec<TmdbMovie>,
    excluded: &[u32],
    max_candidates: usize,
) -> Vec<TmdbId> {
    let mut seen = HashSet::new();
    discovered
        .into_iter()
        .chain(trending)
        .filter(|movie| seen.insert(movie.id))
        .filter(|movie| !movie.genre_ids.iter().any(|id| excluded.contains(id)))
        .map(|movie| movie.id)
        .take(max_candidates)
        .collect()
}
