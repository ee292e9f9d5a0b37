//! In-process fakes for the catalog and model providers

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use filmmatch_api::{
    build_recommender,
    config::Config,
    db::Cache,
    error::{AppError, AppResult},
    models::{
        TmdbCastMember, TmdbCredits, TmdbCrewMember, TmdbGenre, TmdbId, TmdbMovie,
        TmdbMovieDetails, TokenUsage,
    },
    routes::{create_router, AppState},
    services::{
        catalog::{CatalogProvider, DiscoverFilters, TrendingWindow},
        llm::{Completion, CompletionRequest, LanguageModel},
        Recommender, RetryPolicy,
    },
};

pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

pub fn test_config() -> Config {
    let vars = vec![
        ("TMDB_API_KEY".to_string(), "test".to_string()),
        ("ANTHROPIC_API_KEY".to_string(), "test".to_string()),
        ("REDIS_URL".to_string(), String::new()),
    ];
    envy::from_iter(vars).expect("test config")
}

pub fn movie(id: TmdbId, title: &str, vote_average: f64, genre: (u32, &str)) -> TmdbMovieDetails {
    TmdbMovieDetails {
        id,
        title: title.to_string(),
        overview: Some(format!("{} overview", title)),
        release_date: Some("2014-11-07".to_string()),
        genres: vec![TmdbGenre {
            id: genre.0,
            name: genre.1.to_string(),
        }],
        vote_average,
        vote_count: 5000,
        popularity: 50.0,
        runtime: Some(120),
        poster_path: Some(format!("/poster{}.jpg", id)),
        backdrop_path: Some(format!("/backdrop{}.jpg", id)),
        original_language: Some("en".to_string()),
        credits: TmdbCredits {
            cast: vec![TmdbCastMember {
                name: "Lead Actor".to_string(),
            }],
            crew: vec![TmdbCrewMember {
                name: "Some Director".to_string(),
                job: Some("Director".to_string()),
            }],
        },
    }
}

/// Six dramas; 106 has the highest rating
pub fn drama_shelf() -> Vec<TmdbMovieDetails> {
    vec![
        movie(101, "The Quiet Year", 7.2, (18, "Drama")),
        movie(102, "Harbor Lights", 6.8, (18, "Drama")),
        movie(103, "Paper Houses", 7.9, (18, "Drama")),
        movie(104, "Long Division", 7.4, (18, "Drama")),
        movie(105, "Tidewater", 6.1, (18, "Drama")),
        movie(106, "North of Winter", 8.6, (18, "Drama")),
    ]
}

/// Catalog serving a fixed shelf. Discover and trending both list the
/// whole shelf unless switched off.
pub struct FakeCatalog {
    movies: HashMap<TmdbId, TmdbMovieDetails>,
    order: Vec<TmdbId>,
    pub discover_available: bool,
    pub trending_available: bool,
}

impl FakeCatalog {
    pub fn new(movies: Vec<TmdbMovieDetails>) -> Self {
        let order = movies.iter().map(|m| m.id).collect();
        Self {
            movies: movies.into_iter().map(|m| (m.id, m)).collect(),
            order,
            discover_available: true,
            trending_available: true,
        }
    }

    pub fn offline() -> Self {
        Self {
            discover_available: false,
            trending_available: false,
            ..Self::new(vec![])
        }
    }

    fn stubs(&self) -> Vec<TmdbMovie> {
        self.order
            .iter()
            .filter_map(|id| self.movies.get(id))
            .map(|m| TmdbMovie {
                id: m.id,
                title: m.title.clone(),
                genre_ids: m.genres.iter().map(|g| g.id).collect(),
                vote_average: m.vote_average,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl CatalogProvider for FakeCatalog {
    async fn discover(&self, _filters: &DiscoverFilters) -> AppResult<Vec<TmdbMovie>> {
        if !self.discover_available {
            return Err(AppError::external("TMDB", "HTTP 503"));
        }
        Ok(self.stubs())
    }

    async fn trending(&self, _window: TrendingWindow) -> AppResult<Vec<TmdbMovie>> {
        if !self.trending_available {
            return Err(AppError::external("TMDB", "HTTP 503"));
        }
        Ok(self.stubs())
    }

    async fn search(&self, query: &str, _page: u32) -> AppResult<Vec<TmdbMovie>> {
        let needle = query.to_lowercase();
        Ok(self
            .stubs()
            .into_iter()
            .filter(|m| m.title.to_lowercase().contains(&needle))
            .collect())
    }

    async fn details(&self, tmdb_id: TmdbId) -> AppResult<TmdbMovieDetails> {
        self.movies
            .get(&tmdb_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Movie", &tmdb_id.to_string()))
    }

    fn name(&self) -> &'static str {
        "fake-catalog"
    }
}

/// Model that replays scripted answers; `None` entries fail the call.
/// The last entry repeats once the script runs out.
pub struct ScriptedModel {
    script: Mutex<Vec<Option<String>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Option<&str>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(|s| s.map(str::to_string)).collect()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn always(text: &str) -> Arc<Self> {
        Self::new(vec![Some(text)])
    }

    pub fn unavailable() -> Arc<Self> {
        Self::new(vec![None])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<Completion> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.user_prompt.clone());
        }

        let answer = {
            let script = self
                .script
                .lock()
                .map_err(|e| AppError::Internal(e.to_string()))?;
            script
                .get(index)
                .or_else(|| script.last())
                .cloned()
                .flatten()
        };

        match answer {
            Some(text) => Ok(Completion {
                text,
                usage: TokenUsage {
                    input_tokens: 1000,
                    output_tokens: 150,
                    ..Default::default()
                },
            }),
            None => Err(AppError::external("Anthropic", "HTTP 529")),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub async fn recommender(catalog: FakeCatalog, model: Arc<ScriptedModel>) -> Recommender {
    let (cache, _writer) = Cache::in_memory().await;
    build_recommender(
        &test_config(),
        cache,
        Arc::new(catalog),
        model,
        RetryPolicy::immediate(3),
    )
}

pub async fn app(catalog: FakeCatalog, model: Arc<ScriptedModel>) -> axum::Router {
    let recommender = recommender(catalog, model).await;
    create_router(AppState::new(recommender))
}

/// A well-formed answer over the drama shelf
pub const DRAMA_ANSWER: &str = r#"{
    "best_pick": {"tmdb_id": 103, "rationale": "- Quietly devastating\n- Great ensemble", "match_score": 9},
    "additional_picks": [
        {"tmdb_id": 106, "rationale": "Sweeping and sad", "match_score": 8},
        {"tmdb_id": 101, "rationale": "Gentle", "match_score": 8},
        {"tmdb_id": 104, "rationale": "Sharp dialogue", "match_score": 7},
        {"tmdb_id": 102, "rationale": "Warm", "match_score": 7},
        {"tmdb_id": 105, "rationale": "Atmospheric", "match_score": 6}
    ],
    "narrow_question": "In the mood for hopeful or heartbreaking?"
}"#;
