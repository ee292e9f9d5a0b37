pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use db::{Cache, SessionStore};
use error::AppResult;
use routes::AppState;
use services::{
    AnthropicClient, CatalogClient, CatalogProvider, ComplexityScorer, Generator, LanguageModel,
    Recommender, ResponseValidator, RetryPolicy, SessionManager, TmdbProvider,
};

/// Wires the recommender from its collaborators
pub fn build_recommender(
    config: &Config,
    cache: Cache,
    provider: Arc<dyn CatalogProvider>,
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
) -> Recommender {
    let catalog = CatalogClient::new(provider, config.enrich_concurrency);
    let generator = Arc::new(Generator::new(
        model,
        ResponseValidator::new(config.tmdb_image_base_url.as_str()),
        retry,
        config.model_max_tokens,
    ));
    let sessions = SessionManager::new(
        SessionStore::new(cache.clone()),
        catalog.clone(),
        Arc::clone(&generator),
    );
    let scorer = ComplexityScorer::new(Default::default(), config.model_table());

    Recommender::new(
        cache,
        catalog,
        scorer,
        generator,
        sessions,
        config.max_candidates,
    )
}

/// Application state backed by the live TMDB and Anthropic APIs
pub fn build_state(config: &Config, cache: Cache) -> AppResult<AppState> {
    let provider = TmdbProvider::new(
        cache.clone(),
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
    )?;
    let model = AnthropicClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_api_url.clone(),
    )?;

    let recommender = build_recommender(
        config,
        cache,
        Arc::new(provider),
        Arc::new(model),
        RetryPolicy::default(),
    );
    Ok(AppState::new(recommender))
}
