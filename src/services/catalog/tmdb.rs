//! TMDB catalog provider
//!
//! API Flow:
//! 1. Discover: /discover/movie → filtered stubs, best rated first
//! 2. Trending: /trending/movie/{window} → stubs for freshness
//! 3. Search: /search/movie?query=&page= → title matches
//! 4. Details: /movie/{id}?append_to_response=credits → full record
//!
//! Details are cached for a day; listings and searches are not cached since
//! their results move with the catalog.

use std::time::Duration;

use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;

use super::{CatalogProvider, DiscoverFilters, TrendingWindow};
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{TmdbId, TmdbMovie, TmdbMovieDetails, TmdbPage},
};

const DETAILS_CACHE_TTL: u64 = 86_400; // 24 hours
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SERVICE: &str = "TMDB";

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
}

impl TmdbProvider {
    pub fn new(cache: Cache, api_key: String, api_url: String) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    /// GET an endpoint and decode its JSON body
    ///
    /// Transport failures and non-2xx statuses surface as external-service
    /// errors, except 404 which is reported as not found.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url, endpoint);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(endpoint = %endpoint, error = %e, "TMDB connection error");
                AppError::external(SERVICE, "Connection failed")
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::not_found("Movie", endpoint));
        }
        if !status.is_success() {
            tracing::error!(endpoint = %endpoint, status = %status, "TMDB API error");
            return Err(AppError::external(
                SERVICE,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        response.json::<T>().await.map_err(|e| {
            tracing::error!(endpoint = %endpoint, error = %e, "TMDB response decode error");
            AppError::external(SERVICE, "Invalid response body")
        })
    }
}

/// Query parameters for /discover/movie
fn discover_params(filters: &DiscoverFilters) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("sort_by", "vote_average.desc".to_string()),
        ("vote_average.gte", filters.min_vote_average.to_string()),
        ("vote_count.gte", filters.min_vote_count.to_string()),
        ("page", "1".to_string()),
        ("include_adult", "false".to_string()),
    ];

    if !filters.with_genres.is_empty() {
        params.push(("with_genres", join_ids(&filters.with_genres)));
    }
    if !filters.without_genres.is_empty() {
        params.push(("without_genres", join_ids(&filters.without_genres)));
    }
    if let Some(year) = filters.year_min {
        params.push(("primary_release_date.gte", format!("{}-01-01", year)));
    }
    if let Some(year) = filters.year_max {
        params.push(("primary_release_date.lte", format!("{}-12-31", year)));
    }

    params
}

/// Query parameters for /search/movie
fn search_params(query: &str, page: u32) -> Vec<(&'static str, String)> {
    vec![
        ("query", query.to_string()),
        ("page", page.to_string()),
        ("include_adult", "false".to_string()),
    ]
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait::async_trait]
impl CatalogProvider for TmdbProvider {
    async fn discover(&self, filters: &DiscoverFilters) -> AppResult<Vec<TmdbMovie>> {
        let page: TmdbPage = self.get("/discover/movie", &discover_params(filters)).await?;

        tracing::debug!(result_count = page.results.len(), "TMDB discover");
        Ok(page.results)
    }

    async fn trending(&self, window: TrendingWindow) -> AppResult<Vec<TmdbMovie>> {
        let endpoint = format!("/trending/movie/{}", window.as_str());
        let page: TmdbPage = self.get(&endpoint, &[]).await?;

        tracing::debug!(result_count = page.results.len(), window = window.as_str(), "TMDB trending");
        Ok(page.results)
    }

    async fn search(&self, query: &str, page: u32) -> AppResult<Vec<TmdbMovie>> {
        let results: TmdbPage = self.get("/search/movie", &search_params(query, page)).await?;

        tracing::debug!(result_count = results.results.len(), page = page, "TMDB search");
        Ok(results.results)
    }

    async fn details(&self, tmdb_id: TmdbId) -> AppResult<TmdbMovieDetails> {
        cached!(
            self.cache,
            CacheKey::MovieDetails(tmdb_id),
            DETAILS_CACHE_TTL,
            async move {
                let endpoint = format!("/movie/{}", tmdb_id);
                self.get::<TmdbMovieDetails>(
                    &endpoint,
                    &[("append_to_response", "credits".to_string())],
                )
                .await
            }
        )
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
