use serde::Deserialize;

use crate::services::complexity::ModelTable;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Redis connection URL. Empty disables the primary store tier.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// TMDB API key
    pub tmdb_api_key: String,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// TMDB image CDN base URL, used to build poster/backdrop links
    #[serde(default = "default_tmdb_image_base_url")]
    pub tmdb_image_base_url: String,

    /// Anthropic API key
    pub anthropic_api_key: String,

    /// Anthropic API base URL
    #[serde(default = "default_anthropic_api_url")]
    pub anthropic_api_url: String,

    #[serde(default = "default_model_simple")]
    pub model_simple: String,

    #[serde(default = "default_model_moderate")]
    pub model_moderate: String,

    #[serde(default = "default_model_complex")]
    pub model_complex: String,

    /// Upper bound on generated tokens per model call
    #[serde(default = "default_model_max_tokens")]
    pub model_max_tokens: u32,

    /// Candidates fetched from the catalog per recommendation
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Concurrent per-movie detail calls during enrichment
    #[serde(default = "default_enrich_concurrency")]
    pub enrich_concurrency: usize,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_image_base_url() -> String {
    "https://image.tmdb.org/t/p".to_string()
}

fn default_anthropic_api_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model_simple() -> String {
    "claude-haiku-4-5-20250514".to_string()
}

fn default_model_moderate() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_model_complex() -> String {
    "claude-opus-4-6".to_string()
}

fn default_model_max_tokens() -> u32 {
    1500
}

fn default_max_candidates() -> usize {
    30
}

fn default_enrich_concurrency() -> usize {
    8
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Tier → model routing table
    pub fn model_table(&self) -> ModelTable {
        ModelTable {
            simple: self.model_simple.clone(),
            moderate: self.model_moderate.clone(),
            complex: self.model_complex.clone(),
        }
    }

    pub fn redis_enabled(&self) -> bool {
        !self.redis_url.trim().is_empty()
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
