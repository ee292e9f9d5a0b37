//! Generative model abstraction
//!
//! `LanguageModel` is a single completion call. Retrying is layered on top by
//! `complete_with_retry`, which never errors: exhausting the retry budget
//! yields `ModelCallResult::Failure` so the caller's fallback branch is an
//! ordinary match arm.

use std::time::Duration;

use crate::{error::AppResult, models::TokenUsage};

pub mod anthropic;

pub use anthropic::AnthropicClient;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    /// Ask the provider to cache the system prompt between calls
    pub cache_system_prompt: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Outcome of a model call after retries
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCallResult {
    Success(Completion),
    Failure { reason: String, attempts: u32 },
}

/// Trait for generative model clients
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// One completion attempt. Transport, auth and HTTP failures are errors.
    async fn complete(&self, request: &CompletionRequest) -> AppResult<Completion>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Bounded retry with a delay that grows with the attempt index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// No sleeping between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay after the zero-based `attempt` failed: 1x, 2x, 3x the base
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }
}

pub async fn complete_with_retry(
    model: &dyn LanguageModel,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> ModelCallResult {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..max_attempts {
        match model.complete(request).await {
            Ok(completion) => {
                log_prompt_cache_stats(&request.model, &completion.usage);
                return ModelCallResult::Success(completion);
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    attempt = attempt + 1,
                    error = %e,
                    "Model call failed"
                );
                last_error = e.to_string();
                if attempt + 1 < max_attempts {
                    tokio::time::sleep(policy.delay_after(attempt)).await;
                }
            }
        }
    }

    ModelCallResult::Failure {
        reason: last_error,
        attempts: max_attempts,
    }
}

fn log_prompt_cache_stats(model: &str, usage: &TokenUsage) {
    let creation = usage.cache_creation_input_tokens;
    let read = usage.cache_read_input_tokens;
    if creation == 0 && read == 0 {
        return;
    }

    let savings_pct = read as f64 / usage.input_tokens.max(1) as f64 * 100.0;
    tracing::info!(
        model = %model,
        cache_creation_tokens = creation,
        cache_read_tokens = read,
        savings_pct = (savings_pct * 10.0).round() / 10.0,
        "Prompt cache stats"
    );
}
