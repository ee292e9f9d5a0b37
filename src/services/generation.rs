//! One generation turn: model call with bounded retry, then validation
//! against the pool the prompt was built from.

use std::sync::Arc;

use super::{
    llm::{complete_with_retry, CompletionRequest, LanguageModel, ModelCallResult, RetryPolicy},
    prompt::SYSTEM_PROMPT,
    validator::{ResponseValidator, Validated},
};
use crate::models::{CandidatePool, TokenUsage};

/// Result of one turn
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub validated: Validated,
    pub usage: TokenUsage,
    /// False when every attempt failed and the rating fallback answered
    pub model_answered: bool,
}

impl Generation {
    /// Only well-formed model answers are worth reusing for other requests
    pub fn is_cacheable(&self) -> bool {
        self.model_answered && !self.validated.report.is_malformed()
    }
}

pub struct Generator {
    model: Arc<dyn LanguageModel>,
    validator: ResponseValidator,
    retry: RetryPolicy,
    max_tokens: u32,
}

impl Generator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        validator: ResponseValidator,
        retry: RetryPolicy,
        max_tokens: u32,
    ) -> Self {
        Self {
            model,
            validator,
            retry,
            max_tokens,
        }
    }

    pub fn validator(&self) -> &ResponseValidator {
        &self.validator
    }

    /// Never fails: an unreachable model degrades to the rating fallback
    pub async fn generate(
        &self,
        pool: &CandidatePool,
        user_prompt: String,
        session_id: &str,
        model_id: &str,
    ) -> Generation {
        let request = CompletionRequest {
            model: model_id.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt,
            max_tokens: self.max_tokens,
            cache_system_prompt: true,
        };

        match complete_with_retry(self.model.as_ref(), &request, &self.retry).await {
            ModelCallResult::Success(completion) => {
                let validated =
                    self.validator
                        .parse_response(&completion.text, pool, session_id, model_id);
                if !validated.report.is_clean() {
                    tracing::info!(
                        session_id = %session_id,
                        hallucinations = validated.report.hallucination_count(),
                        anomalies = validated.report.anomalies.len(),
                        "Model output repaired"
                    );
                }
                Generation {
                    validated,
                    usage: completion.usage,
                    model_answered: true,
                }
            }
            ModelCallResult::Failure { reason, attempts } => {
                tracing::error!(
                    session_id = %session_id,
                    model = %model_id,
                    provider = self.model.name(),
                    attempts = attempts,
                    "Model retries exhausted"
                );
                Generation {
                    validated: self
                        .validator
                        .model_unavailable(pool, session_id, model_id, &reason),
                    usage: TokenUsage::default(),
                    model_answered: false,
                }
            }
        }
    }
}
