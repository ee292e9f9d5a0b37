//! Anthropic Messages API client

use std::time::Duration;

use reqwest::Client as HttpClient;

use super::{Completion, CompletionRequest, LanguageModel};
use crate::{
    error::{AppError, AppResult},
    models::anthropic::{Message, MessagesRequest, MessagesResponse, SystemBlock},
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const SERVICE: &str = "Anthropic";
/// Characters of an error body kept in the error message
const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Clone)]
pub struct AnthropicClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, api_url: String) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> AppResult<Completion> {
        let url = format!("{}/v1/messages", self.api_url);
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: vec![SystemBlock::text(
                &request.system_prompt,
                request.cache_system_prompt,
            )],
            messages: vec![Message::user(&request.user_prompt)],
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::external(SERVICE, format!("Connection failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            return Err(AppError::external(
                SERVICE,
                format!("HTTP {}: {}", status.as_u16(), preview),
            ));
        }

        let message: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::external(SERVICE, format!("Invalid response body: {}", e)))?;

        let text = message.text();
        if text.trim().is_empty() {
            return Err(AppError::external(SERVICE, "Empty completion"));
        }

        tracing::debug!(
            model = %request.model,
            input_tokens = message.usage.input_tokens,
            output_tokens = message.usage.output_tokens,
            "Model call succeeded"
        );

        Ok(Completion {
            text,
            usage: message.usage.into(),
        })
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}
