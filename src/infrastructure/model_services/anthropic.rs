//! Anthropic Messages API model service.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::chat::{classify_status, classify_transport, to_chat_turns, ChatTurn};
use crate::domain::errors::ServiceError;
use crate::domain::models::AnthropicProviderConfig;
use crate::domain::ports::{GenerationRequest, ModelService};

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Request to the Anthropic Messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
}

/// Content block in a response. Non-text blocks are ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

/// Anthropic-backed [`ModelService`].
///
/// The API has no sampling seed; the request seed is only logged.
pub struct AnthropicService {
    name: String,
    model: String,
    api_key: String,
    config: AnthropicProviderConfig,
    client: Client,
}

impl AnthropicService {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        config: AnthropicProviderConfig,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let model = model.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Rejected(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            name: format!("anthropic/{model}"),
            model,
            api_key: api_key.into(),
            config,
            client,
        })
    }

    /// Build from `ANTHROPIC_API_KEY`.
    pub fn from_env(
        model: impl Into<String>,
        config: AnthropicProviderConfig,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            ServiceError::Rejected(format!("{API_KEY_ENV} environment variable is required"))
        })?;
        Self::new(model, api_key, config, timeout)
    }
}

#[async_trait]
impl ModelService for AnthropicService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ServiceError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.config.max_tokens,
            system: &request.system_instructions,
            messages: to_chat_turns(request.speaker, &request.history),
            temperature: self.config.temperature,
        };

        tracing::debug!(
            service = %self.name,
            messages = body.messages.len(),
            seed = request.seed,
            "Anthropic API call"
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| classify_transport(&e))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if parsed.stop_reason.as_deref() == Some("refusal") {
            return Err(ServiceError::Rejected(format!("{} refused the request", self.name)));
        }

        tracing::debug!(service = %self.name, chars = text.len(), "Anthropic response");
        Ok(text)
    }
}
