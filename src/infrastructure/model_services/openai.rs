//! OpenAI-compatible chat completions model service.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::chat::{classify_status, classify_transport, to_chat_turns, ChatRole};
use crate::domain::errors::ServiceError;
use crate::domain::models::OpenAiProviderConfig;
use crate::domain::ports::{GenerationRequest, ModelService};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize)]
struct CompletionMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage>,
    max_tokens: u32,
    temperature: f32,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// OpenAI-backed [`ModelService`]. Works against any server speaking the
/// `/v1/chat/completions` protocol.
pub struct OpenAiService {
    name: String,
    model: String,
    api_key: String,
    config: OpenAiProviderConfig,
    client: Client,
}

impl OpenAiService {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        config: OpenAiProviderConfig,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let model = model.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Rejected(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            name: format!("openai/{model}"),
            model,
            api_key: api_key.into(),
            config,
            client,
        })
    }

    /// Build from `OPENAI_API_KEY`.
    pub fn from_env(
        model: impl Into<String>,
        config: OpenAiProviderConfig,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            ServiceError::Rejected(format!("{API_KEY_ENV} environment variable is required"))
        })?;
        Self::new(model, api_key, config, timeout)
    }

    fn messages(request: &GenerationRequest) -> Vec<CompletionMessage> {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        if !request.system_instructions.is_empty() {
            messages.push(CompletionMessage {
                role: "system",
                content: request.system_instructions.clone(),
            });
        }
        messages.extend(to_chat_turns(request.speaker, &request.history).into_iter().map(
            |turn| CompletionMessage {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: turn.content,
            },
        ));
        messages
    }
}

#[async_trait]
impl ModelService for OpenAiService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ServiceError> {
        let body = CompletionRequest {
            model: &self.model,
            messages: Self::messages(&request),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            seed: request.seed,
        };

        tracing::debug!(
            service = %self.name,
            messages = body.messages.len(),
            seed = request.seed,
            "OpenAI API call"
        );

        let response = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let parsed: CompletionResponse =
            response.json().await.map_err(|e| classify_transport(&e))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Rejected(format!("{} returned no choices", self.name)))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(ServiceError::Rejected(format!("{} refused: {refusal}", self.name)));
        }
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ServiceError::Rejected(format!(
                "{} response blocked by content filter",
                self.name
            )));
        }

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Message, SpeakerRole};

    fn service(base_url: String) -> OpenAiService {
        OpenAiService::new(
            "gpt-test",
            "sk-test",
            OpenAiProviderConfig {
                base_url,
                ..OpenAiProviderConfig::default()
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            speaker: SpeakerRole::Interlocutor,
            history: vec![Message::persona("I haven't slept in days.", 0)],
            system_instructions: "You are a helpful assistant.".to_string(),
            seed: 42,
        }
    }

    #[tokio::test]
    async fn test_system_message_first_and_seed_forwarded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-test",
                "seed": 42,
                "messages": [
                    {"role": "system", "content": "You are a helpful assistant."},
                    {"role": "user", "content": "I haven't slept in days."}
                ]
            })))
            .with_status(200)
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"That sounds hard."},"finish_reason":"stop"}]}"#,
            )
            .create_async()
            .await;

        let text = service(server.url()).generate(request()).await.unwrap();
        assert_eq!(text, "That sounds hard.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .create_async()
            .await;

        let err = service(server.url()).generate(request()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_refusal_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(
                r#"{"choices":[{"message":{"content":null,"refusal":"I can't help with that."},"finish_reason":"stop"}]}"#,
            )
            .create_async()
            .await;

        let err = service(server.url()).generate(request()).await.unwrap_err();
        assert!(err.is_permanent());
    }
}
