//! Mock model service for testing and offline runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::errors::ServiceError;
use crate::domain::ports::{GenerationRequest, ModelService};

#[derive(Debug, Default)]
struct MockState {
    calls: usize,
    requests: Vec<GenerationRequest>,
}

/// Deterministic model service. No network.
///
/// Modes, in priority order:
/// - scripted failures on chosen call numbers (1-based)
/// - echo: return the last history message
/// - scripted responses, cycled in call order
/// - default: `[Mock response N]`, N counting the speaker's own prior turns
///
/// Clones share call state, so a test can keep a clone to inspect requests.
/// Scripted responses follow the shared call order; rollouts that must stay
/// reproducible in parallel should each get their own instance.
#[derive(Clone)]
pub struct MockModelService {
    name: String,
    responses: Vec<String>,
    echo: bool,
    latency: Option<Duration>,
    failures: HashMap<usize, ServiceError>,
    state: Arc<Mutex<MockState>>,
}

impl MockModelService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Vec::new(),
            echo: false,
            latency: None,
            failures: HashMap::new(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Cycle through `responses` in call order.
    pub fn with_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Answer with the last message of the history.
    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Sleep before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the given call (1-based) with `error`.
    pub fn fail_on_call(mut self, call: usize, error: ServiceError) -> Self {
        self.failures.insert(call, error);
        self
    }

    pub async fn call_count(&self) -> usize {
        self.state.lock().await.calls
    }

    /// Every request received so far, in order.
    pub async fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.state.lock().await.requests.clone()
    }

    fn default_response(request: &GenerationRequest) -> String {
        let own_turns = request
            .history
            .iter()
            .filter(|message| message.speaker == request.speaker)
            .count();
        format!("[Mock response {}]", own_turns + 1)
    }
}

#[async_trait]
impl ModelService for MockModelService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ServiceError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let call = {
            let mut state = self.state.lock().await;
            state.calls += 1;
            state.requests.push(request.clone());
            state.calls
        };

        if let Some(error) = self.failures.get(&call) {
            return Err(error.clone());
        }

        if self.echo {
            return Ok(request
                .history
                .last()
                .map(|message| message.text.clone())
                .unwrap_or_default());
        }

        if !self.responses.is_empty() {
            return Ok(self.responses[(call - 1) % self.responses.len()].clone());
        }

        Ok(Self::default_response(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Message, SpeakerRole};

    fn request(history: Vec<Message>) -> GenerationRequest {
        GenerationRequest {
            speaker: SpeakerRole::Persona,
            history,
            system_instructions: String::new(),
            seed: 7,
        }
    }

    #[tokio::test]
    async fn test_cycles_scripted_responses() {
        let mock = MockModelService::new("mock/a").with_responses(vec!["one".into(), "two".into()]);
        let mut out = Vec::new();
        for _ in 0..3 {
            out.push(mock.generate(request(vec![])).await.unwrap());
        }
        assert_eq!(out, vec!["one", "two", "one"]);
        assert_eq!(mock.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_echo_returns_last_message() {
        let mock = MockModelService::new("mock/echo").echo();
        let history = vec![Message::new(SpeakerRole::Interlocutor, "hello there", 0)];
        assert_eq!(mock.generate(request(history)).await.unwrap(), "hello there");
        assert_eq!(mock.generate(request(vec![])).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_default_response_counts_own_turns() {
        let mock = MockModelService::new("mock/default");
        let history = vec![
            Message::persona("a", 0),
            Message::new(SpeakerRole::Interlocutor, "b", 0),
        ];
        assert_eq!(mock.generate(request(history)).await.unwrap(), "[Mock response 2]");
    }

    #[tokio::test]
    async fn test_scripted_failure_and_shared_state() {
        let mock = MockModelService::new("mock/flaky")
            .fail_on_call(2, ServiceError::Unavailable("503".into()));
        let observer = mock.clone();

        assert!(mock.generate(request(vec![])).await.is_ok());
        assert_eq!(
            mock.generate(request(vec![])).await,
            Err(ServiceError::Unavailable("503".into()))
        );
        assert!(mock.generate(request(vec![])).await.is_ok());
        assert_eq!(observer.recorded_requests().await.len(), 3);
    }
}
