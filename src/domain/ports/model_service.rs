//! Model service port - uniform interface for every message-producing model.

use async_trait::async_trait;

use crate::domain::errors::ServiceError;
use crate::domain::models::{Message, SpeakerRole};

/// A single generation request.
///
/// `history` is the full conversation so far in order. Services map it onto
/// their own chat format from the perspective of `speaker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub speaker: SpeakerRole,
    pub history: Vec<Message>,
    pub system_instructions: String,
    pub seed: u64,
}

/// Trait for model service implementations.
///
/// Persona, interlocutor and adversary are all driven through this trait, so
/// the orchestrator never knows which backend answers.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Identifier used in logs and transcript metadata (e.g. `anthropic/claude-...`).
    fn name(&self) -> &str;

    /// Produce the next message text.
    async fn generate(&self, request: GenerationRequest) -> Result<String, ServiceError>;
}
