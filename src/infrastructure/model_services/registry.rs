//! Builds model services from `provider/model` identifiers.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::anthropic::AnthropicService;
use super::mock::MockModelService;
use super::openai::OpenAiService;
use super::resilient::{CallLimiter, ResilientService};
use crate::domain::errors::ServiceError;
use crate::domain::models::Settings;
use crate::domain::ports::ModelService;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid model identifier '{0}': expected 'provider/model'")]
    InvalidSpec(String),

    #[error("Unknown model provider '{0}' (expected anthropic, openai or mock)")]
    UnknownProvider(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Factory for model services. Every real service it creates shares one
/// [`CallLimiter`] and is wrapped in a [`ResilientService`].
pub struct ServiceRegistry {
    settings: Settings,
    limiter: Arc<CallLimiter>,
}

impl ServiceRegistry {
    pub fn new(settings: Settings) -> Self {
        let limiter = Arc::new(CallLimiter::new(
            settings.execution.max_concurrent_calls,
            &settings.rate_limit,
        ));
        Self { settings, limiter }
    }

    /// Create the service named by `spec`, e.g. `anthropic/claude-sonnet-4-5`,
    /// `openai/gpt-4o` or `mock/anything`.
    pub fn create(&self, spec: &str) -> Result<Arc<dyn ModelService>, RegistryError> {
        let (provider, model) = parse_spec(spec)?;
        let timeout = Duration::from_secs(self.settings.execution.call_timeout_secs);

        let inner: Arc<dyn ModelService> = match provider {
            "mock" => {
                tracing::debug!(spec, "using mock model service");
                return Ok(Arc::new(MockModelService::new(spec)));
            }
            "anthropic" => Arc::new(AnthropicService::from_env(
                model,
                self.settings.providers.anthropic.clone(),
                timeout,
            )?),
            "openai" => Arc::new(OpenAiService::from_env(
                model,
                self.settings.providers.openai.clone(),
                timeout,
            )?),
            other => return Err(RegistryError::UnknownProvider(other.to_string())),
        };

        tracing::debug!(spec, "created model service");
        Ok(Arc::new(ResilientService::new(
            inner,
            Arc::clone(&self.limiter),
            &self.settings.execution,
            self.settings.retry.clone(),
        )))
    }
}

fn parse_spec(spec: &str) -> Result<(&str, &str), RegistryError> {
    match spec.split_once('/') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            Ok((provider, model))
        }
        _ => Err(RegistryError::InvalidSpec(spec.to_string())),
    }
}
