//! Timeout, retry and rate limiting around any [`ModelService`].

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::domain::errors::ServiceError;
use crate::domain::models::{ExecutionConfig, RateLimitConfig, RetryConfig};
use crate::domain::ports::{GenerationRequest, ModelService};

/// Process-wide bound on outbound model calls.
///
/// Shared by every service of a run: a semaphore caps calls in flight and a
/// token bucket caps the call rate.
pub struct CallLimiter {
    permits: Arc<Semaphore>,
    rate: Option<DefaultDirectRateLimiter>,
}

impl CallLimiter {
    pub fn new(max_concurrent_calls: usize, rate_limit: &RateLimitConfig) -> Self {
        let rate = NonZeroU32::new(rate_limit.requests_per_second).map(|rps| {
            let burst = NonZeroU32::new(rate_limit.burst_size).unwrap_or(rps);
            RateLimiter::direct(Quota::per_second(rps).allow_burst(burst))
        });
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            rate,
        }
    }

    /// Limiter with no rate cap.
    pub fn unlimited(max_concurrent_calls: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            rate: None,
        }
    }

    /// Wait for a rate-limit token, then a concurrency permit.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ServiceError> {
        if let Some(rate) = &self.rate {
            rate.until_ready().await;
        }
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ServiceError::Unavailable("call limiter closed".to_string()))
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Decorator adding a per-call timeout, bounded exponential backoff on
/// transient failures and the shared [`CallLimiter`].
///
/// `Rejected` errors are returned immediately. `Unavailable` errors are
/// retried up to `max_retries` times, then returned as-is.
pub struct ResilientService {
    inner: Arc<dyn ModelService>,
    limiter: Arc<CallLimiter>,
    timeout: Duration,
    retry: RetryConfig,
}

impl ResilientService {
    pub fn new(
        inner: Arc<dyn ModelService>,
        limiter: Arc<CallLimiter>,
        execution: &ExecutionConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            inner,
            limiter,
            timeout: Duration::from_secs(execution.call_timeout_secs),
            retry,
        }
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn attempt(&self, request: GenerationRequest) -> Result<String, ServiceError> {
        let _permit = self.limiter.acquire().await?;
        match tokio::time::timeout(self.timeout, self.inner.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Unavailable(format!(
                "{} timed out after {:?}",
                self.inner.name(),
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl ModelService for ResilientService {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, ServiceError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.retry.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();
        let attempts = AtomicU32::new(0);
        let max_retries = self.retry.max_retries;

        backoff::future::retry(policy, || {
            let request = request.clone();
            let attempts = &attempts;
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                match self.attempt(request).await {
                    Ok(text) => Ok(text),
                    Err(err) if err.is_transient() && attempt < max_retries => {
                        tracing::warn!(
                            service = %self.inner.name(),
                            attempt = attempt + 1,
                            max_retries,
                            error = %err,
                            "transient service failure, retrying"
                        );
                        Err(backoff::Error::transient(err))
                    }
                    Err(err) => Err(backoff::Error::permanent(err)),
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SpeakerRole;
    use crate::infrastructure::model_services::MockModelService;

    fn request() -> GenerationRequest {
        GenerationRequest {
            speaker: SpeakerRole::Persona,
            history: vec![],
            system_instructions: String::new(),
            seed: 0,
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    fn wrap(mock: &MockModelService, retry: RetryConfig) -> ResilientService {
        ResilientService::new(
            Arc::new(mock.clone()),
            Arc::new(CallLimiter::unlimited(2)),
            &ExecutionConfig::default(),
            retry,
        )
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let mock = MockModelService::new("mock/flaky")
            .with_responses(vec!["ok".into()])
            .fail_on_call(1, ServiceError::Unavailable("503".into()))
            .fail_on_call(2, ServiceError::Unavailable("503".into()));

        let text = wrap(&mock, fast_retry(3)).generate(request()).await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(mock.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let mut mock = MockModelService::new("mock/down");
        for call in 1..=10 {
            mock = mock.fail_on_call(call, ServiceError::Unavailable("down".into()));
        }

        let err = wrap(&mock, fast_retry(2)).generate(request()).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(mock.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_rejected_is_not_retried() {
        let mock = MockModelService::new("mock/refuse")
            .fail_on_call(1, ServiceError::Rejected("policy".into()));

        let err = wrap(&mock, fast_retry(3)).generate(request()).await.unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(mock.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let mock = MockModelService::new("mock/slow").with_latency(Duration::from_millis(200));
        let service = wrap(&mock, fast_retry(0)).with_timeout(Duration::from_millis(10));

        let err = service.generate(request()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_limiter_releases_permits() {
        let limiter = CallLimiter::new(1, &RateLimitConfig::default());
        {
            let _permit = limiter.acquire().await.unwrap();
            assert_eq!(limiter.available_permits(), 0);
        }
        assert_eq!(limiter.available_permits(), 1);
    }
}
