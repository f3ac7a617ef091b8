//! Domain errors for the Loom rollout engine.

use thiserror::Error;

use super::models::Transcript;

/// Errors raised while interpolating a trajectory curve.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CurveError {
    #[error("Invalid curve parameters: {0}")]
    InvalidCurveParameters(String),
}

/// Errors raised while resolving the active phase.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PhaseError {
    #[error("No phase covers trajectory position {position:.4}")]
    PhaseCoverageGap { position: f64 },

    #[error("Phase list is empty")]
    NoPhases,
}

/// Failures reported by a model service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Transient failure (rate limit, 5xx, network, timeout). Safe to retry.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Permanent failure (policy refusal, bad request, auth). Never retried.
    #[error("Service rejected request: {0}")]
    Rejected(String),
}

impl ServiceError {
    /// Returns true if this error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Returns true if this is a permanent error that should not be retried
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Errors that stop a rollout.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("Config precondition violated: {0}")]
    ConfigPrecondition(String),

    #[error("Service unavailable after retries ({service}): {message}")]
    ServiceUnavailable { service: String, message: String },

    #[error("Service rejected request ({service}): {message}")]
    ServiceRejected { service: String, message: String },

    #[error("Rollout cancelled at turn {turn}")]
    Cancelled { turn: u32 },

    #[error("Rollout task aborted: {0}")]
    TaskAborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RolloutError {
    /// Map a service failure onto the rollout taxonomy.
    pub fn from_service(service: &str, err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(message) => Self::ServiceUnavailable {
                service: service.to_string(),
                message,
            },
            ServiceError::Rejected(message) => Self::ServiceRejected {
                service: service.to_string(),
                message,
            },
        }
    }
}

impl From<CurveError> for RolloutError {
    fn from(err: CurveError) -> Self {
        Self::ConfigPrecondition(err.to_string())
    }
}

impl From<PhaseError> for RolloutError {
    fn from(err: PhaseError) -> Self {
        Self::ConfigPrecondition(err.to_string())
    }
}

/// A rollout that stopped before completion, carrying whatever transcript
/// it had accumulated.
#[derive(Debug, Error)]
#[error("Rollout {} stopped: {error}", transcript.metadata.rollout_index)]
pub struct RolloutFailure {
    #[source]
    pub error: RolloutError,
    pub transcript: Box<Transcript>,
}

pub type RolloutResult<T> = Result<T, RolloutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(ServiceError::Unavailable("503".to_string()).is_transient());
        assert!(!ServiceError::Unavailable("503".to_string()).is_permanent());
    }

    #[test]
    fn test_permanent_errors() {
        let err = ServiceError::Rejected("policy".to_string());
        assert!(err.is_permanent());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_from_service_keeps_taxonomy() {
        let err = RolloutError::from_service("persona", ServiceError::Rejected("no".into()));
        assert!(matches!(err, RolloutError::ServiceRejected { ref service, .. } if service == "persona"));

        let err = RolloutError::from_service("counterpart", ServiceError::Unavailable("slow".into()));
        assert!(matches!(err, RolloutError::ServiceUnavailable { .. }));
    }

    #[test]
    fn test_curve_error_is_precondition() {
        let err: RolloutError = CurveError::InvalidCurveParameters("unsorted".into()).into();
        assert!(matches!(err, RolloutError::ConfigPrecondition(_)));
    }
}
