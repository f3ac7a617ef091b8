//! End-to-end rollouts against mock model services.

mod common;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use loom::domain::errors::{RolloutError, ServiceError};
use loom::domain::models::{
    InjectionMode, MonitorAction, RolloutStatus, SpeakerRole, Transcript, TriggerReason,
};
use loom::infrastructure::model_services::MockModelService;
use loom::services::{RolloutOrchestrator, RolloutServices};

async fn run_once(seed: u64, turns: u32) -> Transcript {
    let request = common::request(turns, 1, seed);
    RolloutOrchestrator::new(&request, 0, Uuid::new_v4(), common::mock_services())
        .run(CancellationToken::new())
        .await
        .expect("mock rollout should complete")
}

#[tokio::test]
async fn test_ten_turn_rollout_is_reproducible() {
    common::setup_test_logging();

    let first = run_once(42, 10).await;
    let second = run_once(42, 10).await;

    assert_eq!(first.metadata.status, RolloutStatus::Complete);
    assert_eq!(first.turn_count(), 10);
    assert_eq!(first.turns, second.turns);
    assert_eq!(first.monitor_events, second.monitor_events);
    assert_eq!(first.metadata.seed, second.metadata.seed);
    assert_eq!(first.metadata.config_fingerprint, second.metadata.config_fingerprint);

    let modes: Vec<InjectionMode> = first.turns.iter().map(|t| t.injection_mode).collect();
    assert_eq!(modes[0], InjectionMode::Full);
    assert_eq!(modes[5], InjectionMode::Full);

    let positions: Vec<f64> = first.turns.iter().map(|t| t.position).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(first.turns.iter().all(|t| t.counterpart_message.is_some()));
}

#[tokio::test]
async fn test_different_seeds_change_rollout_seed() {
    let a = run_once(1, 2).await;
    let b = run_once(2, 2).await;
    assert_ne!(a.metadata.seed, b.metadata.seed);
}

#[tokio::test]
async fn test_banned_pattern_regenerates_twice_then_accepts() {
    let persona = MockModelService::new("mock/persona").with_responses(vec![
        "Have you ever felt this way.".into(),
        "Have you ever felt like that.".into(),
        "Have you ever felt stuck.".into(),
        "Work has been rough lately.".into(),
    ]);
    let observer = persona.clone();
    let services = RolloutServices {
        persona: Arc::new(persona),
        counterpart: Arc::new(MockModelService::new("mock/target")),
    };

    let request = common::request(2, 1, 42);
    let transcript = RolloutOrchestrator::new(&request, 0, Uuid::new_v4(), services)
        .run(CancellationToken::new())
        .await
        .unwrap();

    let first = &transcript.turns[0];
    let regenerations = first
        .monitor_events
        .iter()
        .filter(|e| e.action == MonitorAction::Regenerate && e.reason == TriggerReason::BannedPattern)
        .count();
    let exhausted = first
        .monitor_events
        .iter()
        .filter(|e| e.reason == TriggerReason::RetriesExhausted)
        .count();

    assert_eq!(regenerations, 2);
    assert_eq!(exhausted, 1);
    assert_eq!(first.regeneration_count, 2);
    assert_eq!(first.persona_message, "Have you ever felt stuck.");

    assert!(transcript.turns[1].monitor_events.is_empty());
    assert_eq!(transcript.turns[1].persona_message, "Work has been rough lately.");

    // Regeneration attempts carry the variation instruction as a trailing direction.
    let requests = observer.recorded_requests().await;
    assert_eq!(requests.len(), 4);
    let retry_tail = requests[1].history.last().unwrap();
    assert_eq!(retry_tail.speaker, SpeakerRole::System);
    assert_ne!(requests[0].seed, requests[1].seed);
}

#[tokio::test]
async fn test_counterpart_rejection_keeps_partial_transcript() {
    let services = RolloutServices {
        persona: Arc::new(MockModelService::new("mock/persona")),
        counterpart: Arc::new(
            MockModelService::new("mock/target")
                .fail_on_call(3, ServiceError::Rejected("content policy".into())),
        ),
    };

    let request = common::request(6, 1, 7);
    let failure = RolloutOrchestrator::new(&request, 0, Uuid::new_v4(), services)
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, RolloutError::ServiceRejected { .. }));
    let transcript = failure.transcript;
    assert_eq!(transcript.turn_count(), 3);
    assert!(transcript.turns[2].counterpart_message.is_none());
    assert!(matches!(
        &transcript.metadata.status,
        RolloutStatus::Failed { reason } if reason.contains("content policy")
    ));
    assert!(transcript.metadata.finish_time.is_some());
}

#[tokio::test]
async fn test_persona_unavailable_fails_before_first_turn() {
    let services = RolloutServices {
        persona: Arc::new(
            MockModelService::new("mock/persona")
                .fail_on_call(1, ServiceError::Unavailable("overloaded".into())),
        ),
        counterpart: Arc::new(MockModelService::new("mock/target")),
    };

    let request = common::request(3, 1, 7);
    let failure = RolloutOrchestrator::new(&request, 0, Uuid::new_v4(), services)
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, RolloutError::ServiceUnavailable { .. }));
    assert_eq!(failure.transcript.turn_count(), 0);
}
