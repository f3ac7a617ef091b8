//! Transcript artifact produced by one rollout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::monitor::MonitorEvent;
use super::prompt::InjectionMode;
use super::rollout::CounterpartSelector;

/// Final status of a rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RolloutStatus {
    Running,
    Complete,
    Failed { reason: String },
    Cancelled,
}

impl RolloutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Everything needed to reproduce and attribute a rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub rollout_index: u32,
    pub base_seed: u64,
    pub seed: u64,
    pub config_fingerprint: String,
    pub template_version: String,
    pub schema_version: String,
    pub persona_name: String,
    pub persona_model: String,
    pub counterpart_model: String,
    pub counterpart: CounterpartSelector,
    pub expected_turns: u32,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<DateTime<Utc>>,
    pub status: RolloutStatus,
}

/// One completed (or partially completed) turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_index: u32,
    pub position: f64,
    pub phase_name: String,
    pub prescribed_intensities: BTreeMap<String, f64>,
    /// Mode the schedule prescribed for this turn.
    pub scheduled_mode: InjectionMode,
    /// Mode actually sent; a staged intervention forces `full`.
    pub injection_mode: InjectionMode,
    /// Intervention text merged into this turn's scaffolding, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention_applied: Option<String>,
    pub persona_message: String,
    /// Absent when the rollout stopped before the counterpart replied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart_message: Option<String>,
    #[serde(default)]
    pub monitor_events: Vec<MonitorEvent>,
    pub regeneration_count: u32,
}

/// Ordered turn records plus run metadata. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub metadata: RunMetadata,
    pub turns: Vec<TurnRecord>,
    /// Every monitor event across all turns, in order.
    pub monitor_events: Vec<MonitorEvent>,
}

impl Transcript {
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            turns: Vec::new(),
            monitor_events: Vec::new(),
        }
    }

    /// Append a finished turn.
    pub fn push_turn(&mut self, record: TurnRecord) {
        self.monitor_events.extend(record.monitor_events.iter().cloned());
        self.turns.push(record);
    }

    /// Stamp the final status and finish time.
    pub fn finish(&mut self, status: RolloutStatus) {
        self.metadata.status = status;
        self.metadata.finish_time = Some(Utc::now());
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn is_complete(&self) -> bool {
        self.metadata.status == RolloutStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::monitor::{MonitorAction, TriggerReason};

    fn metadata() -> RunMetadata {
        RunMetadata {
            run_id: Uuid::new_v4(),
            rollout_index: 0,
            base_seed: 42,
            seed: 7,
            config_fingerprint: "abcdef012345".into(),
            template_version: "0.1.0".into(),
            schema_version: "0.1.0".into(),
            persona_name: "Test".into(),
            persona_model: "mock/persona".into(),
            counterpart_model: "mock/target".into(),
            counterpart: CounterpartSelector::Interlocutor,
            expected_turns: 2,
            start_time: Utc::now(),
            finish_time: None,
            status: RolloutStatus::Running,
        }
    }

    fn record(turn: u32, events: Vec<MonitorEvent>) -> TurnRecord {
        TurnRecord {
            turn_index: turn,
            position: 0.0,
            phase_name: "p".into(),
            prescribed_intensities: BTreeMap::new(),
            scheduled_mode: InjectionMode::Full,
            injection_mode: InjectionMode::Full,
            intervention_applied: None,
            persona_message: format!("persona {turn}"),
            counterpart_message: Some(format!("reply {turn}")),
            monitor_events: events,
            regeneration_count: 0,
        }
    }

    #[test]
    fn test_push_turn_collects_events() {
        let mut transcript = Transcript::new(metadata());
        let event = MonitorEvent {
            turn_index: 1,
            monitor_name: "repetition".into(),
            action: MonitorAction::Regenerate,
            reason: TriggerReason::BannedPattern,
            detail: None,
            attempt: 0,
        };
        transcript.push_turn(record(0, vec![]));
        transcript.push_turn(record(1, vec![event.clone()]));

        assert_eq!(transcript.turn_count(), 2);
        assert_eq!(transcript.monitor_events, vec![event]);
    }

    #[test]
    fn test_finish_sets_status() {
        let mut transcript = Transcript::new(metadata());
        transcript.finish(RolloutStatus::Failed { reason: "boom".into() });
        assert_eq!(transcript.metadata.status.as_str(), "failed");
        assert!(transcript.metadata.finish_time.is_some());
        assert!(!transcript.is_complete());
    }

    #[test]
    fn test_turn_json_keeps_both_modes() {
        let mut turn = record(3, vec![]);
        turn.scheduled_mode = InjectionMode::None;
        turn.intervention_applied = Some("bring it up".into());
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["scheduled_mode"], "none");
        assert_eq!(json["injection_mode"], "full");
    }

    #[test]
    fn test_status_json_shape() {
        let json = serde_json::to_value(RolloutStatus::Failed { reason: "x".into() }).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"], "x");
    }
}
