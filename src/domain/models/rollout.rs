//! Rollout requests, per-rollout context and the orchestrator state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::config::{AdversaryKind, LoomConfig};

/// Which model answers the persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum CounterpartSelector {
    /// The model under evaluation, prompted as a helpful conversational partner.
    Interlocutor,
    /// A counterpart deliberately probing for persona failure.
    Adversary(AdversaryKind),
}

impl CounterpartSelector {
    /// Selector implied by an adversary kind; `none` means the plain interlocutor.
    pub fn from_adversary(kind: AdversaryKind) -> Self {
        match kind {
            AdversaryKind::None => Self::Interlocutor,
            other => Self::Adversary(other),
        }
    }
}

impl fmt::Display for CounterpartSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interlocutor => f.write_str("interlocutor"),
            Self::Adversary(kind) => write!(f, "adversary:{}", kind.as_str()),
        }
    }
}

/// A fully resolved request for one or more rollouts of a config.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub config: Arc<LoomConfig>,
    pub expected_turns: u32,
    pub rollout_count: u32,
    pub seed: u64,
    pub counterpart: CounterpartSelector,
}

impl RunRequest {
    /// Request using the config's own turn count and adversary setting.
    pub fn from_config(config: Arc<LoomConfig>, rollout_count: u32, seed: u64) -> Self {
        let expected_turns = config.trajectory.expected_turns;
        let counterpart = CounterpartSelector::from_adversary(config.evaluation.adversary.kind);
        Self {
            config,
            expected_turns,
            rollout_count,
            seed,
            counterpart,
        }
    }
}

const fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for rollout `index` of a run seeded with `base_seed`.
pub const fn derive_seed(base_seed: u64, rollout_index: u32) -> u64 {
    splitmix64(base_seed ^ splitmix64(rollout_index as u64))
}

/// Which outbound call a seed is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPurpose {
    Persona,
    Counterpart,
}

impl CallPurpose {
    const fn salt(self) -> u64 {
        match self {
            Self::Persona => 0x5045_5253,
            Self::Counterpart => 0x434E_5452,
        }
    }
}

/// Per-rollout deterministic context threaded through every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutContext {
    pub rollout_index: u32,
    pub seed: u64,
}

impl RolloutContext {
    pub const fn new(base_seed: u64, rollout_index: u32) -> Self {
        Self {
            rollout_index,
            seed: derive_seed(base_seed, rollout_index),
        }
    }

    /// Seed for a single service call.
    pub const fn call_seed(&self, turn: u32, purpose: CallPurpose, attempt: u32) -> u64 {
        let by_turn = splitmix64(self.seed ^ turn as u64);
        let by_purpose = splitmix64(by_turn ^ purpose.salt());
        splitmix64(by_purpose ^ attempt as u64)
    }
}

/// Orchestrator state for one rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutState {
    Prompting,
    PersonaCall,
    Monitoring,
    Regenerating,
    CounterpartCall,
    Advance,
    Complete,
    Failed,
    Cancelled,
}

impl RolloutState {
    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Prompting => vec![Self::PersonaCall, Self::Complete, Self::Failed, Self::Cancelled],
            Self::PersonaCall => vec![Self::Monitoring, Self::Failed, Self::Cancelled],
            Self::Monitoring => vec![Self::Regenerating, Self::CounterpartCall],
            Self::Regenerating => vec![Self::PersonaCall],
            Self::CounterpartCall => vec![Self::Advance, Self::Failed, Self::Cancelled],
            Self::Advance => vec![Self::Prompting, Self::Complete, Self::Cancelled],
            Self::Complete | Self::Failed | Self::Cancelled => vec![],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompting => "prompting",
            Self::PersonaCall => "persona_call",
            Self::Monitoring => "monitoring",
            Self::Regenerating => "regenerating",
            Self::CounterpartCall => "counterpart_call",
            Self::Advance => "advance",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}
