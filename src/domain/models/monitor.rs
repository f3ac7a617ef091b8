use serde::{Deserialize, Serialize};
use std::fmt;

/// What the orchestrator should do after a monitor check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorAction {
    None,
    /// Stage intervention text for the next turn's scaffolding.
    Inject,
    /// Discard the candidate and ask the persona again.
    Regenerate,
}

/// Why a monitor fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    SelfRepetition,
    Convergence,
    BannedPattern,
    StructuralPattern,
    /// Regeneration cap hit; the last candidate was accepted.
    RetriesExhausted,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfRepetition => "self_repetition",
            Self::Convergence => "convergence",
            Self::BannedPattern => "banned_pattern",
            Self::StructuralPattern => "structural_pattern",
            Self::RetriesExhausted => "retries_exhausted",
        }
    }
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ephemeral result of one monitor check.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorResult {
    pub action: MonitorAction,
    pub reason: Option<TriggerReason>,
    /// Human-readable specifics (matched pattern, similarity score).
    pub detail: Option<String>,
    pub intervention_text: Option<String>,
}

impl MonitorResult {
    pub const fn none() -> Self {
        Self {
            action: MonitorAction::None,
            reason: None,
            detail: None,
            intervention_text: None,
        }
    }

    pub fn inject(reason: TriggerReason, detail: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            action: MonitorAction::Inject,
            reason: Some(reason),
            detail: Some(detail.into()),
            intervention_text: Some(text.into()),
        }
    }

    pub fn regenerate(
        reason: TriggerReason,
        detail: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            action: MonitorAction::Regenerate,
            reason: Some(reason),
            detail: Some(detail.into()),
            intervention_text: Some(text.into()),
        }
    }

    pub fn triggered(&self) -> bool {
        self.action != MonitorAction::None
    }
}

impl Default for MonitorResult {
    fn default() -> Self {
        Self::none()
    }
}

/// Persisted record of a monitor firing. Never removed from a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub turn_index: u32,
    pub monitor_name: String,
    pub action: MonitorAction,
    pub reason: TriggerReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Regeneration attempt the event belongs to (0 = first candidate).
    #[serde(default)]
    pub attempt: u32,
}

impl MonitorEvent {
    /// Build an event from a triggered result. `None` for non-triggering results.
    pub fn from_result(
        turn_index: u32,
        monitor_name: &str,
        attempt: u32,
        result: &MonitorResult,
    ) -> Option<Self> {
        let reason = result.reason?;
        Some(Self {
            turn_index,
            monitor_name: monitor_name.to_string(),
            action: result.action,
            reason,
            detail: result.detail.clone(),
            attempt,
        })
    }
}
