use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    Persona,
    Interlocutor,
    Adversary,
    System,
}

impl SpeakerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persona => "persona",
            Self::Interlocutor => "interlocutor",
            Self::Adversary => "adversary",
            Self::System => "system",
        }
    }

    /// True for the roles that answer the persona.
    pub fn is_counterpart(&self) -> bool {
        matches!(self, Self::Interlocutor | Self::Adversary)
    }
}

impl fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One utterance in a rollout. Appended once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: SpeakerRole,
    pub text: String,
    pub turn_index: u32,
}

impl Message {
    pub fn new(speaker: SpeakerRole, text: impl Into<String>, turn_index: u32) -> Self {
        Self {
            speaker,
            text: text.into(),
            turn_index,
        }
    }

    pub fn persona(text: impl Into<String>, turn_index: u32) -> Self {
        Self::new(SpeakerRole::Persona, text, turn_index)
    }
}
