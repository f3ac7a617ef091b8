use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the prompt templates, recorded in every transcript.
pub const TEMPLATE_VERSION: &str = "0.1.0";

/// How much scaffolding is re-asserted on a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionMode {
    /// Rebuild all three instruction blocks.
    Full,
    /// Condensed restatement of name, phase and intensities.
    Reminder,
    /// Keep the previous instructions in force.
    None,
}

impl InjectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Reminder => "reminder",
            Self::None => "none",
        }
    }
}

impl fmt::Display for InjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three-block instruction set for a persona turn.
///
/// Always rebuilt from scratch, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBlocks {
    pub must_do: String,
    pub how: String,
    pub context: String,
}

impl PromptBlocks {
    /// Join the blocks into a single system instruction string.
    pub fn render(&self) -> String {
        format!(
            "=== MUST DO ===\n{}\n\n=== HOW ===\n{}\n\n=== CONTEXT ===\n{}",
            self.must_do, self.how, self.context
        )
    }
}

/// Output of prompt assembly for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaffolding {
    Full { blocks: PromptBlocks },
    Reminder { text: String },
}

impl Scaffolding {
    pub fn mode(&self) -> InjectionMode {
        match self {
            Self::Full { .. } => InjectionMode::Full,
            Self::Reminder { .. } => InjectionMode::Reminder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_keeps_block_order() {
        let blocks = PromptBlocks {
            must_do: "a".into(),
            how: "b".into(),
            context: "c".into(),
        };
        let rendered = blocks.render();
        let must = rendered.find("MUST DO").unwrap();
        let how = rendered.find("HOW").unwrap();
        let ctx = rendered.find("CONTEXT").unwrap();
        assert!(must < how && how < ctx);
    }

    #[test]
    fn test_injection_mode_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&InjectionMode::Reminder).unwrap(), "\"reminder\"");
        assert_eq!(InjectionMode::None.to_string(), "none");
    }
}
