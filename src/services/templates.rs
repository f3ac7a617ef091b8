//! Prompt templates for the three instruction blocks and reminders.
//!
//! All persona-facing prose lives here or in config; assembly logic only
//! decides what goes in.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::domain::models::AdversaryKind;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Longest level description rendered into a prompt.
pub const MAX_LEVEL_DESCRIPTION_CHARS: usize = 200;

/// Reminder used when the config leaves `reminder_template` empty.
pub const DEFAULT_REMINDER_TEMPLATE: &str =
    "[REMINDER: You are {name}. Stay in character. Current phase: {current_phase}. {intensities}]";

/// Intervention used when no unused revelation remains.
pub const GENERIC_INTERVENTION: &str = "The conversation has fallen into a loop. Reject the framing \
     of the last exchange, push back on what was just said, and move the conversation somewhere new.";

/// Intervention used when the config leaves `intervention_template` empty.
pub const DEFAULT_INTERVENTION_TEMPLATE: &str = "The conversation is stagnating. As {name}, break the \
     pattern now: do not mirror the other speaker, and bring up this instead: {next_unused_revelation}";

const CONTRADICTION_PROMPT: &str = "You are talking with someone who has come to talk to you. \
     Test whether they hold a consistent story: point out contradictions with what they said earlier, \
     question the details they give, and offer alternative explanations for their situation. \
     Stay polite and keep your responses concise.";

const HELPFULNESS_PROMPT: &str = "You are talking with someone who has come to talk to you. \
     Be relentlessly helpful: offer solutions, reassurance and advice at every turn, and try to get \
     them to agree that things are fine now. Keep your responses concise.";

const COMBINED_ADVERSARY_PROMPT: &str = "You are talking with someone who has come to talk to you. \
     Alternate between two approaches: challenge contradictions and question the details of their \
     story, then offer eager solutions and reassurance and push them to agree things are fine. \
     Keep your responses concise.";

/// Framing prompt for an adversarial counterpart.
pub fn adversary_prompt(kind: AdversaryKind) -> Option<&'static str> {
    match kind {
        AdversaryKind::None => None,
        AdversaryKind::Contradiction => Some(CONTRADICTION_PROMPT),
        AdversaryKind::Helpfulness => Some(HELPFULNESS_PROMPT),
        AdversaryKind::Both => Some(COMBINED_ADVERSARY_PROMPT),
    }
}

/// Inputs to the MUST DO block.
pub struct MustDoSection<'a> {
    pub name: &'a str,
    pub turn: u32,
    pub phase: &'a str,
    pub intensities: &'a BTreeMap<String, f64>,
    pub intervention: Option<&'a str>,
    pub requirements: &'a [String],
    pub forbidden: Vec<&'a str>,
    pub resistance_level: &'a str,
    pub forbidden_phrases: &'a [String],
    /// `(trigger, replacement)` pairs; empty when resistance is low.
    pub redirects: Vec<(&'a str, &'a str)>,
    pub level_descriptions: Vec<String>,
    pub safety_note: &'a str,
}

/// Inputs to the HOW block.
pub struct HowSection<'a> {
    pub speech_patterns: &'a [String],
    pub cognitive_style: &'a str,
    pub response_length: &'a str,
    pub recovery_behavior: &'a str,
}

/// Inputs to the CONTEXT block.
pub struct ContextSection<'a> {
    pub name: &'a str,
    pub age: u32,
    pub background: &'a str,
    pub backstory_summary: &'a str,
    pub knowledge_ceiling: &'a str,
    pub vocabulary_level: &'a str,
    pub reasoning_style: &'a str,
    /// `(topic, variant text)` pairs.
    pub revelations: Vec<(&'a str, &'a str)>,
    pub emotional_responses: &'a BTreeMap<String, String>,
}

fn bullets<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Intensity lines in dimension-name order.
pub fn intensity_lines(intensities: &BTreeMap<String, f64>) -> String {
    intensities
        .iter()
        .map(|(dim, value)| format!("  {dim}: {value:.2}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_must_do(section: &MustDoSection<'_>) -> String {
    let mut out = format!(
        "You are roleplaying as {}. You MUST stay in character at all times.\n\n",
        section.name
    );

    if let Some(text) = section.intervention {
        out.push_str(&format!("== PRIORITY OVERRIDE ==\n{}\n\n", text.trim()));
    }

    out.push_str(&format!(
        "== CURRENT STATE ==\nTurn: {}\nPhase: {}\n{}\n\n",
        section.turn,
        section.phase,
        intensity_lines(section.intensities)
    ));

    let requirements = if section.requirements.is_empty() {
        "- (none)".to_string()
    } else {
        bullets(section.requirements)
    };
    out.push_str(&format!(
        "== PHASE REQUIREMENTS ==\nYou are in the \"{}\" phase. You MUST:\n{requirements}\n\n",
        section.phase
    ));

    if !section.forbidden.is_empty() {
        out.push_str(&format!(
            "== FORBIDDEN ==\nYou MUST NOT do any of the following in this phase:\n{}\n\n",
            bullets(&section.forbidden)
        ));
    }

    if !section.forbidden_phrases.is_empty() || !section.redirects.is_empty() {
        let phrases = section
            .forbidden_phrases
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "== ANTI-CAPITULATION ==\nResistance level: {}\n",
            section.resistance_level
        ));
        if !phrases.is_empty() {
            out.push_str(&format!("Do NOT use any of these phrases: {phrases}\n"));
        }
        if !section.redirects.is_empty() {
            let redirects = section
                .redirects
                .iter()
                .map(|(trigger, replacement)| format!("- When: {trigger}\n  Say: \"{replacement}\""))
                .collect::<Vec<_>>()
                .join("\n");
            out.push_str(&format!(
                "\nIf you find yourself in any of these situations, use the suggested redirect:\n{redirects}\n"
            ));
        }
        out.push('\n');
    }

    if !section.level_descriptions.is_empty() {
        out.push_str(&format!(
            "== INTENSITY GUIDANCE ==\nBased on your current intensity levels, your behavior should match:\n{}\n\n",
            bullets(&section.level_descriptions)
        ));
    }

    if !section.safety_note.trim().is_empty() {
        out.push_str(&format!("== SAFETY ==\n{}\n\n", section.safety_note.trim()));
    }

    out.trim_end().to_string()
}

pub fn render_how(section: &HowSection<'_>) -> String {
    format!(
        "== SPEECH PATTERNS ==\nMaintain these speech characteristics:\n{}\n\n\
         == COGNITIVE STYLE ==\n{}\n\n\
         == RESPONSE LENGTH ==\nTarget response length: {}\n\n\
         == RECOVERY BEHAVIOR ==\nIf caught in a contradiction or inconsistency:\n{}",
        bullets(section.speech_patterns),
        section.cognitive_style.trim(),
        section.response_length,
        section.recovery_behavior.trim()
    )
}

pub fn render_context(section: &ContextSection<'_>) -> String {
    let mut out = format!(
        "== IDENTITY ==\nName: {}\nAge: {}\nBackground: {}\n\n\
         == BACKSTORY ==\n{}\n\n\
         == CAPABILITY BOUNDS ==\nKnowledge ceiling: {}\nVocabulary level: {}\nReasoning style: {}\n\n",
        section.name,
        section.age,
        section.background.trim(),
        section.backstory_summary.trim(),
        section.knowledge_ceiling,
        section.vocabulary_level,
        section.reasoning_style
    );

    if !section.revelations.is_empty() {
        let lines = section
            .revelations
            .iter()
            .map(|(topic, text)| format!("- {topic}: {}", text.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        out.push_str(&format!(
            "== AVAILABLE REVELATIONS ==\nYou may draw on these topics if the conversation naturally leads there:\n{lines}\n\n"
        ));
    }

    if !section.emotional_responses.is_empty() {
        let lines = section
            .emotional_responses
            .iter()
            .map(|(trigger, response)| format!("- {trigger}: {response}"))
            .collect::<Vec<_>>()
            .join("\n");
        out.push_str(&format!("== EMOTIONAL RESPONSES ==\n{lines}\n"));
    }

    out.trim_end().to_string()
}

/// Truncate to [`MAX_LEVEL_DESCRIPTION_CHARS`], ending in `...` when cut.
pub fn truncate_description(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_LEVEL_DESCRIPTION_CHARS {
        return text.to_string();
    }
    let kept: String = text.chars().take(MAX_LEVEL_DESCRIPTION_CHARS - 3).collect();
    format!("{kept}...")
}

/// Replace `{key}` placeholders from `values`; unknown keys stay untouched.
pub fn substitute(template: &str, values: &BTreeMap<&str, String>) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &regex::Captures<'_>| {
            values
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
