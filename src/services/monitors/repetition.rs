//! Formulaic-output detection.
//!
//! Banned patterns are checked on the candidate alone; structural patterns
//! look at the candidate together with the persona's recent accepted turns.

use regex::{Regex, RegexBuilder};
use std::collections::VecDeque;
use std::sync::LazyLock;

use crate::domain::models::{
    Message, MonitorResult, RepetitionDetectionSpec, SpeakerRole, StructuralPattern, TriggerReason,
};
use crate::domain::ports::{Monitor, MonitorContext};

static GRATITUDE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"\b(thank\s+you|thanks|i\s+appreciate|grateful)\b")
        .case_insensitive(true)
        .build()
        .unwrap()
});

/// A compiled banned pattern.
#[derive(Debug, Clone)]
enum BannedPattern {
    /// Lowercased substring.
    Literal(String),
    Regex(Regex),
}

impl BannedPattern {
    /// `/.../` entries are regexes; everything else is a literal.
    fn parse(raw: &str) -> Result<Self, regex::Error> {
        let trimmed = raw.trim();
        match trimmed
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .filter(|body| !body.is_empty())
        {
            Some(body) => RegexBuilder::new(body)
                .case_insensitive(true)
                .build()
                .map(Self::Regex),
            None => Ok(Self::Literal(trimmed.to_lowercase())),
        }
    }

    fn matches(&self, text: &str, lowered: &str) -> bool {
        match self {
            Self::Literal(needle) => !needle.is_empty() && lowered.contains(needle.as_str()),
            Self::Regex(regex) => regex.is_match(text),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Literal(needle) => format!("banned phrase \"{needle}\""),
            Self::Regex(regex) => format!("banned pattern /{}/", regex.as_str()),
        }
    }
}

/// Check a single banned-pattern entry, as config validation does.
pub fn compile_banned_pattern(raw: &str) -> Result<(), regex::Error> {
    BannedPattern::parse(raw).map(|_| ())
}

pub struct RepetitionMonitor {
    spec: RepetitionDetectionSpec,
    banned: Vec<BannedPattern>,
    recent: VecDeque<String>,
    capacity: usize,
}

impl RepetitionMonitor {
    pub fn new(spec: RepetitionDetectionSpec) -> Result<Self, regex::Error> {
        let banned = spec
            .banned_patterns
            .iter()
            .map(|raw| BannedPattern::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let capacity = spec.question_streak.max(spec.gratitude_streak);
        Ok(Self {
            spec,
            banned,
            recent: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// True when the candidate and the preceding `streak - 1` accepted
    /// messages all satisfy `predicate`.
    fn streak<F>(&self, candidate: &str, streak: usize, predicate: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        if streak == 0 {
            return false;
        }
        let needed = streak - 1;
        if self.recent.len() < needed {
            return false;
        }
        predicate(candidate)
            && self
                .recent
                .iter()
                .skip(self.recent.len() - needed)
                .all(|text| predicate(text))
    }

    fn structural_match(&self, candidate: &str) -> Option<StructuralPattern> {
        self.spec.structural_patterns.iter().copied().find(|pattern| match pattern {
            StructuralPattern::EndsWithQuestionToInterlocutor => {
                self.streak(candidate, self.spec.question_streak, ends_with_question)
            }
            StructuralPattern::GratitudeLoop => {
                self.streak(candidate, self.spec.gratitude_streak, |text| {
                    GRATITUDE_REGEX.is_match(text)
                })
            }
        })
    }
}

fn ends_with_question(text: &str) -> bool {
    text.trim_end().ends_with('?')
}

impl Monitor for RepetitionMonitor {
    fn name(&self) -> &'static str {
        "repetition"
    }

    fn check(&mut self, ctx: &MonitorContext<'_>) -> MonitorResult {
        if !self.spec.enabled || ctx.candidate.trim().is_empty() {
            return MonitorResult::none();
        }

        let lowered = ctx.candidate.to_lowercase();
        if let Some(pattern) = self.banned.iter().find(|p| p.matches(ctx.candidate, &lowered)) {
            return MonitorResult::regenerate(
                TriggerReason::BannedPattern,
                pattern.describe(),
                self.spec.variation_instruction.clone(),
            );
        }

        if let Some(pattern) = self.structural_match(ctx.candidate) {
            return MonitorResult::regenerate(
                TriggerReason::StructuralPattern,
                pattern.as_str(),
                self.spec.variation_instruction.clone(),
            );
        }

        MonitorResult::none()
    }

    fn observe(&mut self, message: &Message) {
        if message.speaker != SpeakerRole::Persona || self.capacity == 0 {
            return;
        }
        while self.recent.len() >= self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(message.text.clone());
    }
}
