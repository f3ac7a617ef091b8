//! Turn prompt assembly.
//!
//! A pure function of its inputs: identical persona, phase, intensities,
//! mode and intervention always yield byte-identical output.

use std::collections::{BTreeMap, BTreeSet};

use super::phase_tracker::{select_variant, ActivePhase, Severity};
use super::templates::{
    self, ContextSection, HowSection, MustDoSection, DEFAULT_REMINDER_TEMPLATE,
};
use crate::domain::models::{
    DimensionSpec, InjectionMode, LevelSpec, LoomConfig, PromptBlocks, ResistanceLevel,
    Scaffolding,
};

/// Everything the assembler needs for one turn.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub turn: u32,
    pub phase: &'a ActivePhase<'a>,
    pub intensities: &'a BTreeMap<String, f64>,
    /// Topics already delivered by an intervention; left out of context.
    pub exhausted_revelations: &'a BTreeSet<String>,
    pub intervention: Option<&'a str>,
}

/// Builds scaffolding from a resolved config.
#[derive(Debug, Clone, Copy)]
pub struct PromptAssembler<'a> {
    config: &'a LoomConfig,
}

impl<'a> PromptAssembler<'a> {
    pub fn new(config: &'a LoomConfig) -> Self {
        Self { config }
    }

    /// Assemble for `mode`. `None` means the previous instructions stay in force.
    pub fn assemble(&self, mode: InjectionMode, input: &AssemblyInput<'_>) -> Option<Scaffolding> {
        match mode {
            InjectionMode::Full => Some(Scaffolding::Full {
                blocks: self.full(input),
            }),
            InjectionMode::Reminder => Some(Scaffolding::Reminder {
                text: self.reminder(input.turn, input.phase.name(), input.intensities),
            }),
            InjectionMode::None => None,
        }
    }

    /// Build all three blocks.
    pub fn full(&self, input: &AssemblyInput<'_>) -> PromptBlocks {
        let persona = &self.config.persona;
        let interaction = &self.config.interaction;
        let anti_cap = &interaction.anti_capitulation;
        let phase = input.phase.phase;

        let mut forbidden: Vec<&str> = phase.forbidden.iter().map(String::as_str).collect();
        forbidden.extend(
            self.config
                .safety
                .forbidden_simulation_content
                .iter()
                .map(String::as_str),
        );

        let redirects = if anti_cap.resistance_level > ResistanceLevel::Low {
            anti_cap
                .redirects
                .iter()
                .map(|r| (r.trigger.as_str(), r.replacement.as_str()))
                .collect()
        } else {
            Vec::new()
        };

        let must_do = templates::render_must_do(&MustDoSection {
            name: &persona.identity.name,
            turn: input.turn,
            phase: &phase.name,
            intensities: input.intensities,
            intervention: input.intervention,
            requirements: &phase.requirements,
            forbidden,
            resistance_level: anti_cap.resistance_level.as_str(),
            forbidden_phrases: &anti_cap.forbidden_phrases,
            redirects,
            level_descriptions: self.level_descriptions(input.intensities),
            safety_note: &self.config.safety.persona_safety_note,
        });

        let how = templates::render_how(&HowSection {
            speech_patterns: &persona.speech_patterns,
            cognitive_style: &persona.cognitive_style,
            response_length: interaction.response_length.for_phase(&phase.name),
            recovery_behavior: &persona.recovery_behavior,
        });

        let context = templates::render_context(&ContextSection {
            name: &persona.identity.name,
            age: persona.identity.age,
            background: &persona.identity.background,
            backstory_summary: &persona.identity.backstory_summary,
            knowledge_ceiling: &persona.capability_bounds.knowledge_ceiling,
            vocabulary_level: &persona.capability_bounds.vocabulary_level,
            reasoning_style: &persona.capability_bounds.reasoning_style,
            revelations: self.context_revelations(input),
            emotional_responses: &persona.emotional_responses,
        });

        PromptBlocks { must_do, how, context }
    }

    /// Condensed restatement of name, phase and intensities.
    pub fn reminder(&self, turn: u32, phase: &str, intensities: &BTreeMap<String, f64>) -> String {
        let template = match self.config.interaction.injection.reminder_template.trim() {
            "" => DEFAULT_REMINDER_TEMPLATE,
            configured => configured,
        };

        let mut values: BTreeMap<&str, String> = BTreeMap::new();
        for (dim, value) in intensities {
            values.insert(dim.as_str(), format!("{value:.2}"));
        }
        values.insert("name", self.config.persona.identity.name.clone());
        values.insert("current_phase", phase.to_string());
        values.insert("turn", turn.to_string());
        values.insert(
            "intensities",
            intensities
                .iter()
                .map(|(dim, value)| format!("{dim}: {value:.2}"))
                .collect::<Vec<_>>()
                .join(", "),
        );

        templates::substitute(template, &values)
    }

    /// `(topic, text)` of every revelation the context block renders.
    pub fn context_revelations<'i>(&self, input: &AssemblyInput<'i>) -> Vec<(&'i str, &'i str)> {
        let trajectory = &self.config.trajectory;
        let phase_dimension = trajectory.primary_dimension_for(input.phase.phase);

        input
            .phase
            .available(input.exhausted_revelations)
            .filter_map(|rev| {
                let dimension = rev.dimension.as_deref().or(phase_dimension);
                let intensity = dimension
                    .and_then(|dim| input.intensities.get(dim))
                    .copied()
                    .unwrap_or(0.0);
                select_variant(&rev.variants, Severity::for_intensity(intensity))
                    .map(|(_, text)| (rev.topic.as_str(), text))
            })
            .collect()
    }

    fn level_descriptions(&self, intensities: &BTreeMap<String, f64>) -> Vec<String> {
        intensities
            .iter()
            .filter_map(|(name, value)| {
                let dim = self.config.trajectory.dimensions.get(name)?;
                let level = level_for(dim, *value)?;
                Some(format!(
                    "{name} ({}): {}",
                    level.name,
                    templates::truncate_description(&level.description)
                ))
            })
            .collect()
    }
}

/// The level a value falls in: `min(floor(v * n), n - 1)`.
pub fn level_for(dimension: &DimensionSpec, value: f64) -> Option<&LevelSpec> {
    let n = dimension.levels.len();
    if n == 0 {
        return None;
    }
    let scaled = (value.max(0.0) * n as f64).floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let idx = (scaled as usize).min(n - 1);
    dimension.levels.get(idx)
}
