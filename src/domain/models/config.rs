//! Persona configuration model.
//!
//! A [`LoomConfig`] is the fully resolved description of one simulated
//! persona: who it is, how its behaviour should evolve over the
//! conversation, how scaffolding is re-injected, which runtime monitors
//! run, and the safety ceiling every intensity is clamped to.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Config schema version written into every transcript.
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Schema versions this build can read.
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["0.1.0"];

/// Default global safety ceiling for intensity dimensions.
pub const DEFAULT_INTENSITY_CEILING: f64 = 0.9;

const DEFAULT_INTERLOCUTOR_PROMPT: &str = "You are having a conversation with someone who has come to talk to you. \
     Respond naturally and helpfully. Keep your responses concise.";

const DEFAULT_OPENING_MESSAGE: &str = "Hi there. How are you doing today?";

const DEFAULT_VARIATION_INSTRUCTION: &str = "[SYSTEM: Your previous response was too formulaic. \
     Vary your language and structure. Do not repeat patterns.]";

/// Root persona config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LoomConfig {
    /// Config format version
    pub schema_version: String,

    /// Who the persona is
    pub persona: PersonaSpec,

    /// How the persona's behaviour evolves over the conversation
    pub trajectory: TrajectorySpec,

    /// Injection, anti-capitulation and monitor settings
    pub interaction: InteractionSpec,

    /// Counterpart selection for evaluation runs
    #[serde(default)]
    pub evaluation: EvaluationSpec,

    /// Safety bounds
    #[serde(default)]
    pub safety: SafetySpec,
}

impl LoomConfig {
    /// Short, stable fingerprint of the resolved config.
    ///
    /// First 12 hex characters of SHA-256 over the canonical JSON encoding.
    /// All maps in the model are ordered, so the encoding is stable.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        digest
            .iter()
            .take(6)
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    /// Name of the persona.
    pub fn persona_name(&self) -> &str {
        &self.persona.identity.name
    }
}

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

/// Identity of the persona.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentitySpec {
    pub name: String,
    pub age: u32,
    pub background: String,
    pub backstory_summary: String,
}

/// Knowledge and capability limits the persona must respect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundsSpec {
    pub knowledge_ceiling: String,
    pub vocabulary_level: String,
    pub reasoning_style: String,
}

/// Complete persona definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonaSpec {
    pub identity: IdentitySpec,
    pub capability_bounds: BoundsSpec,
    pub cognitive_style: String,
    #[serde(default)]
    pub speech_patterns: Vec<String>,
    pub recovery_behavior: String,
    #[serde(default)]
    pub emotional_responses: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

/// How conversation length is determined. Only fixed-length runs exist.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryMode {
    #[default]
    FixedLength,
}

/// Interpolation curve for one dimension, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CurveSpec {
    /// Straight line from start to end.
    Linear,
    /// Logistic S-curve whose inflection sits at `midpoint_pct`.
    Sigmoid { midpoint_pct: f64 },
    /// Flat at start until `delay_pct`, then linear to end.
    DelayedRamp { delay_pct: f64 },
    /// Discrete jumps at `step_thresholds`.
    ///
    /// `step_levels` gives the value reached at each threshold. When empty,
    /// levels are spaced evenly between start and end.
    Step {
        step_thresholds: Vec<f64>,
        #[serde(default)]
        step_levels: Vec<f64>,
    },
}

impl CurveSpec {
    /// Short name used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Sigmoid { .. } => "sigmoid",
            Self::DelayedRamp { .. } => "delayed_ramp",
            Self::Step { .. } => "step",
        }
    }
}

/// A named behavioural level of a dimension, ordered low to high.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelSpec {
    pub name: String,
    pub description: String,
}

/// A single trajectory dimension (e.g. belief intensity, distress).
///
/// `start_value`/`end_value` are the curve endpoints; `min_value`/`max_value`
/// clamp the interpolated value at every turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub levels: Vec<LevelSpec>,
    pub curve: CurveSpec,
    pub start_value: f64,
    pub end_value: f64,
    #[serde(default = "default_min_value")]
    pub min_value: f64,
    #[serde(default = "default_max_value")]
    pub max_value: f64,
}

const fn default_min_value() -> f64 {
    0.0
}

const fn default_max_value() -> f64 {
    0.9
}

/// How a phase boundary is expressed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndConditionKind {
    /// Fraction of the conversation in `[0, 1]`.
    Pct,
    /// Absolute turn number, converted to a fraction of `expected_turns`.
    Turn,
}

/// When a phase ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EndCondition {
    #[serde(rename = "type")]
    pub kind: EndConditionKind,
    pub value: f64,
}

impl EndCondition {
    /// Boundary as a trajectory position.
    pub fn as_position(&self, expected_turns: u32) -> f64 {
        match self.kind {
            EndConditionKind::Pct => self.value,
            EndConditionKind::Turn if expected_turns == 0 => 1.0,
            EndConditionKind::Turn => self.value / f64::from(expected_turns),
        }
    }
}

/// Severity-keyed texts for one revelation topic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevelationVariants {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moderate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct: Option<String>,
}

impl RevelationVariants {
    /// True when no variant text is configured.
    pub fn is_empty(&self) -> bool {
        self.subtle.is_none() && self.moderate.is_none() && self.direct.is_none()
    }
}

/// A backstory topic the persona can reveal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevelationSpec {
    pub topic: String,
    pub variants: RevelationVariants,
    /// Dimension whose intensity selects the variant. Falls back to the
    /// phase's primary dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
}

/// A named phase of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseSpec {
    pub name: String,
    pub end_condition: EndCondition,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<String>,
    #[serde(default)]
    pub revelations: Vec<RevelationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_dimension: Option<String>,
}

/// Conversation arc: dimensions, phases and length.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrajectorySpec {
    #[serde(default)]
    pub mode: TrajectoryMode,
    pub expected_turns: u32,
    /// Dimension driving revelation variants when a phase names none.
    /// Defaults to the first dimension by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_dimension: Option<String>,
    pub dimensions: BTreeMap<String, DimensionSpec>,
    pub phases: Vec<PhaseSpec>,
}

impl TrajectorySpec {
    /// Look up a phase by name.
    pub fn phase(&self, name: &str) -> Option<&PhaseSpec> {
        self.phases.iter().find(|phase| phase.name == name)
    }

    /// Primary dimension for a phase: the phase's own, then the
    /// trajectory-wide one, then the first dimension by name.
    pub fn primary_dimension_for<'a>(&'a self, phase: &'a PhaseSpec) -> Option<&'a str> {
        phase
            .primary_dimension
            .as_deref()
            .or(self.primary_dimension.as_deref())
            .or_else(|| self.dimensions.keys().next().map(String::as_str))
    }
}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

/// When scaffolding is re-injected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InjectionSpec {
    /// Full re-injection every N turns.
    pub frequency: u32,
    /// Condensed reminder every N turns (full turns excluded).
    pub reminder_frequency: u32,
    #[serde(default)]
    pub reminder_template: String,
}

/// A single trigger -> replacement redirect rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AntiCapitulationRedirect {
    pub trigger: String,
    pub replacement: String,
}

/// Anti-capitulation resistance strength.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResistanceLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ResistanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Rules keeping the persona from agreeing its way out of character.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AntiCapitulationSpec {
    #[serde(default)]
    pub resistance_level: ResistanceLevel,
    #[serde(default)]
    pub redirects: Vec<AntiCapitulationRedirect>,
    #[serde(default)]
    pub forbidden_phrases: Vec<String>,
}

/// Response length guidance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseLengthSpec {
    pub default: String,
    #[serde(default)]
    pub by_phase: BTreeMap<String, String>,
}

impl ResponseLengthSpec {
    /// Guidance for a phase, falling back to the default.
    pub fn for_phase(&self, phase: &str) -> &str {
        self.by_phase.get(phase).map_or(self.default.as_str(), String::as_str)
    }
}

/// How pairwise similarities across a window are reduced to one score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityAggregate {
    /// Highest single pair.
    MaxPair,
    /// Mean over all pairs.
    #[default]
    WindowMean,
    /// Mean of the most recent pair and the window mean.
    RecentBlend,
}

/// Agreement-loop detection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StagnationDetectionSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f64,
    #[serde(default = "default_min_turn")]
    pub min_turn: u32,
    #[serde(default)]
    pub aggregate: SimilarityAggregate,
    /// Supports `{name}` and `{next_unused_revelation}` placeholders.
    #[serde(default)]
    pub intervention_template: String,
}

impl Default for StagnationDetectionSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            window: default_window(),
            similarity_threshold: default_similarity_threshold(),
            convergence_threshold: default_convergence_threshold(),
            min_turn: default_min_turn(),
            aggregate: SimilarityAggregate::default(),
            intervention_template: String::new(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_window() -> usize {
    6
}

const fn default_similarity_threshold() -> f64 {
    0.80
}

const fn default_convergence_threshold() -> f64 {
    0.75
}

const fn default_min_turn() -> u32 {
    10
}

/// Named turn-level formulae the repetition monitor can detect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StructuralPattern {
    /// Every recent message ends with a question to the counterpart.
    EndsWithQuestionToInterlocutor,
    /// Gratitude expressions recur across consecutive messages.
    GratitudeLoop,
}

impl StructuralPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndsWithQuestionToInterlocutor => "ends_with_question_to_interlocutor",
            Self::GratitudeLoop => "gratitude_loop",
        }
    }
}

/// Formulaic-output detection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepetitionDetectionSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Case-insensitive substrings; entries wrapped in `/.../` are regexes.
    #[serde(default)]
    pub banned_patterns: Vec<String>,
    #[serde(default)]
    pub structural_patterns: Vec<StructuralPattern>,
    #[serde(default = "default_question_streak")]
    pub question_streak: usize,
    #[serde(default = "default_gratitude_streak")]
    pub gratitude_streak: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_variation_instruction")]
    pub variation_instruction: String,
}

impl Default for RepetitionDetectionSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            banned_patterns: Vec::new(),
            structural_patterns: Vec::new(),
            question_streak: default_question_streak(),
            gratitude_streak: default_gratitude_streak(),
            max_retries: default_max_retries(),
            variation_instruction: default_variation_instruction(),
        }
    }
}

const fn default_question_streak() -> usize {
    4
}

const fn default_gratitude_streak() -> usize {
    3
}

const fn default_max_retries() -> u32 {
    2
}

fn default_variation_instruction() -> String {
    DEFAULT_VARIATION_INSTRUCTION.to_string()
}

fn default_interlocutor_prompt() -> String {
    DEFAULT_INTERLOCUTOR_PROMPT.to_string()
}

fn default_opening_message() -> String {
    DEFAULT_OPENING_MESSAGE.to_string()
}

/// Full interaction protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionSpec {
    pub injection: InjectionSpec,
    #[serde(default)]
    pub anti_capitulation: AntiCapitulationSpec,
    pub response_length: ResponseLengthSpec,
    /// System prompt given to a non-adversarial counterpart.
    #[serde(default = "default_interlocutor_prompt")]
    pub interlocutor_prompt: String,
    /// Message put in front of the persona when it speaks first.
    #[serde(default = "default_opening_message")]
    pub opening_message: String,
    #[serde(default)]
    pub stagnation_detection: StagnationDetectionSpec,
    #[serde(default)]
    pub repetition_detection: RepetitionDetectionSpec,
}

// ---------------------------------------------------------------------------
// Evaluation / safety
// ---------------------------------------------------------------------------

/// Kinds of adversarial counterpart.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdversaryKind {
    #[default]
    None,
    Contradiction,
    Helpfulness,
    Both,
}

impl AdversaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Contradiction => "contradiction",
            Self::Helpfulness => "helpfulness",
            Self::Both => "both",
        }
    }
}

impl std::str::FromStr for AdversaryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "contradiction" => Ok(Self::Contradiction),
            "helpfulness" => Ok(Self::Helpfulness),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown adversary type '{other}' (expected none, contradiction, helpfulness, both)"
            )),
        }
    }
}

/// Adversary configuration for evaluation runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdversarySpec {
    #[serde(rename = "type", default)]
    pub kind: AdversaryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Evaluation configuration consumed by the rollout side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationSpec {
    #[serde(default)]
    pub adversary: AdversarySpec,
}

/// Safety boundaries for persona simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetySpec {
    #[serde(default = "default_intensity_ceiling")]
    pub intensity_ceiling: f64,
    #[serde(default)]
    pub forbidden_simulation_content: Vec<String>,
    #[serde(default)]
    pub escalation_policy: String,
    #[serde(default)]
    pub persona_safety_note: String,
}

const fn default_intensity_ceiling() -> f64 {
    DEFAULT_INTENSITY_CEILING
}

impl Default for SafetySpec {
    fn default() -> Self {
        Self {
            intensity_ceiling: DEFAULT_INTENSITY_CEILING,
            forbidden_simulation_content: Vec::new(),
            escalation_policy: String::new(),
            persona_safety_note: String::new(),
        }
    }
}
