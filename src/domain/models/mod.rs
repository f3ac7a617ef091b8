pub mod config;
pub mod message;
pub mod monitor;
pub mod prompt;
pub mod rollout;
pub mod settings;
pub mod transcript;

pub use config::{
    AdversaryKind, AdversarySpec, AntiCapitulationRedirect, AntiCapitulationSpec, BoundsSpec,
    CurveSpec, DimensionSpec, EndCondition, EndConditionKind, EvaluationSpec, IdentitySpec,
    InjectionSpec, InteractionSpec, LevelSpec, LoomConfig, PersonaSpec, PhaseSpec,
    RepetitionDetectionSpec, ResistanceLevel, ResponseLengthSpec, RevelationSpec,
    RevelationVariants, SafetySpec, SimilarityAggregate, StagnationDetectionSpec,
    StructuralPattern, TrajectoryMode, TrajectorySpec, DEFAULT_INTENSITY_CEILING, SCHEMA_VERSION,
    SUPPORTED_SCHEMA_VERSIONS,
};
pub use message::{Message, SpeakerRole};
pub use monitor::{MonitorAction, MonitorEvent, MonitorResult, TriggerReason};
pub use prompt::{InjectionMode, PromptBlocks, Scaffolding, TEMPLATE_VERSION};
pub use rollout::{
    derive_seed, CallPurpose, CounterpartSelector, RolloutContext, RolloutState, RunRequest,
};
pub use settings::{
    AnthropicProviderConfig, ExecutionConfig, LoggingConfig, OpenAiProviderConfig,
    ProvidersConfig, RateLimitConfig, RetryConfig, Settings,
};
pub use transcript::{RolloutStatus, RunMetadata, Transcript, TurnRecord};
