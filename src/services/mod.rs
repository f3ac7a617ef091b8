pub mod curve;
pub mod injection;
pub mod monitors;
pub mod phase_tracker;
pub mod prompt_assembler;
pub mod rollout_orchestrator;
pub mod rollout_runner;
pub mod scaffolder;
pub mod templates;

#[cfg(test)]
pub(crate) mod test_support;

pub use injection::InjectionScheduler;
pub use monitors::build_monitors;
pub use phase_tracker::{ActivePhase, PhaseTracker, Severity};
pub use prompt_assembler::PromptAssembler;
pub use rollout_orchestrator::{RolloutOrchestrator, RolloutServices};
pub use rollout_runner::{RolloutOutcome, RolloutRunner, RunHandle, RunReport, RunnerEvent};
pub use scaffolder::{PendingRevelation, Scaffolder, TurnPlan};
