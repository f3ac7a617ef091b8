//! Per-turn planning and scaffolding without any service calls.
//!
//! Combines curve interpolation, phase tracking, injection scheduling and
//! prompt assembly. Used by the orchestrator and by `loom dry-run`.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::curve;
use super::injection::InjectionScheduler;
use super::phase_tracker::{select_variant, ActivePhase, PhaseTracker, Severity};
use super::prompt_assembler::{AssemblyInput, PromptAssembler};
use crate::domain::errors::{RolloutError, RolloutResult};
use crate::domain::models::{InjectionMode, LoomConfig, RevelationSpec, Scaffolding};

/// The prescribed state of one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnPlan {
    pub turn: u32,
    pub position: f64,
    pub phase_index: usize,
    pub phase: String,
    pub intensities: BTreeMap<String, f64>,
    pub injection_mode: InjectionMode,
}

/// An unused revelation chosen for an intervention.
#[derive(Debug, Clone, Copy)]
pub struct PendingRevelation<'a> {
    pub spec: &'a RevelationSpec,
    pub text: &'a str,
}

#[derive(Debug, Clone)]
pub struct Scaffolder<'a> {
    config: &'a LoomConfig,
    expected_turns: u32,
    tracker: PhaseTracker<'a>,
    scheduler: InjectionScheduler,
    assembler: PromptAssembler<'a>,
}

impl<'a> Scaffolder<'a> {
    /// Build a scaffolder, re-checking phase coverage and curve parameters.
    pub fn new(config: &'a LoomConfig, expected_turns: u32) -> RolloutResult<Self> {
        if expected_turns == 0 {
            return Err(RolloutError::ConfigPrecondition(
                "expected_turns must be positive".to_string(),
            ));
        }
        if config.trajectory.dimensions.is_empty() {
            return Err(RolloutError::ConfigPrecondition(
                "trajectory defines no dimensions".to_string(),
            ));
        }
        let tracker = PhaseTracker::new(&config.trajectory, expected_turns)?;
        for dimension in config.trajectory.dimensions.values() {
            curve::check_parameters(dimension)?;
        }

        Ok(Self {
            config,
            expected_turns,
            tracker,
            scheduler: InjectionScheduler::new(&config.interaction.injection),
            assembler: PromptAssembler::new(config),
        })
    }

    /// Trajectory position of `turn`, capped at 1.0.
    pub fn position(&self, turn: u32) -> f64 {
        (f64::from(turn) / f64::from(self.expected_turns)).min(1.0)
    }

    /// Resolve phase, intensities and injection mode for `turn`.
    pub fn plan(&self, turn: u32) -> RolloutResult<TurnPlan> {
        let position = self.position(turn);
        let active = self.tracker.resolve(position)?;
        let ceiling = self.config.safety.intensity_ceiling;

        let mut intensities = BTreeMap::new();
        for (name, dimension) in &self.config.trajectory.dimensions {
            intensities.insert(name.clone(), curve::interpolate(dimension, position, ceiling)?);
        }

        Ok(TurnPlan {
            turn,
            position,
            phase_index: active.index,
            phase: active.name().to_string(),
            intensities,
            injection_mode: self.scheduler.mode_for(turn),
        })
    }

    /// Phase details for a plan.
    pub fn active_phase(&self, plan: &TurnPlan) -> RolloutResult<ActivePhase<'a>> {
        Ok(self.tracker.resolve(plan.position)?)
    }

    /// Scaffolding in the plan's own injection mode.
    pub fn assemble(
        &self,
        plan: &TurnPlan,
        exhausted: &BTreeSet<String>,
        intervention: Option<&str>,
    ) -> RolloutResult<Option<Scaffolding>> {
        self.assemble_as(plan, plan.injection_mode, exhausted, intervention)
    }

    /// Scaffolding in an explicit mode.
    pub fn assemble_as(
        &self,
        plan: &TurnPlan,
        mode: InjectionMode,
        exhausted: &BTreeSet<String>,
        intervention: Option<&str>,
    ) -> RolloutResult<Option<Scaffolding>> {
        let active = self.active_phase(plan)?;
        let input = AssemblyInput {
            turn: plan.turn,
            phase: &active,
            intensities: &plan.intensities,
            exhausted_revelations: exhausted,
            intervention,
        };
        Ok(self.assembler.assemble(mode, &input))
    }

    /// Topics a full context block for `plan` puts in front of the persona.
    pub fn context_topics(
        &self,
        plan: &TurnPlan,
        exhausted: &BTreeSet<String>,
    ) -> RolloutResult<Vec<String>> {
        let active = self.active_phase(plan)?;
        let input = AssemblyInput {
            turn: plan.turn,
            phase: &active,
            intensities: &plan.intensities,
            exhausted_revelations: exhausted,
            intervention: None,
        };
        Ok(self
            .assembler
            .context_revelations(&input)
            .into_iter()
            .map(|(topic, _)| topic.to_string())
            .collect())
    }

    /// First revelation, in phase order, whose topic is not in `surfaced`,
    /// at the variant its driving dimension selects for this plan.
    ///
    /// Later phases are searched too, so an intervention can hand the persona
    /// material it has not been shown yet.
    pub fn next_unused_revelation(
        &self,
        plan: &TurnPlan,
        surfaced: &BTreeSet<String>,
    ) -> Option<PendingRevelation<'a>> {
        let trajectory = &self.config.trajectory;
        trajectory.phases.iter().find_map(|phase| {
            let phase_dimension = trajectory.primary_dimension_for(phase);
            phase
                .revelations
                .iter()
                .filter(|spec| !surfaced.contains(&spec.topic))
                .find_map(|spec| {
                    let dimension = spec.dimension.as_deref().or(phase_dimension);
                    let intensity = dimension
                        .and_then(|dim| plan.intensities.get(dim))
                        .copied()
                        .unwrap_or(0.0);
                    select_variant(&spec.variants, Severity::for_intensity(intensity))
                        .map(|(_, text)| PendingRevelation { spec, text })
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::sample_config;

    #[test]
    fn test_plan_is_reproducible() {
        let config = sample_config();
        let scaffolder = Scaffolder::new(&config, 10).unwrap();
        for turn in 0..10 {
            assert_eq!(scaffolder.plan(turn).unwrap(), scaffolder.plan(turn).unwrap());
        }
    }

    #[test]
    fn test_plan_phases_and_modes() {
        let config = sample_config();
        let scaffolder = Scaffolder::new(&config, 10).unwrap();

        let phases: Vec<String> = (0..10).map(|t| scaffolder.plan(t).unwrap().phase).collect();
        assert_eq!(&phases[..4], ["early", "early", "early", "early"]);
        assert_eq!(&phases[4..8], ["middle", "middle", "middle", "middle"]);
        assert_eq!(&phases[8..], ["late", "late"]);

        assert_eq!(scaffolder.plan(0).unwrap().injection_mode, InjectionMode::Full);
        assert_eq!(scaffolder.plan(2).unwrap().injection_mode, InjectionMode::Reminder);
        assert_eq!(scaffolder.plan(3).unwrap().injection_mode, InjectionMode::None);
    }

    #[test]
    fn test_intensities_respect_ceiling() {
        let mut config = sample_config();
        config.safety.intensity_ceiling = 0.5;
        let scaffolder = Scaffolder::new(&config, 10).unwrap();
        for turn in 0..10 {
            let plan = scaffolder.plan(turn).unwrap();
            assert!(plan.intensities.values().all(|v| *v <= 0.5));
        }
    }

    #[test]
    fn test_zero_turns_is_precondition_failure() {
        let config = sample_config();
        assert!(matches!(
            Scaffolder::new(&config, 0),
            Err(RolloutError::ConfigPrecondition(_))
        ));
    }

    #[test]
    fn test_coverage_gap_is_precondition_failure() {
        let mut config = sample_config();
        config.trajectory.phases.last_mut().unwrap().end_condition.value = 0.9;
        assert!(matches!(
            Scaffolder::new(&config, 10),
            Err(RolloutError::ConfigPrecondition(_))
        ));
    }

    #[test]
    fn test_next_unused_revelation_skips_surfaced() {
        let config = sample_config();
        let scaffolder = Scaffolder::new(&config, 10).unwrap();
        let plan = scaffolder.plan(5).unwrap();

        let first = scaffolder.next_unused_revelation(&plan, &BTreeSet::new()).unwrap();
        assert_eq!(first.spec.topic, "sleep");

        let surfaced: BTreeSet<String> = ["sleep".to_string()].into();
        let next = scaffolder.next_unused_revelation(&plan, &surfaced).unwrap();
        assert_eq!(next.spec.topic, "job");

        // Later phases are still candidates.
        let surfaced: BTreeSet<String> = ["sleep".to_string(), "job".to_string()].into();
        let later = scaffolder.next_unused_revelation(&plan, &surfaced).unwrap();
        assert_eq!(later.spec.topic, "friends");
        assert_eq!(later.text, "I stopped answering my friends' calls.");

        let all: BTreeSet<String> = ["sleep", "job", "friends"].map(String::from).into();
        assert!(scaffolder.next_unused_revelation(&plan, &all).is_none());
    }

    #[test]
    fn test_context_topics_skip_exhausted() {
        let config = sample_config();
        let scaffolder = Scaffolder::new(&config, 10).unwrap();

        let early = scaffolder.plan(0).unwrap();
        assert_eq!(scaffolder.context_topics(&early, &BTreeSet::new()).unwrap(), vec!["sleep"]);

        let middle = scaffolder.plan(5).unwrap();
        assert_eq!(
            scaffolder.context_topics(&middle, &BTreeSet::new()).unwrap(),
            vec!["sleep", "job"]
        );
        let exhausted: BTreeSet<String> = ["sleep".to_string()].into();
        assert_eq!(scaffolder.context_topics(&middle, &exhausted).unwrap(), vec!["job"]);
    }
}
