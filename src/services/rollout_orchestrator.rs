//! Rollout orchestrator: the turn-by-turn control loop for one rollout.
//!
//! Each turn resolves the prescribed state, assembles instructions, calls the
//! persona, runs the monitor chain (regenerating on request, bounded by
//! `max_retries`), stages interventions for the next turn, calls the
//! counterpart and appends a [`TurnRecord`]. Service failures and
//! cancellation stop the loop but keep the transcript built so far.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::monitors::build_monitors;
use super::scaffolder::{Scaffolder, TurnPlan};
use super::templates;
use crate::domain::errors::{RolloutError, RolloutFailure, RolloutResult};
use crate::domain::models::{
    CallPurpose, CounterpartSelector, InjectionMode, LoomConfig, Message, MonitorAction,
    MonitorEvent, MonitorResult, PromptBlocks, RolloutContext, RolloutState, RolloutStatus,
    RunMetadata, RunRequest, Scaffolding, SpeakerRole, Transcript, TriggerReason, TurnRecord,
    TEMPLATE_VERSION,
};
use crate::domain::ports::{GenerationRequest, ModelService, Monitor, MonitorContext};

/// The model services one rollout talks to.
#[derive(Clone)]
pub struct RolloutServices {
    pub persona: Arc<dyn ModelService>,
    pub counterpart: Arc<dyn ModelService>,
}

/// A turn that stopped early, with whatever part of it completed.
struct TurnFailure {
    error: RolloutError,
    partial: Option<TurnRecord>,
}

impl From<RolloutError> for TurnFailure {
    fn from(error: RolloutError) -> Self {
        Self { error, partial: None }
    }
}

/// Drives one rollout from turn 0 to `expected_turns`.
pub struct RolloutOrchestrator {
    config: Arc<LoomConfig>,
    expected_turns: u32,
    context: RolloutContext,
    counterpart_role: SpeakerRole,
    counterpart_prompt: String,
    services: RolloutServices,
    state: RolloutState,
    history: Vec<Message>,
    transcript: Transcript,
    /// Topics the persona has been shown, in context or by an intervention.
    surfaced_revelations: BTreeSet<String>,
    /// Topics delivered by an intervention; no longer rendered in context.
    exhausted_revelations: BTreeSet<String>,
    pending_intervention: Option<String>,
    /// Last full blocks, built without any intervention.
    last_full: Option<PromptBlocks>,
    /// System instructions currently in force.
    instructions: String,
}

impl RolloutOrchestrator {
    pub fn new(request: &RunRequest, rollout_index: u32, run_id: Uuid, services: RolloutServices) -> Self {
        let config = Arc::clone(&request.config);
        let context = RolloutContext::new(request.seed, rollout_index);

        let (counterpart_role, counterpart_prompt) = match request.counterpart {
            CounterpartSelector::Interlocutor => (
                SpeakerRole::Interlocutor,
                config.interaction.interlocutor_prompt.clone(),
            ),
            CounterpartSelector::Adversary(kind) => (
                SpeakerRole::Adversary,
                templates::adversary_prompt(kind)
                    .map_or_else(|| config.interaction.interlocutor_prompt.clone(), str::to_string),
            ),
        };

        let metadata = RunMetadata {
            run_id,
            rollout_index,
            base_seed: request.seed,
            seed: context.seed,
            config_fingerprint: config.fingerprint(),
            template_version: TEMPLATE_VERSION.to_string(),
            schema_version: config.schema_version.clone(),
            persona_name: config.persona_name().to_string(),
            persona_model: services.persona.name().to_string(),
            counterpart_model: services.counterpart.name().to_string(),
            counterpart: request.counterpart,
            expected_turns: request.expected_turns,
            start_time: Utc::now(),
            finish_time: None,
            status: RolloutStatus::Running,
        };

        Self {
            config,
            expected_turns: request.expected_turns,
            context,
            counterpart_role,
            counterpart_prompt,
            services,
            state: RolloutState::Prompting,
            history: Vec::new(),
            transcript: Transcript::new(metadata),
            surfaced_revelations: BTreeSet::new(),
            exhausted_revelations: BTreeSet::new(),
            pending_intervention: None,
            last_full: None,
            instructions: String::new(),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Run to completion, failure or cancellation.
    pub async fn run(self, cancel: CancellationToken) -> Result<Transcript, RolloutFailure> {
        let span = tracing::info_span!(
            "rollout",
            index = self.context.rollout_index,
            seed = self.context.seed
        );
        self.run_inner(cancel).instrument(span).await
    }

    async fn run_inner(mut self, cancel: CancellationToken) -> Result<Transcript, RolloutFailure> {
        let config = Arc::clone(&self.config);
        let scaffolder = match Scaffolder::new(&config, self.expected_turns) {
            Ok(scaffolder) => scaffolder,
            Err(error) => return Err(self.stop(error)),
        };
        let mut monitors = match build_monitors(&config) {
            Ok(monitors) => monitors,
            Err(error) => return Err(self.stop(error)),
        };

        tracing::info!(
            turns = self.expected_turns,
            persona = %self.services.persona.name(),
            counterpart = %self.services.counterpart.name(),
            "Rollout started"
        );

        for turn in 0..self.expected_turns {
            if cancel.is_cancelled() {
                return Err(self.stop(RolloutError::Cancelled { turn }));
            }
            if turn > 0 {
                self.transition(RolloutState::Prompting);
            }

            match self.run_turn(&scaffolder, &mut monitors, turn, &cancel).await {
                Ok(record) => {
                    tracing::info!(
                        turn,
                        phase = %record.phase_name,
                        mode = %record.injection_mode,
                        regenerations = record.regeneration_count,
                        "Turn complete"
                    );
                    self.transcript.push_turn(record);
                    self.transition(RolloutState::Advance);
                }
                Err(TurnFailure { error, partial }) => {
                    if let Some(record) = partial {
                        self.transcript.push_turn(record);
                    }
                    return Err(self.stop(error));
                }
            }
        }

        self.transition(RolloutState::Complete);
        self.transcript.finish(RolloutStatus::Complete);
        tracing::info!(turns = self.transcript.turn_count(), "Rollout complete");
        Ok(self.transcript)
    }

    async fn run_turn(
        &mut self,
        scaffolder: &Scaffolder<'_>,
        monitors: &mut [Box<dyn Monitor>],
        turn: u32,
        cancel: &CancellationToken,
    ) -> Result<TurnRecord, TurnFailure> {
        let plan = scaffolder.plan(turn)?;
        let intervention = self.pending_intervention.take();
        let (instructions, sent_mode) = self.instructions_for(scaffolder, &plan, intervention.as_deref())?;
        self.instructions = instructions;

        let next_revelation = scaffolder.next_unused_revelation(&plan, &self.surfaced_revelations);
        let max_retries = self.config.interaction.repetition_detection.max_retries;

        let mut events = Vec::new();
        let mut attempt = 0u32;
        let mut variation: Option<String> = None;

        let persona_text = loop {
            self.transition(RolloutState::PersonaCall);
            let request = GenerationRequest {
                speaker: SpeakerRole::Persona,
                history: self.persona_history(turn, variation.as_deref()),
                system_instructions: self.instructions.clone(),
                seed: self.context.call_seed(turn, CallPurpose::Persona, attempt),
            };
            let text = generate(self.services.persona.as_ref(), request, turn, cancel).await?;

            self.transition(RolloutState::Monitoring);
            let ctx = MonitorContext {
                turn_index: turn,
                candidate: &text,
                persona_name: self.config.persona_name(),
                next_revelation: next_revelation.map(|rev| rev.text),
            };
            let results: Vec<(&'static str, MonitorResult)> = monitors
                .iter_mut()
                .map(|monitor| (monitor.name(), monitor.check(&ctx)))
                .collect();

            if let Some((name, result)) = results
                .iter()
                .find(|(_, result)| result.action == MonitorAction::Regenerate)
            {
                if attempt < max_retries {
                    tracing::warn!(
                        turn,
                        attempt,
                        monitor = name,
                        reason = ?result.reason,
                        "Regenerating persona message"
                    );
                    events.extend(MonitorEvent::from_result(turn, name, attempt, result));
                    variation = result.intervention_text.clone();
                    attempt += 1;
                    self.transition(RolloutState::Regenerating);
                    continue;
                }

                tracing::warn!(turn, attempt, monitor = name, "Regeneration retries exhausted, accepting output");
                events.push(MonitorEvent {
                    turn_index: turn,
                    monitor_name: (*name).to_string(),
                    action: MonitorAction::None,
                    reason: TriggerReason::RetriesExhausted,
                    detail: result.detail.clone(),
                    attempt,
                });
            }

            for (name, result) in results.iter().filter(|(_, r)| r.action == MonitorAction::Inject) {
                tracing::warn!(
                    turn,
                    monitor = name,
                    reason = ?result.reason,
                    detail = ?result.detail,
                    "Monitor staged an intervention"
                );
                events.extend(MonitorEvent::from_result(turn, name, attempt, result));
                if self.pending_intervention.is_none() {
                    self.stage_intervention(result, next_revelation.map(|rev| (rev.spec.topic.as_str(), rev.text)));
                }
            }

            break text;
        };

        let persona_message = Message::persona(persona_text.clone(), turn);
        self.accept(monitors, persona_message);

        let mut record = TurnRecord {
            turn_index: turn,
            position: plan.position,
            phase_name: plan.phase.clone(),
            prescribed_intensities: plan.intensities.clone(),
            scheduled_mode: plan.injection_mode,
            injection_mode: sent_mode,
            intervention_applied: intervention,
            persona_message: persona_text,
            counterpart_message: None,
            monitor_events: events,
            regeneration_count: attempt,
        };

        self.transition(RolloutState::CounterpartCall);
        let request = GenerationRequest {
            speaker: self.counterpart_role,
            history: self.history.clone(),
            system_instructions: self.counterpart_prompt.clone(),
            seed: self.context.call_seed(turn, CallPurpose::Counterpart, 0),
        };
        match generate(self.services.counterpart.as_ref(), request, turn, cancel).await {
            Ok(reply) => {
                self.accept(monitors, Message::new(self.counterpart_role, reply.clone(), turn));
                record.counterpart_message = Some(reply);
                Ok(record)
            }
            Err(error) => Err(TurnFailure {
                error,
                partial: Some(record),
            }),
        }
    }

    /// Instructions in force for this turn, and the mode they were sent in.
    ///
    /// A pending intervention forces a full rebuild whatever the schedule
    /// says. Reminders ride on top of the last full blocks; `None` turns keep
    /// the previous instructions.
    fn instructions_for(
        &mut self,
        scaffolder: &Scaffolder<'_>,
        plan: &TurnPlan,
        intervention: Option<&str>,
    ) -> RolloutResult<(String, InjectionMode)> {
        if let Some(text) = intervention {
            let base = self.full_blocks(scaffolder, plan)?;
            self.last_full = Some(base);
            return match scaffolder.assemble_as(plan, InjectionMode::Full, &self.exhausted_revelations, Some(text))? {
                Some(Scaffolding::Full { blocks }) => Ok((blocks.render(), InjectionMode::Full)),
                _ => Err(precondition("full assembly produced no blocks")),
            };
        }

        match plan.injection_mode {
            InjectionMode::Full => {
                let blocks = self.full_blocks(scaffolder, plan)?;
                let rendered = blocks.render();
                self.last_full = Some(blocks);
                Ok((rendered, InjectionMode::Full))
            }
            InjectionMode::Reminder => {
                let base = match self.last_full.take() {
                    Some(blocks) => blocks,
                    None => self.full_blocks(scaffolder, plan)?,
                };
                let reminder = match scaffolder.assemble(plan, &self.exhausted_revelations, None)? {
                    Some(Scaffolding::Reminder { text }) => text,
                    _ => return Err(precondition("reminder assembly produced no text")),
                };
                let rendered = format!("{}\n\n{reminder}", base.render());
                self.last_full = Some(base);
                Ok((rendered, InjectionMode::Reminder))
            }
            InjectionMode::None if self.instructions.is_empty() => {
                let blocks = self.full_blocks(scaffolder, plan)?;
                let rendered = blocks.render();
                self.last_full = Some(blocks);
                Ok((rendered, InjectionMode::Full))
            }
            InjectionMode::None => Ok((self.instructions.clone(), InjectionMode::None)),
        }
    }

    /// Full blocks without intervention; their context topics count as surfaced.
    fn full_blocks(&mut self, scaffolder: &Scaffolder<'_>, plan: &TurnPlan) -> RolloutResult<PromptBlocks> {
        let blocks = match scaffolder.assemble_as(plan, InjectionMode::Full, &self.exhausted_revelations, None)? {
            Some(Scaffolding::Full { blocks }) => blocks,
            _ => return Err(precondition("full assembly produced no blocks")),
        };
        self.surfaced_revelations
            .extend(scaffolder.context_topics(plan, &self.exhausted_revelations)?);
        Ok(blocks)
    }

    /// Persona-side history, opened by the configured greeting and followed
    /// by any variation instruction for a regeneration.
    fn persona_history(&self, turn: u32, variation: Option<&str>) -> Vec<Message> {
        let mut history = Vec::with_capacity(self.history.len() + 2);
        history.push(Message::new(
            self.counterpart_role,
            self.config.interaction.opening_message.clone(),
            0,
        ));
        history.extend(self.history.iter().cloned());
        if let Some(text) = variation {
            history.push(Message::new(SpeakerRole::System, text, turn));
        }
        history
    }

    fn stage_intervention(&mut self, result: &MonitorResult, revelation: Option<(&str, &str)>) {
        let Some(text) = result.intervention_text.clone() else {
            return;
        };
        if let Some((topic, revelation_text)) = revelation {
            if text.contains(revelation_text) {
                self.surfaced_revelations.insert(topic.to_string());
                self.exhausted_revelations.insert(topic.to_string());
            }
        }
        self.pending_intervention = Some(text);
    }

    fn accept(&mut self, monitors: &mut [Box<dyn Monitor>], message: Message) {
        for monitor in monitors.iter_mut() {
            monitor.observe(&message);
        }
        self.history.push(message);
    }

    fn transition(&mut self, next: RolloutState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid rollout transition {} -> {}",
            self.state.as_str(),
            next.as_str()
        );
        tracing::debug!(from = self.state.as_str(), to = next.as_str(), "Rollout state transition");
        self.state = next;
    }

    /// Finish the transcript for an early stop and wrap it with the error.
    fn stop(mut self, error: RolloutError) -> RolloutFailure {
        match &error {
            RolloutError::Cancelled { turn } => {
                tracing::warn!(turn, "Rollout cancelled");
                self.transition(RolloutState::Cancelled);
                self.transcript.finish(RolloutStatus::Cancelled);
            }
            other => {
                tracing::error!(error = %other, "Rollout failed");
                self.transition(RolloutState::Failed);
                self.transcript.finish(RolloutStatus::Failed {
                    reason: other.to_string(),
                });
            }
        }
        RolloutFailure {
            error,
            transcript: Box::new(self.transcript),
        }
    }
}

fn precondition(message: &str) -> RolloutError {
    RolloutError::ConfigPrecondition(message.to_string())
}

/// One outbound call, abandoned as soon as the rollout is cancelled.
async fn generate(
    service: &dyn ModelService,
    request: GenerationRequest,
    turn: u32,
    cancel: &CancellationToken,
) -> RolloutResult<String> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RolloutError::Cancelled { turn }),
        result = service.generate(request) => {
            result.map_err(|err| RolloutError::from_service(service.name(), err))
        }
    }
}
