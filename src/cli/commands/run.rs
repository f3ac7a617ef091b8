//! `loom run` - execute rollouts and write their transcripts.

use anyhow::{bail, Context, Result};
use clap::Args;
use console::style;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cli::output::{create_rollout_bar, output, CommandOutput, ProgressBarExt, TableFormatter};
use crate::domain::models::{
    AdversaryKind, CounterpartSelector, LoomConfig, RolloutStatus, RunRequest, Settings, Transcript,
};
use crate::infrastructure::config::PersonaLoader;
use crate::infrastructure::model_services::ServiceRegistry;
use crate::infrastructure::TranscriptStore;
use crate::services::{RolloutRunner, RolloutServices, RunnerEvent};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the persona YAML config
    pub config: PathBuf,

    /// Model playing the persona (provider/model, e.g. anthropic/claude-sonnet-4-5)
    #[arg(long)]
    pub persona_model: String,

    /// Model under evaluation, answering as the interlocutor
    #[arg(long)]
    pub target: String,

    /// Override the config's expected_turns
    #[arg(short, long)]
    pub turns: Option<u32>,

    /// Number of independent rollouts
    #[arg(short, long, default_value_t = 1)]
    pub rollouts: u32,

    /// Adversary type: none, contradiction, helpfulness or both
    #[arg(long)]
    pub adversary: Option<AdversaryKind>,

    /// Model playing the adversary (defaults to the config's adversary model, then the target)
    #[arg(long)]
    pub adversary_model: Option<String>,

    /// Base seed; every rollout derives its own seed from it
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output directory for transcripts
    #[arg(short, long)]
    pub output: PathBuf,
}

impl RunArgs {
    /// Resolve the run request, applying command-line overrides to the config.
    pub fn request(&self, config: Arc<LoomConfig>) -> Result<RunRequest> {
        if self.rollouts == 0 {
            bail!("--rollouts must be at least 1");
        }
        let mut request = RunRequest::from_config(config, self.rollouts, self.seed.unwrap_or(0));
        if let Some(turns) = self.turns {
            if turns == 0 {
                bail!("--turns must be at least 1");
            }
            request.expected_turns = turns;
        }
        if let Some(kind) = self.adversary {
            request.counterpart = CounterpartSelector::from_adversary(kind);
        }
        Ok(request)
    }

    /// Model answering the persona for this request.
    pub fn counterpart_model(&self, request: &RunRequest) -> String {
        match request.counterpart {
            CounterpartSelector::Interlocutor => self.target.clone(),
            CounterpartSelector::Adversary(_) => self
                .adversary_model
                .clone()
                .or_else(|| request.config.evaluation.adversary.model.clone())
                .unwrap_or_else(|| self.target.clone()),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RolloutSummary {
    pub index: u32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub turns: usize,
    pub regenerations: u32,
    pub monitor_events: usize,
    pub seed: u64,
    pub path: Option<String>,
}

impl RolloutSummary {
    pub fn from_transcript(transcript: &Transcript, path: Option<String>) -> Self {
        let reason = match &transcript.metadata.status {
            RolloutStatus::Failed { reason } => Some(reason.clone()),
            _ => None,
        };
        Self {
            index: transcript.metadata.rollout_index,
            status: transcript.metadata.status.as_str().to_string(),
            reason,
            turns: transcript.turn_count(),
            regenerations: transcript.turns.iter().map(|t| t.regeneration_count).sum(),
            monitor_events: transcript.monitor_events.len(),
            seed: transcript.metadata.seed,
            path,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub persona: String,
    pub persona_model: String,
    pub counterpart_model: String,
    pub counterpart: String,
    pub output_dir: String,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub rollouts: Vec<RolloutSummary>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let headline = format!(
            "Run {}: {} complete, {} failed, {} cancelled",
            self.run_id, self.completed, self.failed, self.cancelled
        );
        let headline = if self.failed > 0 {
            style(headline).red().to_string()
        } else if self.cancelled > 0 {
            style(headline).yellow().to_string()
        } else {
            style(headline).green().to_string()
        };

        [
            headline,
            format!(
                "{} ({}) vs {} as {}",
                self.persona, self.persona_model, self.counterpart_model, self.counterpart
            ),
            TableFormatter::new().format_rollouts(&self.rollouts),
            format!("Transcripts saved to {}", self.output_dir),
        ]
        .join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

async fn track_progress(mut events: mpsc::UnboundedReceiver<RunnerEvent>, bar: ProgressBar) {
    while let Some(event) = events.recv().await {
        match event {
            RunnerEvent::RolloutStarted { index } => {
                bar.set_message(format!("rollout {index:03} started"));
            }
            RunnerEvent::RolloutFinished { index, status, turns } => {
                bar.inc(1);
                bar.note(format!("  rollout {index:03}: {} after {turns} turns", status.as_str()));
            }
        }
    }
}

pub async fn execute(args: RunArgs, settings: &Settings, json_mode: bool) -> Result<()> {
    let config = Arc::new(PersonaLoader::load(&args.config)?);
    let request = args.request(Arc::clone(&config))?;
    let counterpart_model = args.counterpart_model(&request);

    let registry = ServiceRegistry::new(settings.clone());
    let services = RolloutServices {
        persona: registry
            .create(&args.persona_model)
            .with_context(|| format!("Failed to create persona model '{}'", args.persona_model))?,
        counterpart: registry
            .create(&counterpart_model)
            .with_context(|| format!("Failed to create counterpart model '{counterpart_model}'"))?,
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let runner = RolloutRunner::new(services, settings.execution.max_parallel_rollouts).with_events(tx);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling rollouts");
                cancel.cancel();
            }
        })
    };

    let bar = create_rollout_bar(u64::from(request.rollout_count), json_mode);
    let progress = tokio::spawn(track_progress(rx, bar.clone()));

    let report = runner.run(&request, &cancel).await;
    drop(runner);
    interrupt.abort();
    if let Err(err) = progress.await {
        tracing::debug!(error = %err, "progress task ended abnormally");
    }

    let store = TranscriptStore::new(&args.output);
    let mut rollouts = Vec::with_capacity(report.outcomes.len());
    for transcript in report.transcripts() {
        let path = store.write(transcript).await.with_context(|| {
            format!(
                "Failed to write transcript for rollout {}",
                transcript.metadata.rollout_index
            )
        })?;
        rollouts.push(RolloutSummary::from_transcript(
            transcript,
            Some(path.display().to_string()),
        ));
    }

    let result = RunOutput {
        run_id: report.run_id,
        persona: config.persona_name().to_string(),
        persona_model: args.persona_model.clone(),
        counterpart_model,
        counterpart: request.counterpart.to_string(),
        output_dir: args.output.display().to_string(),
        completed: report.completed(),
        failed: report.failed(),
        cancelled: report.cancelled(),
        rollouts,
    };

    if result.completed == result.rollouts.len() {
        bar.finish_success("all rollouts complete");
    } else {
        bar.finish_warning(format!("{} of {} rollouts complete", result.completed, result.rollouts.len()));
    }
    output(&result, json_mode);

    if result.completed == 0 && result.failed > 0 {
        bail!("No rollout completed; partial transcripts were saved to {}", result.output_dir);
    }
    Ok(())
}
