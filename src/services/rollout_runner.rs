//! Runs many independent rollouts of one config in parallel.
//!
//! Every rollout gets its own orchestrator, transcript and derived seed, and a
//! child cancellation token so that stopping one never touches the others.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::rollout_orchestrator::{RolloutOrchestrator, RolloutServices};
use crate::domain::errors::{RolloutError, RolloutFailure};
use crate::domain::models::{RolloutStatus, RunRequest, Transcript};

/// Result of one rollout: a finished transcript, or a failure carrying the
/// partial one.
pub type RolloutOutcome = Result<Transcript, RolloutFailure>;

/// Progress notifications emitted while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    RolloutStarted { index: u32 },
    RolloutFinished {
        index: u32,
        status: RolloutStatus,
        turns: usize,
    },
}

/// Every rollout outcome of a run, in rollout-index order.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcomes: Vec<RolloutOutcome>,
}

impl RunReport {
    /// Transcripts of all rollouts, partial ones included.
    pub fn transcripts(&self) -> impl Iterator<Item = &Transcript> {
        self.outcomes.iter().map(|outcome| match outcome {
            Ok(transcript) => transcript,
            Err(failure) => failure.transcript.as_ref(),
        })
    }

    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Err(f) if matches!(f.error, RolloutError::Cancelled { .. })))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed() - self.cancelled()
    }
}

struct RolloutTask {
    index: u32,
    token: CancellationToken,
    /// Metadata-only transcript, used if the task dies without reporting.
    fallback: Transcript,
    handle: JoinHandle<RolloutOutcome>,
}

/// Handle to a run whose rollouts are already spawned.
pub struct RunHandle {
    run_id: Uuid,
    tasks: Vec<RolloutTask>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Cancel a single rollout. Returns false for an unknown index.
    pub fn cancel_rollout(&self, index: u32) -> bool {
        match self.tasks.iter().find(|task| task.index == index) {
            Some(task) => {
                task.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Wait for every rollout and collect outcomes in index order.
    pub async fn join(self) -> RunReport {
        let (tasks, handles): (Vec<_>, Vec<_>) = self
            .tasks
            .into_iter()
            .map(|task| ((task.index, task.fallback), task.handle))
            .unzip();

        let outcomes = join_all(handles)
            .await
            .into_iter()
            .zip(tasks)
            .map(|(joined, (index, fallback))| match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(rollout = index, error = %err, "Rollout task aborted");
                    let mut transcript = fallback;
                    transcript.finish(RolloutStatus::Failed {
                        reason: err.to_string(),
                    });
                    Err(RolloutFailure {
                        error: RolloutError::TaskAborted(err.to_string()),
                        transcript: Box::new(transcript),
                    })
                }
            })
            .collect();

        RunReport {
            run_id: self.run_id,
            outcomes,
        }
    }
}

/// Spawns and collects the rollouts of a run request.
pub struct RolloutRunner {
    services: RolloutServices,
    max_parallel_rollouts: usize,
    events: Option<mpsc::UnboundedSender<RunnerEvent>>,
}

impl RolloutRunner {
    pub fn new(services: RolloutServices, max_parallel_rollouts: usize) -> Self {
        Self {
            services,
            max_parallel_rollouts: max_parallel_rollouts.max(1),
            events: None,
        }
    }

    /// Report progress on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<RunnerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run every rollout to completion.
    pub async fn run(&self, request: &RunRequest, cancel: &CancellationToken) -> RunReport {
        self.spawn(request, cancel).join().await
    }

    /// Spawn one task per rollout without waiting for them.
    ///
    /// At most `max_parallel_rollouts` run at once; the rest wait for a permit
    /// (or for cancellation, which finishes them immediately).
    pub fn spawn(&self, request: &RunRequest, cancel: &CancellationToken) -> RunHandle {
        let run_id = Uuid::new_v4();
        let semaphore = Arc::new(Semaphore::new(self.max_parallel_rollouts));

        tracing::info!(
            %run_id,
            rollouts = request.rollout_count,
            turns = request.expected_turns,
            seed = request.seed,
            counterpart = %request.counterpart,
            "Starting run"
        );

        let tasks = (0..request.rollout_count)
            .map(|index| {
                let token = cancel.child_token();
                let orchestrator =
                    RolloutOrchestrator::new(request, index, run_id, self.services.clone());
                let fallback = orchestrator.transcript().clone();

                let semaphore = Arc::clone(&semaphore);
                let events = self.events.clone();
                let task_token = token.clone();
                let handle = tokio::spawn(async move {
                    let _permit = tokio::select! {
                        biased;
                        () = task_token.cancelled() => None,
                        permit = semaphore.acquire_owned() => permit.ok(),
                    };

                    notify(events.as_ref(), RunnerEvent::RolloutStarted { index });
                    let outcome = orchestrator.run(task_token).await;

                    let transcript = match &outcome {
                        Ok(transcript) => transcript,
                        Err(failure) => failure.transcript.as_ref(),
                    };
                    notify(
                        events.as_ref(),
                        RunnerEvent::RolloutFinished {
                            index,
                            status: transcript.metadata.status.clone(),
                            turns: transcript.turn_count(),
                        },
                    );
                    outcome
                });

                RolloutTask {
                    index,
                    token,
                    fallback,
                    handle,
                }
            })
            .collect();

        RunHandle { run_id, tasks }
    }
}

fn notify(events: Option<&mpsc::UnboundedSender<RunnerEvent>>, event: RunnerEvent) {
    if let Some(tx) = events {
        // Receiver gone means nobody is watching progress.
        let _ = tx.send(event);
    }
}
