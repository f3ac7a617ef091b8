//! Loom - runtime scaffolding for long-horizon persona simulation
//!
//! Loom drives multi-turn conversations between a persona model and a target
//! model, steering the persona along a configured trajectory of intensities
//! and phases, and recording every turn to a transcript.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): Curves, phases, injection, prompt assembly,
//!   monitors, the per-rollout orchestrator and the multi-rollout runner
//! - **Infrastructure Layer** (`infrastructure`): Config loading, logging, model
//!   service clients and transcript storage
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use loom::infrastructure::config::PersonaLoader;
//! use loom::infrastructure::model_services::MockModelService;
//! use loom::{RolloutRunner, RolloutServices, RunRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(PersonaLoader::load("configs/grief_arc.yaml")?);
//!     let services = RolloutServices {
//!         persona: Arc::new(MockModelService::new("mock/persona")),
//!         counterpart: Arc::new(MockModelService::new("mock/target")),
//!     };
//!     let report = RolloutRunner::new(services, 4)
//!         .run(&RunRequest::from_config(config, 4, 42), &CancellationToken::new())
//!         .await;
//!     println!("{} rollouts complete", report.completed());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{RolloutError, RolloutFailure, ServiceError};
pub use domain::models::{
    CounterpartSelector, LoomConfig, RolloutStatus, RunRequest, Settings, Transcript,
};
pub use domain::ports::{GenerationRequest, ModelService};
pub use infrastructure::config::{ConfigError, ConfigValidator, PersonaLoader, SettingsLoader};
pub use services::{RolloutOrchestrator, RolloutRunner, RolloutServices, RunReport, Scaffolder};
