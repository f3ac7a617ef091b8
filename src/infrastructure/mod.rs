//! Infrastructure layer module
//!
//! Adapters behind the domain ports and everything touching the outside world:
//! - Configuration loading and validation (figment, serde_yaml)
//! - Logging (tracing-subscriber, tracing-appender)
//! - Model service clients (reqwest) and the resilience decorator
//! - Transcript persistence

pub mod config;
pub mod logging;
pub mod model_services;
pub mod transcript_store;

pub use transcript_store::TranscriptStore;
