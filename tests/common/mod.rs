//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use loom::domain::models::{LoomConfig, RunRequest};
use loom::infrastructure::config::PersonaLoader;
use loom::infrastructure::model_services::MockModelService;
use loom::services::RolloutServices;

/// Path of the shared persona fixture.
pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/persona.yaml")
}

/// The persona fixture, loaded and validated.
pub fn fixture_config() -> Arc<LoomConfig> {
    Arc::new(PersonaLoader::load(fixture_path()).expect("fixture persona should load"))
}

/// Run request over the fixture with overridden turns and rollout count.
pub fn request(turns: u32, rollouts: u32, seed: u64) -> RunRequest {
    let mut request = RunRequest::from_config(fixture_config(), rollouts, seed);
    request.expected_turns = turns;
    request
}

/// Fresh default mocks for both sides of the conversation.
pub fn mock_services() -> RolloutServices {
    RolloutServices {
        persona: Arc::new(MockModelService::new("mock/persona")),
        counterpart: Arc::new(MockModelService::new("mock/target")),
    }
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
