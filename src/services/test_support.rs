//! Shared fixtures for unit tests.

use crate::domain::models::LoomConfig;

pub fn sample_config() -> LoomConfig {
    serde_yaml::from_str(include_str!("../../tests/fixtures/persona.yaml"))
        .expect("fixture persona should parse")
}
