//! Loading persona configs from YAML.

use std::path::Path;

use super::validation::{ConfigError, ConfigValidator};
use crate::domain::models::LoomConfig;

/// Reads and validates persona config files.
pub struct PersonaLoader;

impl PersonaLoader {
    /// Read a `.yaml`/`.yml` file and return a validated config.
    pub fn load(path: impl AsRef<Path>) -> Result<LoomConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        if !matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")) {
            return Err(ConfigError::UnsupportedExtension(path.to_path_buf()));
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&raw)?;
        tracing::debug!(
            path = %path.display(),
            persona = config.persona_name(),
            fingerprint = %config.fingerprint(),
            "Loaded persona config"
        );
        Ok(config)
    }

    /// Parse and validate a config from YAML text.
    pub fn from_yaml_str(raw: &str) -> Result<LoomConfig, ConfigError> {
        let config: LoomConfig = serde_yaml::from_str(raw)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }
}
