use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Settings;

/// Runtime settings error types
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(u32),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid {0}: must be at least 1")]
    ZeroLimit(&'static str),

    #[error("Provider '{0}' base_url cannot be empty")]
    EmptyBaseUrl(&'static str),

    #[error("Provider '{provider}' temperature {value} must be within [0, 2]")]
    InvalidTemperature { provider: &'static str, value: f32 },
}

/// Runtime settings loader with hierarchical merging
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .loom/config.yaml (project settings)
    /// 3. .loom/local.yaml (local overrides, optional)
    /// 4. Environment variables (LOOM_* prefix, `__` between sections)
    pub fn load() -> Result<Settings> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(".loom/config.yaml"))
            .merge(Yaml::file(".loom/local.yaml"))
            .merge(Env::prefixed("LOOM_").split("__"))
            .extract()
            .context("Failed to extract settings from figment")?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Load settings from a specific file, still honouring `LOOM_*` overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Settings> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("LOOM_").split("__"))
            .extract()
            .context(format!(
                "Failed to load settings from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Validate settings after loading
    pub fn validate(settings: &Settings) -> Result<(), SettingsError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&settings.logging.level.as_str()) {
            return Err(SettingsError::InvalidLogLevel(settings.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&settings.logging.format.as_str()) {
            return Err(SettingsError::InvalidLogFormat(settings.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&settings.logging.rotation.as_str()) {
            return Err(SettingsError::InvalidRotation(settings.logging.rotation.clone()));
        }

        if settings.rate_limit.requests_per_second == 0 {
            return Err(SettingsError::InvalidRateLimit(
                settings.rate_limit.requests_per_second,
            ));
        }

        if settings.rate_limit.burst_size == 0 {
            return Err(SettingsError::InvalidBurstSize(settings.rate_limit.burst_size));
        }

        if settings.retry.initial_backoff_ms >= settings.retry.max_backoff_ms {
            return Err(SettingsError::InvalidBackoff(
                settings.retry.initial_backoff_ms,
                settings.retry.max_backoff_ms,
            ));
        }

        if settings.execution.max_concurrent_calls == 0 {
            return Err(SettingsError::ZeroLimit("execution.max_concurrent_calls"));
        }
        if settings.execution.max_parallel_rollouts == 0 {
            return Err(SettingsError::ZeroLimit("execution.max_parallel_rollouts"));
        }
        if settings.execution.call_timeout_secs == 0 {
            return Err(SettingsError::ZeroLimit("execution.call_timeout_secs"));
        }

        let anthropic = &settings.providers.anthropic;
        let openai = &settings.providers.openai;
        for (provider, base_url, temperature) in [
            ("anthropic", &anthropic.base_url, anthropic.temperature),
            ("openai", &openai.base_url, openai.temperature),
        ] {
            if base_url.trim().is_empty() {
                return Err(SettingsError::EmptyBaseUrl(provider));
            }
            if !(0.0..=2.0).contains(&temperature) {
                return Err(SettingsError::InvalidTemperature {
                    provider,
                    value: temperature,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.rate_limit.requests_per_second, 5);
        assert_eq!(settings.execution.max_parallel_rollouts, 4);
        assert_eq!(settings.logging.level, "info");
        SettingsLoader::validate(&settings).expect("Default settings should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
rate_limit:
  requests_per_second: 15
  burst_size: 30
logging:
  level: debug
  format: json
execution:
  max_parallel_rollouts: 2
";

        let settings: Settings = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(settings.rate_limit.requests_per_second, 15);
        assert_eq!(settings.rate_limit.burst_size, 30);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, "json");
        assert_eq!(settings.execution.max_parallel_rollouts, 2);
        assert_eq!(settings.execution.max_concurrent_calls, 8);

        SettingsLoader::validate(&settings).expect("Parsed settings should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "invalid".to_string();

        match SettingsLoader::validate(&settings).unwrap_err() {
            SettingsError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut settings = Settings::default();
        settings.logging.format = "xml".to_string();

        assert!(matches!(
            SettingsLoader::validate(&settings).unwrap_err(),
            SettingsError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_validate_zero_rate_limit() {
        let mut settings = Settings::default();
        settings.rate_limit.requests_per_second = 0;

        assert!(matches!(
            SettingsLoader::validate(&settings).unwrap_err(),
            SettingsError::InvalidRateLimit(0)
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut settings = Settings::default();
        settings.retry.initial_backoff_ms = 30000;
        settings.retry.max_backoff_ms = 10000;

        assert!(matches!(
            SettingsLoader::validate(&settings).unwrap_err(),
            SettingsError::InvalidBackoff(30000, 10000)
        ));
    }

    #[test]
    fn test_validate_zero_parallel_rollouts() {
        let mut settings = Settings::default();
        settings.execution.max_parallel_rollouts = 0;

        assert!(matches!(
            SettingsLoader::validate(&settings).unwrap_err(),
            SettingsError::ZeroLimit("execution.max_parallel_rollouts")
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "retry:\n  max_retries: 5\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "retry:\n  max_retries: 1\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(settings.retry.max_retries, 1, "Override should win");
        assert_eq!(settings.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(
            settings.logging.format, "json",
            "Base value should persist when not overridden"
        );
        assert_eq!(settings.retry.max_backoff_ms, 30_000, "Defaults fill the gaps");
    }
}
