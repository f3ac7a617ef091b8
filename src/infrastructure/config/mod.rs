//! Configuration management infrastructure
//!
//! Two kinds of configuration:
//! - Persona configs (YAML, one per simulated persona), parsed and validated
//! - Runtime settings, layered with figment (defaults, project YAML, env)

pub mod loader;
pub mod persona;
pub mod validation;

pub use loader::{SettingsError, SettingsLoader};
pub use persona::PersonaLoader;
pub use validation::{ConfigError, ConfigValidator};
