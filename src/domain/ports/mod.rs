//! Port trait definitions
//!
//! - ModelService: any model that produces the next message of a rollout
//! - Monitor: runtime checks over persona output

pub mod model_service;
pub mod monitor;

pub use model_service::{GenerationRequest, ModelService};
pub use monitor::{Monitor, MonitorContext};
