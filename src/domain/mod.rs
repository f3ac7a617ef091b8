//! Domain layer for Loom
//!
//! Config and transcript models, error taxonomy, and the ports the rollout
//! engine drives.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    CurveError, PhaseError, RolloutError, RolloutFailure, RolloutResult, ServiceError,
};
