//! Model service adapters
//!
//! - `MockModelService` for tests and offline runs
//! - Anthropic Messages and OpenAI chat completions clients
//! - `ResilientService` decorator (timeout, retry, rate limit)
//! - `ServiceRegistry` building services from `provider/model` identifiers

pub mod anthropic;
pub mod chat;
pub mod mock;
pub mod openai;
pub mod registry;
pub mod resilient;

pub use anthropic::AnthropicService;
pub use mock::MockModelService;
pub use openai::OpenAiService;
pub use registry::{RegistryError, ServiceRegistry};
pub use resilient::{CallLimiter, ResilientService};
