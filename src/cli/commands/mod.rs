//! CLI command implementations

pub mod dry_run;
pub mod run;
pub mod validate;
