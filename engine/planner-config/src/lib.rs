//! Centralized configuration loading from config.toml.
//!
//! This crate provides the configuration structs and loading logic shared by
//! the runner and any other binaries.
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`PLANNER_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! PLANNER_<SECTION>_<KEY>=value
//!
//! Examples:
//!     PLANNER_COMMON_LOG_LEVEL=debug
//!     PLANNER_RUNNER_EPISODES=20
//!     PLANNER_SEARCH_MAX_ITERATIONS=5000
//!     PLANNER_SEARCH_COST_CONSTRAINT=0.2
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::*;

#[cfg(test)]
mod tests;
