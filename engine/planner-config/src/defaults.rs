//! Default configuration values.
//!
//! Single source of truth for the defaults of the runner-facing settings.
//! Search and environment defaults live with their own structs in the `mcts`
//! and `envs-crossing` crates.

// Common defaults
pub const LOG_LEVEL: &str = "info";

// Runner defaults
pub const EPISODES: u32 = 10;
pub const MAX_STEPS: u32 = 60;

pub fn log_level() -> &'static str {
    LOG_LEVEL
}

pub fn episodes() -> u32 {
    EPISODES
}

pub fn max_steps() -> u32 {
    MAX_STEPS
}
