//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable
//! overrides.

use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::CentralConfig;

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",      // Current directory
    "../config.toml",   // Parent directory (when running from a subdirectory)
    "/app/config.toml", // Container
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by the PLANNER_CONFIG environment variable
/// 2. The standard search paths
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("PLANNER_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from PLANNER_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "PLANNER_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &PathBuf) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($target:expr, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $target = v;
        }
    };
    // Parseable field (u32, u64, f64, etc.)
    ($target:expr, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $target = v;
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: PLANNER_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config.common.log_level, "PLANNER_COMMON_LOG_LEVEL");

    // Runner
    env_override!(config.runner.episodes, "PLANNER_RUNNER_EPISODES", parse);
    env_override!(config.runner.max_steps, "PLANNER_RUNNER_MAX_STEPS", parse);

    // Search
    env_override!(
        config.search.max_iterations,
        "PLANNER_SEARCH_MAX_ITERATIONS",
        parse
    );
    env_override!(
        config.search.max_search_time_ms,
        "PLANNER_SEARCH_MAX_SEARCH_TIME_MS",
        parse
    );
    env_override!(config.search.random_seed, "PLANNER_SEARCH_RANDOM_SEED", parse);
    env_override!(
        config.search.discount_factor,
        "PLANNER_SEARCH_DISCOUNT_FACTOR",
        parse
    );
    env_override!(
        config.search.cost_constrained.cost_constraint,
        "PLANNER_SEARCH_COST_CONSTRAINT",
        parse
    );
    env_override!(
        config.search.cost_constrained.lambda,
        "PLANNER_SEARCH_LAMBDA",
        parse
    );

    // Crossing environment
    env_override!(
        config.crossing.num_other_agents,
        "PLANNER_CROSSING_NUM_OTHER_AGENTS",
        parse
    );
    env_override!(
        config.crossing.ego_goal_position,
        "PLANNER_CROSSING_EGO_GOAL_POSITION",
        parse
    );

    config
}
