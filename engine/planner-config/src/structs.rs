//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.
//! The search and environment sections reuse the structs defined next to the
//! code they configure.

use serde::{Deserialize, Serialize};

use crate::defaults;
use envs_crossing::CrossingConfig;
use mcts::MctsConfig;

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_episodes() -> u32 {
    defaults::episodes()
}
fn d_max_steps() -> u32 {
    defaults::max_steps()
}

/// Settings shared by every binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonConfig {
    /// Default tracing filter when RUST_LOG is not set.
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: d_log_level(),
        }
    }
}

/// Episode-runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Episodes to run before exiting.
    #[serde(default = "d_episodes")]
    pub episodes: u32,

    /// Step cap per episode.
    #[serde(default = "d_max_steps")]
    pub max_steps: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            episodes: d_episodes(),
            max_steps: d_max_steps(),
        }
    }
}

/// Root configuration structure matching config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralConfig {
    pub common: CommonConfig,
    pub runner: RunnerConfig,
    pub search: MctsConfig,
    pub crossing: CrossingConfig,
}
