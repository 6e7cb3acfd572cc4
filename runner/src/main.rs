//! Runner - episode driver for the crossing scenario
//!
//! A command-line process that:
//! 1. Loads the central config (config.toml + env overrides)
//! 2. Repeatedly plans with the hypothesis-variant search while the other
//!    agents act by hidden gap-keeping policies
//! 3. Updates opponent beliefs after every step and reports episode outcomes

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeMap;
use tracing::info;

mod episode;

use envs_crossing::GapPolicy;
use episode::EpisodeRunner;
use planner_core::AgentIdx;

/// Command-line arguments; anything not given here falls back to the central
/// config.
#[derive(Debug, Parser)]
#[command(name = "runner", about = "Crossing-scenario episode runner")]
struct Args {
    /// Number of episodes to run (overrides the config).
    #[arg(long)]
    episodes: Option<u32>,

    /// Search RNG seed (overrides the config). Episode e runs with seed + e.
    #[arg(long)]
    seed: Option<u64>,

    /// Search iteration budget per decision (overrides the config).
    #[arg(long)]
    iterations: Option<u32>,
}

/// Initialize tracing, honoring RUST_LOG over the configured level.
fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = planner_config::load_config();
    if let Some(episodes) = args.episodes {
        config.runner.episodes = episodes;
    }
    if let Some(seed) = args.seed {
        config.search.random_seed = seed;
    }
    if let Some(iterations) = args.iterations {
        config.search.max_iterations = iterations;
    }

    init_tracing(&config.common.log_level);
    config
        .search
        .validate()
        .context("invalid search configuration")?;

    // The hypothesis set offered to the planner, and the hidden behavior the
    // other agents actually follow (the first hypothesis).
    let hypotheses = vec![GapPolicy::new(4, 6), GapPolicy::new(0, 2)];
    let true_policies: BTreeMap<AgentIdx, GapPolicy> = (1..=config.crossing.num_other_agents)
        .map(|agent| (agent, hypotheses[0].clone()))
        .collect();

    info!(
        episodes = config.runner.episodes,
        iterations = config.search.max_iterations,
        cost_constraint = config.search.cost_constrained.cost_constraint,
        num_other_agents = config.crossing.num_other_agents,
        "starting runs"
    );

    let mut goals = 0u32;
    let mut collisions = 0u32;
    let mut total_reward = 0.0;
    let mut total_cost = 0.0;

    for episode_index in 0..config.runner.episodes {
        let mut rng =
            ChaCha20Rng::seed_from_u64(config.search.random_seed + u64::from(episode_index));
        let mut runner = EpisodeRunner::new(
            &config.crossing,
            config.search.clone(),
            hypotheses.clone(),
            true_policies.clone(),
            config.runner.max_steps,
        );

        let outcome = runner
            .run(&mut rng)
            .with_context(|| format!("episode {episode_index} failed"))?;

        goals += u32::from(outcome.goal_reached);
        collisions += u32::from(outcome.collision);
        total_reward += outcome.ego_reward;
        total_cost += outcome.ego_cost;

        info!(
            episode = episode_index,
            reward = outcome.ego_reward,
            cost = outcome.ego_cost,
            steps = outcome.steps,
            beliefs = ?runner.beliefs(),
            "episode summary"
        );
    }

    let episodes = f64::from(config.runner.episodes.max(1));
    info!(
        goals,
        collisions,
        mean_reward = total_reward / episodes,
        mean_cost = total_cost / episodes,
        "all episodes finished"
    );

    Ok(())
}
