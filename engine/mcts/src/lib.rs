//! Cost-constrained Monte Carlo Tree Search for multi-agent planning.
//!
//! This crate plans an action for a designated *ego* agent that approximately
//! maximizes expected discounted reward subject to a bound on expected cost,
//! while the other agents are modeled either as UCB searchers of their own
//! reward or through a posterior over candidate policies (hypotheses).
//!
//! # Overview
//!
//! Each search iteration runs four phases:
//!
//! 1. **Selection**: descend the tree, forming one joint action per node from
//!    every agent's statistic
//! 2. **Expansion**: attach a child for a joint action that has not been
//!    simulated from a node yet
//! 3. **Estimation**: seed the new leaf with a heuristic estimate (random
//!    rollout by default)
//! 4. **Backpropagation**: fold step rewards, step costs and child returns
//!    into the statistics along the visited path
//!
//! After each iteration the Lagrangian multiplier combining reward and cost
//! is pushed along the constraint violation of the root's greedy action.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mcts::{MctsConfig, MctsSearch, RandomRolloutHeuristic};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//!
//! let config = MctsConfig::default().with_cost_constraint(0.2);
//! let heuristic = RandomRolloutHeuristic::from_config(&config);
//! let mut rng = ChaCha20Rng::seed_from_u64(config.random_seed);
//!
//! let mut search = MctsSearch::new(state, &heuristic, config)?;
//! let result = search.run(&mut rng)?;
//! println!("best action: {}", result.best_action);
//! ```
//!
//! For environments implementing `planner_core::HypothesisState`, build the
//! search with [`MctsSearch::with_hypotheses`] and drive it with a
//! [`BeliefTracker`] through `run_with_beliefs`.

pub mod belief;
pub mod config;
pub mod heuristic;
pub mod node;
pub mod search;
pub mod statistics;
pub mod tree;

// Re-export main types
pub use belief::BeliefTracker;
pub use config::{BeliefConfig, ConfigError, CostConstrainedConfig, MctsConfig, RolloutConfig, UctConfig};
pub use heuristic::{Heuristic, HeuristicEstimate, RandomRolloutHeuristic};
pub use node::{NodeId, StageNode};
pub use search::{run_search, MctsSearch, SearchError, SearchResult};
pub use statistics::{
    CostConstrainedStatistic, HypothesisStatistic, OtherAgentMode, OtherStatistic, UcbPair,
    UcbStatistic,
};
pub use tree::{SearchTree, TreeStats};
