//! Leaf-value estimation.
//!
//! The heuristic seeds a freshly expanded node with an estimate of the
//! reward-to-go per agent and the cost-to-go for the ego. The default is a
//! random rollout; smarter estimators can be plugged in through the trait.

use rand::Rng;
use rand_chacha::ChaCha20Rng;

use planner_core::{Cost, JointAction, MultiAgentState, Reward};

use crate::config::MctsConfig;

/// Estimated value of a leaf state.
#[derive(Debug, Clone)]
pub struct HeuristicEstimate {
    /// Accumulated discounted reward per agent, in agent-index order.
    pub rewards: Vec<Reward>,

    /// Accumulated undiscounted ego cost.
    pub ego_cost: Cost,
}

/// Trait for leaf estimators.
pub trait Heuristic<S: MultiAgentState> {
    fn estimate(&self, state: &S, rng: &mut ChaCha20Rng) -> HeuristicEstimate;
}

/// Rollout with uniformly random joint actions until a terminal state or the
/// depth cap. Rewards are discounted along the rollout; cost is summed
/// undiscounted. Terminal leaves estimate to zero.
#[derive(Debug, Clone)]
pub struct RandomRolloutHeuristic {
    pub max_depth: u32,
    pub discount_factor: f64,
}

impl RandomRolloutHeuristic {
    pub fn new(max_depth: u32, discount_factor: f64) -> Self {
        Self {
            max_depth,
            discount_factor,
        }
    }

    pub fn from_config(config: &MctsConfig) -> Self {
        Self::new(config.rollout.max_depth, config.discount_factor)
    }
}

impl<S: MultiAgentState> Heuristic<S> for RandomRolloutHeuristic {
    fn estimate(&self, state: &S, rng: &mut ChaCha20Rng) -> HeuristicEstimate {
        let agents = state.agent_indices();
        let mut rewards = vec![0.0; agents.len()];
        let mut ego_cost = 0.0;
        let mut discount = 1.0;
        let mut current = state.clone();

        for _ in 0..self.max_depth {
            if current.is_terminal() {
                break;
            }
            let joint = JointAction::new(
                agents
                    .iter()
                    .map(|&agent| rng.gen_range(0..current.num_actions(agent)))
                    .collect(),
            );
            let outcome = current.execute(&joint, rng);

            for (accumulated, step) in rewards.iter_mut().zip(outcome.rewards.iter()) {
                *accumulated += discount * step;
            }
            ego_cost += outcome.ego_cost;
            discount *= self.discount_factor;
            current = outcome.state;
        }

        HeuristicEstimate { rewards, ego_cost }
    }
}
