//! Search driver.
//!
//! One `MctsSearch` serves one planning decision: it owns the tree, runs the
//! iteration loop (hypothesis sampling, descent, expansion, leaf estimation,
//! backpropagation, multiplier update) and returns the ego action the root
//! statistics point to. The loop is strictly sequential; budgets are checked
//! between iterations and a running iteration is never aborted.

use std::time::{Duration, Instant};

use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::trace;

use planner_core::{
    ActionIdx, AgentIdx, Cost, HypothesisAssignment, HypothesisState, JointAction,
    MultiAgentState, Policy, Reward, EGO_AGENT_IDX,
};

use crate::belief::BeliefTracker;
use crate::config::{ConfigError, MctsConfig};
use crate::heuristic::Heuristic;
use crate::node::NodeId;
use crate::statistics::{CostConstrainedStatistic, OtherAgentMode, OtherStatistic};
use crate::tree::SearchTree;

/// Errors that can occur during a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("no iteration completed within the search budget")]
    NotReady,
}

/// Result of one search invocation.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Ego action the root statistics point to.
    pub best_action: ActionIdx,

    /// Root policy the action was sampled from.
    pub policy: Policy,

    /// Final Lagrangian multiplier.
    pub lambda: f64,

    /// Iterations completed within the budget.
    pub iterations: u32,

    pub elapsed: Duration,
}

/// One traversed edge, carrying the per-visit transition outcome for
/// backpropagation.
struct Edge {
    parent: NodeId,
    joint_action: JointAction,
    rewards: Vec<Reward>,
    ego_cost: Cost,
    child: NodeId,
}

/// How other agents pick actions during descent and consume backpropagated
/// values. Split from the engine so the hypothesis variant can require
/// `HypothesisState` without forcing it on plain searches.
trait OtherAgentPolicy<S: MultiAgentState> {
    fn choose(
        &self,
        state: &S,
        statistic: &mut OtherStatistic,
        rng: &mut ChaCha20Rng,
    ) -> ActionIdx;

    fn backpropagate(
        &self,
        statistic: &mut OtherStatistic,
        action: ActionIdx,
        step_reward: Reward,
        child_return: f64,
    );
}

/// Other agents search their own reward through UCB selection.
struct UctOthers;

impl<S: MultiAgentState> OtherAgentPolicy<S> for UctOthers {
    fn choose(
        &self,
        _state: &S,
        statistic: &mut OtherStatistic,
        rng: &mut ChaCha20Rng,
    ) -> ActionIdx {
        match statistic {
            OtherStatistic::Uct(stat) => stat.choose_next_action(rng),
            OtherStatistic::Hypothesis(_) => {
                unreachable!("hypothesis statistic in a plain search")
            }
        }
    }

    fn backpropagate(
        &self,
        statistic: &mut OtherStatistic,
        action: ActionIdx,
        step_reward: Reward,
        child_return: f64,
    ) {
        match statistic {
            OtherStatistic::Uct(stat) => stat.update_statistics(action, step_reward, child_return),
            OtherStatistic::Hypothesis(_) => {
                unreachable!("hypothesis statistic in a plain search")
            }
        }
    }
}

/// Other agents follow the hypothesis sampled for this iteration.
struct HypothesisOthers<'t> {
    assignment: &'t HypothesisAssignment,
}

impl<S: HypothesisState> OtherAgentPolicy<S> for HypothesisOthers<'_> {
    fn choose(
        &self,
        state: &S,
        statistic: &mut OtherStatistic,
        rng: &mut ChaCha20Rng,
    ) -> ActionIdx {
        match statistic {
            OtherStatistic::Hypothesis(stat) => {
                stat.choose_next_action(state, self.assignment, rng)
            }
            OtherStatistic::Uct(_) => unreachable!("uct statistic in a hypothesis search"),
        }
    }

    fn backpropagate(
        &self,
        statistic: &mut OtherStatistic,
        action: ActionIdx,
        _step_reward: Reward,
        _child_return: f64,
    ) {
        match statistic {
            OtherStatistic::Hypothesis(stat) => {
                let hypothesis = self.assignment[&stat.agent()];
                stat.update_statistics(action, hypothesis);
            }
            OtherStatistic::Uct(_) => unreachable!("uct statistic in a hypothesis search"),
        }
    }
}

/// Search state for one planning decision.
pub struct MctsSearch<'a, S, H> {
    tree: SearchTree<S>,
    heuristic: &'a H,
    config: MctsConfig,
    mode: OtherAgentMode,
    agents: Vec<AgentIdx>,
    lambda: f64,
}

impl<'a, S: MultiAgentState, H: Heuristic<S>> MctsSearch<'a, S, H> {
    /// Create a search in which other agents are modeled through plain UCB
    /// statistics.
    pub fn new(root_state: S, heuristic: &'a H, config: MctsConfig) -> Result<Self, SearchError> {
        Self::with_mode(root_state, heuristic, config, OtherAgentMode::Uct)
    }

    fn with_mode(
        root_state: S,
        heuristic: &'a H,
        config: MctsConfig,
        mode: OtherAgentMode,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        assert!(
            !root_state.is_terminal(),
            "cannot plan from a terminal state"
        );

        let agents = root_state.agent_indices();
        assert!(
            agents.first() == Some(&EGO_AGENT_IDX),
            "agent indices must start with the ego agent"
        );

        let lambda = config.cost_constrained.lambda;
        let tree = SearchTree::new(root_state, &config, mode);
        Ok(Self {
            tree,
            heuristic,
            config,
            mode,
            agents,
            lambda,
        })
    }

    /// Run the search until a budget is exhausted.
    pub fn run(&mut self, rng: &mut ChaCha20Rng) -> Result<SearchResult, SearchError> {
        assert!(
            self.mode == OtherAgentMode::Uct,
            "hypothesis-mode search must be run with a belief tracker"
        );

        let start = Instant::now();
        let budget = Duration::from_millis(self.config.max_search_time_ms);
        let mut iterations = 0;
        while iterations < self.config.max_iterations && start.elapsed() < budget {
            self.iterate(&UctOthers, iterations, rng);
            iterations += 1;
        }
        self.finish(iterations, start.elapsed(), rng)
    }

    /// One iteration: descend, expand, estimate, backpropagate, update the
    /// multiplier.
    fn iterate<P: OtherAgentPolicy<S>>(
        &mut self,
        others: &P,
        iteration: u32,
        rng: &mut ChaCha20Rng,
    ) {
        let mut edges: Vec<Edge> = Vec::new();
        let mut current = self.tree.root();

        // Selection / expansion. The transition is executed on every
        // traversal so stochastic rewards are re-sampled per visit; the child
        // node keeps the state from its first expansion.
        let (leaf, newly_expanded) = loop {
            if self.tree.get(current).is_terminal {
                break (current, false);
            }

            let lambda = self.lambda;
            let (joint_action, outcome, ready, existing) = {
                let node = self.tree.get_mut(current);

                let mut actions = Vec::with_capacity(self.agents.len());
                actions.push(node.ego_statistic.choose_next_action(lambda, rng));
                for slot in 0..self.agents.len() - 1 {
                    actions.push(others.choose(
                        &node.state,
                        &mut node.other_statistics[slot],
                        rng,
                    ));
                }
                let joint_action = JointAction::new(actions);

                let outcome = node.state.execute(&joint_action, rng);
                assert!(
                    outcome.rewards.len() == self.agents.len(),
                    "environment returned {} rewards for {} agents",
                    outcome.rewards.len(),
                    self.agents.len()
                );

                let existing = node.child(&joint_action);
                (joint_action, outcome, node.policy_is_ready(), existing)
            };

            match existing {
                Some(child) if ready => {
                    edges.push(Edge {
                        parent: current,
                        joint_action,
                        rewards: outcome.rewards,
                        ego_cost: outcome.ego_cost,
                        child,
                    });
                    current = child;
                }
                Some(child) => {
                    // Expansion still in progress at this node; revisit the
                    // existing child as the simulation leaf.
                    edges.push(Edge {
                        parent: current,
                        joint_action,
                        rewards: outcome.rewards,
                        ego_cost: outcome.ego_cost,
                        child,
                    });
                    break (child, false);
                }
                None => {
                    let child = self.tree.add_child(
                        current,
                        joint_action.clone(),
                        outcome.state,
                        &self.config,
                        self.mode,
                    );
                    edges.push(Edge {
                        parent: current,
                        joint_action,
                        rewards: outcome.rewards,
                        ego_cost: outcome.ego_cost,
                        child,
                    });
                    break (child, true);
                }
            }
        };

        // Leaf estimation seeds the new node's statistics.
        if newly_expanded {
            let estimate = self.heuristic.estimate(&self.tree.get(leaf).state, rng);
            assert!(
                estimate.rewards.len() == self.agents.len(),
                "heuristic returned {} rewards for {} agents",
                estimate.rewards.len(),
                self.agents.len()
            );

            let leaf_node = self.tree.get_mut(leaf);
            leaf_node
                .ego_statistic
                .update_from_heuristic(estimate.rewards[EGO_AGENT_IDX], estimate.ego_cost);
            for (slot, statistic) in leaf_node.other_statistics.iter_mut().enumerate() {
                statistic.update_from_heuristic(estimate.rewards[slot + 1]);
            }
        }

        // Backpropagation, leaf to root; each parent consumes the returns its
        // child produced one step earlier.
        for edge in edges.iter().rev() {
            let (child_reward_return, child_cost_return, child_other_returns) = {
                let child = self.tree.get(edge.child);
                (
                    child.ego_statistic.latest_reward_return(),
                    child.ego_statistic.latest_cost_return(),
                    child
                        .other_statistics
                        .iter()
                        .map(OtherStatistic::latest_return)
                        .collect::<Vec<_>>(),
                )
            };

            let parent = self.tree.get_mut(edge.parent);
            parent.ego_statistic.update_statistics(
                edge.joint_action.ego(),
                edge.rewards[EGO_AGENT_IDX],
                edge.ego_cost,
                child_reward_return,
                child_cost_return,
            );
            for (slot, statistic) in parent.other_statistics.iter_mut().enumerate() {
                others.backpropagate(
                    statistic,
                    edge.joint_action.of(slot + 1),
                    edge.rewards[slot + 1],
                    child_other_returns[slot],
                );
            }
        }

        // Multiplier update against the root, once it is fully expanded.
        let root = self.tree.get(self.tree.root());
        if root.ego_statistic.policy_is_ready() {
            self.lambda = root
                .ego_statistic
                .next_lambda(self.lambda, iteration, rng);
        }

        trace!(
            iteration,
            nodes = self.tree.len(),
            depth = edges.len(),
            lambda = self.lambda,
            "search iteration complete"
        );
    }

    fn finish(
        &mut self,
        iterations: u32,
        elapsed: Duration,
        rng: &mut ChaCha20Rng,
    ) -> Result<SearchResult, SearchError> {
        if iterations == 0 {
            return Err(SearchError::NotReady);
        }

        let root = self.tree.get(self.tree.root());
        let (best_action, policy) = root.ego_statistic.greedy_policy(
            self.lambda,
            0.0,
            self.config.cost_constrained.action_filter_factor,
            rng,
        );

        Ok(SearchResult {
            best_action,
            policy,
            lambda: self.lambda,
            iterations,
            elapsed,
        })
    }

    /// Root ego statistics for diagnostic consumption.
    pub fn root_statistics(&self) -> &CostConstrainedStatistic {
        &self.tree.get(self.tree.root()).ego_statistic
    }

    /// The search tree (for inspection/debugging).
    pub fn tree(&self) -> &SearchTree<S> {
        &self.tree
    }

    #[inline]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl<'a, S: HypothesisState, H: Heuristic<S>> MctsSearch<'a, S, H> {
    /// Create a search in which other agents follow belief-sampled
    /// hypothesis policies.
    pub fn with_hypotheses(
        root_state: S,
        heuristic: &'a H,
        config: MctsConfig,
    ) -> Result<Self, SearchError> {
        Self::with_mode(root_state, heuristic, config, OtherAgentMode::Hypothesis)
    }

    /// Run the hypothesis-variant search. The tracker is only read: one
    /// hypothesis assignment is sampled per iteration and held fixed while
    /// the iteration lasts.
    pub fn run_with_beliefs(
        &mut self,
        tracker: &BeliefTracker,
        rng: &mut ChaCha20Rng,
    ) -> Result<SearchResult, SearchError> {
        assert!(
            self.mode == OtherAgentMode::Hypothesis,
            "plain search must be run without a belief tracker"
        );

        let start = Instant::now();
        let budget = Duration::from_millis(self.config.max_search_time_ms);
        let mut iterations = 0;
        while iterations < self.config.max_iterations && start.elapsed() < budget {
            let assignment = tracker.sample_hypotheses(rng);
            self.iterate(
                &HypothesisOthers {
                    assignment: &assignment,
                },
                iterations,
                rng,
            );
            iterations += 1;
        }
        self.finish(iterations, start.elapsed(), rng)
    }
}

/// Convenience function to run a single plain search.
pub fn run_search<S: MultiAgentState, H: Heuristic<S>>(
    root_state: S,
    heuristic: &H,
    config: MctsConfig,
    rng: &mut ChaCha20Rng,
) -> Result<SearchResult, SearchError> {
    let mut search = MctsSearch::new(root_state, heuristic, config)?;
    search.run(rng)
}
