//! Episode loop: plan with the hypothesis search, step the environment with
//! the hidden true policies, update beliefs.
//!
//! The belief tracker persists across planning decisions within an episode;
//! each decision builds a fresh search tree.

use std::collections::BTreeMap;

use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

use envs_crossing::{CrossingConfig, CrossingState, GapPolicy};
use mcts::{BeliefTracker, MctsConfig, MctsSearch, RandomRolloutHeuristic, SearchError};
use planner_core::{AgentIdx, JointAction, MultiAgentState, Probability, EGO_AGENT_IDX};

/// Result of one finished episode.
#[derive(Debug, Clone)]
pub struct EpisodeOutcome {
    pub ego_reward: f64,
    pub ego_cost: f64,
    pub goal_reached: bool,
    pub collision: bool,
    pub steps: u32,
    pub max_steps_reached: bool,

    /// Belief snapshots after every step, for analysis.
    pub beliefs: Vec<BTreeMap<AgentIdx, Vec<Probability>>>,
}

/// Drives one episode of the crossing scenario.
pub struct EpisodeRunner {
    /// Hidden behavior of each other agent; the planner only sees the
    /// hypothesis set.
    true_policies: BTreeMap<AgentIdx, GapPolicy>,

    search_config: MctsConfig,
    max_steps: u32,

    current_state: CrossingState,
    last_state: CrossingState,
    belief_tracker: BeliefTracker,
}

impl EpisodeRunner {
    pub fn new(
        crossing_config: &CrossingConfig,
        search_config: MctsConfig,
        hypotheses: Vec<GapPolicy>,
        true_policies: BTreeMap<AgentIdx, GapPolicy>,
        max_steps: u32,
    ) -> Self {
        let mut state = CrossingState::new(crossing_config);
        for hypothesis in hypotheses {
            state.add_hypothesis(hypothesis);
        }

        let belief_tracker = BeliefTracker::new(&state, search_config.belief.prior_smoothing);
        Self {
            true_policies,
            search_config,
            max_steps,
            current_state: state.clone(),
            last_state: state,
            belief_tracker,
        }
    }

    /// Plan one ego action, let the other agents act by their true policies,
    /// execute and fold the observed transition into the beliefs. Returns the
    /// ego step reward and cost.
    fn step(&mut self, rng: &mut ChaCha20Rng) -> Result<(f64, f64), SearchError> {
        let heuristic = RandomRolloutHeuristic::from_config(&self.search_config);
        let mut search = MctsSearch::with_hypotheses(
            self.current_state.clone(),
            &heuristic,
            self.search_config.clone(),
        )?;
        let plan = search.run_with_beliefs(&self.belief_tracker, rng)?;

        let mut actions = vec![plan.best_action];
        for (agent, policy) in &self.true_policies {
            let distance = self.current_state.distance_to_ego(*agent - 1);
            actions.push(policy.act(distance, rng));
        }
        let joint_action = JointAction::new(actions);

        let outcome = self.current_state.execute(&joint_action, rng);
        self.last_state = std::mem::replace(&mut self.current_state, outcome.state);
        self.belief_tracker
            .belief_update(&self.last_state, &self.current_state);

        debug!(
            ego_action = plan.best_action,
            ego_position = self.current_state.ego_state().x_pos,
            lambda = plan.lambda,
            iterations = plan.iterations,
            "episode step"
        );

        Ok((outcome.rewards[EGO_AGENT_IDX], outcome.ego_cost))
    }

    /// Run until the state turns terminal or the step cap is hit.
    pub fn run(&mut self, rng: &mut ChaCha20Rng) -> Result<EpisodeOutcome, SearchError> {
        let mut ego_reward = 0.0;
        let mut ego_cost = 0.0;
        let mut steps = 0;
        let mut beliefs = Vec::new();

        while !self.current_state.is_terminal() && steps < self.max_steps {
            let (step_reward, step_cost) = self.step(rng)?;
            ego_reward += step_reward;
            ego_cost += step_cost;
            steps += 1;
            beliefs.push(self.belief_tracker.beliefs().clone());
        }

        let outcome = EpisodeOutcome {
            ego_reward,
            ego_cost,
            goal_reached: self.current_state.ego_goal_reached(),
            collision: self.current_state.ego_collided(),
            steps,
            max_steps_reached: steps >= self.max_steps && !self.current_state.is_terminal(),
            beliefs,
        };

        info!(
            reward = outcome.ego_reward,
            cost = outcome.ego_cost,
            goal_reached = outcome.goal_reached,
            collision = outcome.collision,
            steps = outcome.steps,
            "episode finished"
        );

        Ok(outcome)
    }

    /// Current normalized beliefs, for reporting.
    pub fn beliefs(&self) -> &BTreeMap<AgentIdx, Vec<Probability>> {
        self.belief_tracker.beliefs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn runner() -> EpisodeRunner {
        let crossing = CrossingConfig::default();
        let search = MctsConfig::for_testing()
            .with_iterations(60)
            .with_cost_constraint(0.2);
        let hypotheses = vec![GapPolicy::new(4, 6), GapPolicy::new(0, 2)];
        let true_policies = [(1, GapPolicy::new(4, 6))].into_iter().collect();

        EpisodeRunner::new(&crossing, search, hypotheses, true_policies, 50)
    }

    #[test]
    fn test_episode_terminates_within_step_cap() {
        let mut runner = runner();
        let mut rng = ChaCha20Rng::seed_from_u64(42);

        let outcome = runner.run(&mut rng).unwrap();

        assert!(outcome.steps <= 50);
        assert!(outcome.goal_reached || outcome.collision || outcome.max_steps_reached);
        assert_eq!(outcome.beliefs.len() as u32, outcome.steps);
    }

    #[test]
    fn test_beliefs_stay_normalized_across_episode() {
        let mut runner = runner();
        let mut rng = ChaCha20Rng::seed_from_u64(7);

        let outcome = runner.run(&mut rng).unwrap();

        for snapshot in &outcome.beliefs {
            let total: f64 = snapshot[&1].iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }
}
