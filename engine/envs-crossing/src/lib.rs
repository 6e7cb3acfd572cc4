//! 1-D crossing environment.
//!
//! The ego agent and one or more other agents move on a line; a single
//! crossing point lies halfway along it. The ego wants to pass its goal
//! position without ever occupying the crossing point together with another
//! agent. Other agents follow gap-keeping policies: each tries to keep a
//! desired distance to the ego, and the planner reasons about which desired
//! gap (hypothesis) each agent is following.
//!
//! # Usage
//!
//! ```rust
//! use envs_crossing::{CrossingConfig, CrossingState, GapPolicy};
//!
//! let mut state = CrossingState::new(&CrossingConfig::default());
//! state.add_hypothesis(GapPolicy::new(4, 6));
//! state.add_hypothesis(GapPolicy::new(0, 2));
//! ```

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use planner_core::{
    ActionIdx, AgentIdx, HypothesisAssignment, HypothesisId, HypothesisState, JointAction,
    MultiAgentState, Probability, StepOutcome, EGO_AGENT_IDX,
};

#[cfg(test)]
mod tests;

/// Stand still.
pub const WAIT: ActionIdx = 0;
/// Move one cell toward larger positions.
pub const FORWARD: ActionIdx = 1;
/// Move one cell back.
pub const BACKWARD: ActionIdx = 2;

pub const NUM_ACTIONS: usize = 3;

/// Position change of one action.
#[inline]
pub fn action_delta(action: ActionIdx) -> i64 {
    match action {
        WAIT => 0,
        FORWARD => 1,
        BACKWARD => -1,
        _ => panic!("action index {action} out of range"),
    }
}

/// Geometry of the crossing scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossingConfig {
    /// Length of the 1-D corridor; the crossing point sits halfway.
    pub state_x_length: u32,

    /// Ego position at or beyond which the goal counts as reached.
    pub ego_goal_position: i64,

    pub num_other_agents: usize,
}

impl Default for CrossingConfig {
    fn default() -> Self {
        Self {
            state_x_length: 41,
            ego_goal_position: 35,
            num_other_agents: 1,
        }
    }
}

impl CrossingConfig {
    /// Cell both corridors share: `(length - 1) / 2 + 1`.
    pub fn crossing_point(&self) -> i64 {
        i64::from((self.state_x_length - 1) / 2 + 1)
    }
}

/// Position and most recent action of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentState {
    pub x_pos: i64,
    pub last_action: ActionIdx,
}

impl AgentState {
    pub fn new(x_pos: i64) -> Self {
        Self {
            x_pos,
            last_action: WAIT,
        }
    }
}

/// Gap-keeping policy: the agent drives toward a desired distance to the
/// ego, sampled uniformly from an inclusive range each decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapPolicy {
    min_gap: i64,
    max_gap: i64,
}

impl GapPolicy {
    pub fn new(min_gap: i64, max_gap: i64) -> Self {
        assert!(min_gap <= max_gap, "gap range must satisfy min <= max");
        Self { min_gap, max_gap }
    }

    /// Sample a desired gap and act toward it. Draws from the caller's RNG,
    /// so the same seed reproduces the same gap sequence.
    pub fn act(&self, distance_to_ego: i64, rng: &mut ChaCha20Rng) -> ActionIdx {
        let desired_gap = rng.gen_range(self.min_gap..=self.max_gap);
        Self::action_for_gap(distance_to_ego, desired_gap)
    }

    fn action_for_gap(distance_to_ego: i64, desired_gap: i64) -> ActionIdx {
        match (distance_to_ego - desired_gap).signum() {
            1 => FORWARD,
            0 => WAIT,
            _ => BACKWARD,
        }
    }

    /// Probability of `action` at this distance: the fraction of desired
    /// gaps in the range that produce it.
    pub fn probability(&self, distance_to_ego: i64, action: ActionIdx) -> Probability {
        let range_size = self.max_gap - self.min_gap + 1;
        let matching = (self.min_gap..=self.max_gap)
            .filter(|&gap| Self::action_for_gap(distance_to_ego, gap) == action)
            .count();
        matching as f64 / range_size as f64
    }
}

/// Complete crossing state: ego, other agents, hypothesis set, terminal
/// flags.
#[derive(Debug, Clone)]
pub struct CrossingState {
    config: CrossingConfig,
    hypotheses: Vec<GapPolicy>,
    other_agents: Vec<AgentState>,
    ego: AgentState,
    terminal: bool,
    collided: bool,
}

impl CrossingState {
    /// Initial state: every agent at position 0, no history.
    pub fn new(config: &CrossingConfig) -> Self {
        Self {
            config: config.clone(),
            hypotheses: Vec::new(),
            other_agents: vec![AgentState::new(0); config.num_other_agents],
            ego: AgentState::new(0),
            terminal: false,
            collided: false,
        }
    }

    /// Register one candidate policy; hypothesis ids follow insertion order.
    pub fn add_hypothesis(&mut self, policy: GapPolicy) {
        self.hypotheses.push(policy);
    }

    #[inline]
    pub fn ego_state(&self) -> AgentState {
        self.ego
    }

    /// State of the other agent in `slot` (agent index `slot + 1`).
    #[inline]
    pub fn other_state(&self, slot: usize) -> AgentState {
        self.other_agents[slot]
    }

    pub fn ego_goal_reached(&self) -> bool {
        self.ego.x_pos >= self.config.ego_goal_position
    }

    pub fn ego_collided(&self) -> bool {
        self.collided
    }

    /// Distance from the other agent in `slot` to the ego.
    #[inline]
    pub fn distance_to_ego(&self, slot: usize) -> i64 {
        self.ego.x_pos - self.other_agents[slot].x_pos
    }

    #[inline]
    pub fn config(&self) -> &CrossingConfig {
        &self.config
    }
}

impl MultiAgentState for CrossingState {
    fn agent_indices(&self) -> Vec<AgentIdx> {
        (0..=self.config.num_other_agents).collect()
    }

    fn num_actions(&self, _agent: AgentIdx) -> usize {
        NUM_ACTIONS
    }

    fn execute(&self, joint_action: &JointAction, _rng: &mut ChaCha20Rng) -> StepOutcome<Self> {
        let ego_action = joint_action.ego();
        let next_ego = AgentState {
            x_pos: self.ego.x_pos + action_delta(ego_action),
            last_action: ego_action,
        };

        let next_others: Vec<AgentState> = self
            .other_agents
            .iter()
            .enumerate()
            .map(|(slot, agent)| {
                let action = joint_action.of(slot + 1);
                AgentState {
                    x_pos: agent.x_pos + action_delta(action),
                    last_action: action,
                }
            })
            .collect();

        let crossing_point = self.config.crossing_point();
        let goal_reached = next_ego.x_pos >= self.config.ego_goal_position;
        let collision = next_others
            .iter()
            .any(|agent| next_ego.x_pos == crossing_point && agent.x_pos == crossing_point);

        let mut rewards = vec![0.0; self.config.num_other_agents + 1];
        if goal_reached {
            rewards[EGO_AGENT_IDX] += 100.0;
        }
        if collision {
            rewards[EGO_AGENT_IDX] -= 1000.0;
        }

        StepOutcome {
            state: Self {
                config: self.config.clone(),
                hypotheses: self.hypotheses.clone(),
                other_agents: next_others,
                ego: next_ego,
                terminal: goal_reached || collision,
                collided: collision,
            },
            rewards,
            ego_cost: if collision { 1.0 } else { 0.0 },
        }
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }
}

impl HypothesisState for CrossingState {
    fn plan_action_current_hypothesis(
        &self,
        agent: AgentIdx,
        assignment: &HypothesisAssignment,
        rng: &mut ChaCha20Rng,
    ) -> ActionIdx {
        let hypothesis = assignment[&agent];
        self.hypotheses[hypothesis].act(self.distance_to_ego(agent - 1), rng)
    }

    fn hypothesis_probability(
        &self,
        hypothesis: HypothesisId,
        agent: AgentIdx,
        action: ActionIdx,
    ) -> Probability {
        self.hypotheses[hypothesis].probability(self.distance_to_ego(agent - 1), action)
    }

    fn hypothesis_prior(&self, _hypothesis: HypothesisId, _agent: AgentIdx) -> Probability {
        1.0 / self.hypotheses.len() as f64
    }

    fn num_hypotheses(&self, _agent: AgentIdx) -> usize {
        self.hypotheses.len()
    }

    fn last_action(&self, agent: AgentIdx) -> ActionIdx {
        if agent == EGO_AGENT_IDX {
            self.ego.last_action
        } else {
            self.other_agents[agent - 1].last_action
        }
    }
}
