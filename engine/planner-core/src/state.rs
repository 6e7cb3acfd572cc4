//! State contract between environments and the search engine.
//!
//! Environments stay in their own crates and implement these traits; the
//! engine only sees the capability set below. All stochasticity inside
//! `execute` must draw from the RNG handle passed in, so a fixed seed
//! reproduces a search bit-exactly.

use rand_chacha::ChaCha20Rng;

use crate::types::{
    ActionIdx, AgentIdx, Cost, HypothesisAssignment, HypothesisId, JointAction, Probability,
    Reward,
};

/// Result of executing a joint action: the successor state, one reward per
/// agent (ego first), and the ego's single-step cost.
#[derive(Debug, Clone)]
pub struct StepOutcome<S> {
    pub state: S,
    pub rewards: Vec<Reward>,
    pub ego_cost: Cost,
}

/// Capability set every planning environment must provide.
pub trait MultiAgentState: Clone {
    /// All agent indices, ego (0) first.
    fn agent_indices(&self) -> Vec<AgentIdx>;

    /// Number of discrete actions available to `agent`. Must be positive.
    fn num_actions(&self, agent: AgentIdx) -> usize;

    /// Execute one joint action. `rewards` in the outcome must have one entry
    /// per agent, in `agent_indices()` order.
    fn execute(&self, joint_action: &JointAction, rng: &mut ChaCha20Rng) -> StepOutcome<Self>;

    fn is_terminal(&self) -> bool;
}

/// Extension for environments whose other agents follow one of a finite set
/// of candidate policies (hypotheses).
///
/// The currently assumed hypothesis per agent is sampled by the search once
/// per iteration and handed in explicitly; states stay free of search-time
/// bookkeeping.
pub trait HypothesisState: MultiAgentState {
    /// Action the given other agent would take under its currently assigned
    /// hypothesis.
    fn plan_action_current_hypothesis(
        &self,
        agent: AgentIdx,
        assignment: &HypothesisAssignment,
        rng: &mut ChaCha20Rng,
    ) -> ActionIdx;

    /// Likelihood of `action` for `agent` under hypothesis `hypothesis`,
    /// evaluated against this state.
    fn hypothesis_probability(
        &self,
        hypothesis: HypothesisId,
        agent: AgentIdx,
        action: ActionIdx,
    ) -> Probability;

    /// Prior weight of a hypothesis for an agent before any evidence.
    fn hypothesis_prior(&self, hypothesis: HypothesisId, agent: AgentIdx) -> Probability;

    /// Size of the hypothesis set for an agent.
    fn num_hypotheses(&self, agent: AgentIdx) -> usize;

    /// Action `agent` took during the transition into this state.
    fn last_action(&self, agent: AgentIdx) -> ActionIdx;
}
