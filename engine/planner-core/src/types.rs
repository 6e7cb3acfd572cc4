//! Shared index and scalar types.
//!
//! Agent 0 is always the ego agent: the planner returns an action for it and
//! tracks step costs only for it.

use std::collections::BTreeMap;

/// Index of a single-agent action, bounded by the state's per-agent action count.
pub type ActionIdx = usize;

/// Index of an agent; `EGO_AGENT_IDX` is the planning agent.
pub type AgentIdx = usize;

/// Identifier of one candidate policy attributed to another agent.
pub type HypothesisId = usize;

pub type Reward = f64;
pub type Cost = f64;
pub type Probability = f64;

/// Probability distribution over the full per-agent action domain.
/// Values sum to 1 within numerical tolerance.
pub type Policy = Vec<Probability>;

/// The agent whose action the planner returns.
pub const EGO_AGENT_IDX: AgentIdx = 0;

/// Hypothesis assignment sampled for one search iteration: which candidate
/// policy each other agent is assumed to follow while the iteration lasts.
pub type HypothesisAssignment = BTreeMap<AgentIdx, HypothesisId>;

/// One action per agent, ego first. Hashable so it can key a node's
/// children map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JointAction(Vec<ActionIdx>);

impl JointAction {
    pub fn new(actions: Vec<ActionIdx>) -> Self {
        Self(actions)
    }

    /// The ego agent's component.
    #[inline]
    pub fn ego(&self) -> ActionIdx {
        self.0[EGO_AGENT_IDX]
    }

    /// The component of an arbitrary agent.
    #[inline]
    pub fn of(&self, agent: AgentIdx) -> ActionIdx {
        self.0[agent]
    }

    #[inline]
    pub fn num_agents(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[ActionIdx] {
        &self.0
    }
}

impl From<Vec<ActionIdx>> for JointAction {
    fn from(actions: Vec<ActionIdx>) -> Self {
        Self::new(actions)
    }
}
