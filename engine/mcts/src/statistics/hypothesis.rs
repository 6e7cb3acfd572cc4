//! Per-node statistic for another agent under hypothesis-based planning.
//!
//! The agent's action at a decision point is dictated by whichever hypothesis
//! the belief tracker sampled for the current iteration; this statistic only
//! records, per hypothesis, how often each action was selected from this
//! node. The counts feed diagnostics and posterior inspection.

use rand_chacha::ChaCha20Rng;
use std::collections::BTreeMap;

use planner_core::{ActionIdx, AgentIdx, HypothesisAssignment, HypothesisId, HypothesisState};

#[derive(Debug, Clone)]
pub struct HypothesisStatistic {
    agent: AgentIdx,

    /// Per hypothesis: how often each action was chosen from this node.
    selection_counts: BTreeMap<HypothesisId, BTreeMap<ActionIdx, u32>>,
}

impl HypothesisStatistic {
    pub fn new(agent: AgentIdx) -> Self {
        Self {
            agent,
            selection_counts: BTreeMap::new(),
        }
    }

    /// Action this agent takes under its currently assigned hypothesis.
    pub fn choose_next_action<S: HypothesisState>(
        &self,
        state: &S,
        assignment: &HypothesisAssignment,
        rng: &mut ChaCha20Rng,
    ) -> ActionIdx {
        state.plan_action_current_hypothesis(self.agent, assignment, rng)
    }

    /// Record that `action` was observed for `hypothesis` during
    /// backpropagation.
    pub fn update_statistics(&mut self, action: ActionIdx, hypothesis: HypothesisId) {
        *self
            .selection_counts
            .entry(hypothesis)
            .or_default()
            .entry(action)
            .or_insert(0) += 1;
    }

    /// Selection count of one (hypothesis, action) pair.
    pub fn count(&self, hypothesis: HypothesisId, action: ActionIdx) -> u32 {
        self.selection_counts
            .get(&hypothesis)
            .and_then(|actions| actions.get(&action))
            .copied()
            .unwrap_or(0)
    }

    /// Total selections recorded for one hypothesis.
    pub fn total_count(&self, hypothesis: HypothesisId) -> u32 {
        self.selection_counts
            .get(&hypothesis)
            .map(|actions| actions.values().sum())
            .unwrap_or(0)
    }

    #[inline]
    pub fn agent(&self) -> AgentIdx {
        self.agent
    }
}
