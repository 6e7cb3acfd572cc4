//! Per-node, per-agent statistics.
//!
//! The ego agent always carries a [`CostConstrainedStatistic`]. Other agents
//! carry one of two variants depending on how the search was invoked: a plain
//! [`UcbStatistic`] when their behavior is searched like the ego's, or a
//! [`HypothesisStatistic`] when their actions come from belief-sampled
//! candidate policies.

pub mod cost_constrained;
pub mod hypothesis;
pub mod ucb;

pub use cost_constrained::{CostConstrainedStatistic, PolicySampled};
pub use hypothesis::HypothesisStatistic;
pub use ucb::{UcbPair, UcbStatistic};

/// How other agents are modeled during a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherAgentMode {
    /// Other agents optimize their own reward through UCB selection.
    Uct,
    /// Other agents follow hypothesis policies sampled from a belief tracker.
    Hypothesis,
}

/// Statistic attached to one other agent at one node.
#[derive(Debug, Clone)]
pub enum OtherStatistic {
    Uct(UcbStatistic),
    Hypothesis(HypothesisStatistic),
}

impl OtherStatistic {
    /// Whether this agent's selection no longer demands expansion.
    /// Hypothesis-driven agents never gate descent: their action choice is
    /// dictated by the sampled policy, not by expansion state.
    pub fn policy_is_ready(&self) -> bool {
        match self {
            OtherStatistic::Uct(stat) => stat.policy_is_ready(),
            OtherStatistic::Hypothesis(_) => true,
        }
    }

    /// Return handed to the parent during backpropagation.
    pub fn latest_return(&self) -> f64 {
        match self {
            OtherStatistic::Uct(stat) => stat.latest_return(),
            OtherStatistic::Hypothesis(_) => 0.0,
        }
    }

    /// Seed a leaf statistic with this agent's heuristic reward estimate.
    pub fn update_from_heuristic(&mut self, estimate: f64) {
        match self {
            OtherStatistic::Uct(stat) => stat.update_from_heuristic(estimate),
            OtherStatistic::Hypothesis(_) => {}
        }
    }
}
