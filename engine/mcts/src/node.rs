//! Search tree node.
//!
//! Each node holds the state it was reached in, one statistic per agent (the
//! cost-constrained statistic for the ego, a tagged variant for the others),
//! and its children keyed by the joint action that produced them.

use std::collections::HashMap;

use planner_core::{JointAction, MultiAgentState, EGO_AGENT_IDX};

use crate::config::MctsConfig;
use crate::statistics::{
    CostConstrainedStatistic, HypothesisStatistic, OtherAgentMode, OtherStatistic, UcbStatistic,
};

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }
}

/// A node in the search tree: one decision stage for all agents jointly.
#[derive(Debug)]
pub struct StageNode<S> {
    /// Parent node index (NONE for root).
    pub parent: NodeId,

    /// Joint action that led here from the parent (None for root).
    pub joint_action: Option<JointAction>,

    /// Environment state at this node.
    pub state: S,

    pub depth: u32,

    pub is_terminal: bool,

    /// The ego agent's statistic.
    pub ego_statistic: CostConstrainedStatistic,

    /// One statistic per other agent, in agent-index order (agent 1 first).
    pub other_statistics: Vec<OtherStatistic>,

    /// Children keyed by the joint action that produced them.
    pub children: HashMap<JointAction, NodeId>,
}

impl<S: MultiAgentState> StageNode<S> {
    pub fn new_root(state: S, config: &MctsConfig, mode: OtherAgentMode) -> Self {
        Self::new(NodeId::NONE, None, state, 0, config, mode)
    }

    pub fn new_child(
        parent: NodeId,
        joint_action: JointAction,
        state: S,
        depth: u32,
        config: &MctsConfig,
        mode: OtherAgentMode,
    ) -> Self {
        Self::new(parent, Some(joint_action), state, depth, config, mode)
    }

    fn new(
        parent: NodeId,
        joint_action: Option<JointAction>,
        state: S,
        depth: u32,
        config: &MctsConfig,
        mode: OtherAgentMode,
    ) -> Self {
        let agents = state.agent_indices();
        assert!(
            agents.first() == Some(&EGO_AGENT_IDX),
            "agent indices must start with the ego agent"
        );

        let ego_statistic =
            CostConstrainedStatistic::new(state.num_actions(EGO_AGENT_IDX), config);
        let other_statistics = agents[1..]
            .iter()
            .map(|&agent| match mode {
                OtherAgentMode::Uct => OtherStatistic::Uct(UcbStatistic::new(
                    state.num_actions(agent),
                    &config.uct,
                    config.discount_factor,
                )),
                OtherAgentMode::Hypothesis => {
                    OtherStatistic::Hypothesis(HypothesisStatistic::new(agent))
                }
            })
            .collect();

        let is_terminal = state.is_terminal();
        Self {
            parent,
            joint_action,
            state,
            depth,
            is_terminal,
            ego_statistic,
            other_statistics,
            children: HashMap::new(),
        }
    }

    /// Every agent's statistic is past its expansion phase; descent may
    /// follow existing children.
    pub fn policy_is_ready(&self) -> bool {
        self.ego_statistic.policy_is_ready()
            && self
                .other_statistics
                .iter()
                .all(OtherStatistic::policy_is_ready)
    }

    /// Child reached by a joint action, if it was expanded before.
    pub fn child(&self, joint_action: &JointAction) -> Option<NodeId> {
        self.children.get(joint_action).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner_core::{AgentIdx, StepOutcome};
    use rand_chacha::ChaCha20Rng;

    #[derive(Clone)]
    struct TwoAgentState;

    impl MultiAgentState for TwoAgentState {
        fn agent_indices(&self) -> Vec<AgentIdx> {
            vec![0, 1]
        }

        fn num_actions(&self, agent: AgentIdx) -> usize {
            if agent == 0 {
                3
            } else {
                2
            }
        }

        fn execute(&self, _joint: &JointAction, _rng: &mut ChaCha20Rng) -> StepOutcome<Self> {
            StepOutcome {
                state: TwoAgentState,
                rewards: vec![0.0, 0.0],
                ego_cost: 0.0,
            }
        }

        fn is_terminal(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_node_id_none() {
        assert!(NodeId::NONE.is_none());
        assert!(!NodeId::NONE.is_some());
        assert!(NodeId(0).is_some());
    }

    #[test]
    fn test_root_node_statistics_per_mode() {
        let config = MctsConfig::for_testing();

        let uct = StageNode::new_root(TwoAgentState, &config, OtherAgentMode::Uct);
        assert!(matches!(uct.other_statistics[0], OtherStatistic::Uct(_)));

        let hyp = StageNode::new_root(TwoAgentState, &config, OtherAgentMode::Hypothesis);
        assert!(matches!(
            hyp.other_statistics[0],
            OtherStatistic::Hypothesis(_)
        ));
        assert_eq!(hyp.other_statistics.len(), 1);
        assert_eq!(hyp.ego_statistic.num_actions(), 3);
    }

    #[test]
    fn test_hypothesis_agents_never_gate_descent() {
        let config = MctsConfig::for_testing();
        let node = StageNode::new_root(TwoAgentState, &config, OtherAgentMode::Hypothesis);

        // Ego still has unexpanded actions, so the node is not ready even
        // though the hypothesis statistic always is.
        assert!(node.other_statistics[0].policy_is_ready());
        assert!(!node.policy_is_ready());
    }
}
