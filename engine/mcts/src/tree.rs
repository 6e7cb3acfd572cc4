//! Search tree with arena allocation.
//!
//! Nodes live in a contiguous Vec and are referenced by NodeId indices; the
//! tree owns its nodes exclusively and is discarded with the search.

use planner_core::{JointAction, MultiAgentState};

use crate::config::MctsConfig;
use crate::node::{NodeId, StageNode};
use crate::statistics::OtherAgentMode;

#[derive(Debug)]
pub struct SearchTree<S> {
    /// Arena storing all nodes.
    nodes: Vec<StageNode<S>>,

    /// Root node index (always 0 after initialization).
    root: NodeId,
}

impl<S: MultiAgentState> SearchTree<S> {
    pub fn new(root_state: S, config: &MctsConfig, mode: OtherAgentMode) -> Self {
        let root_node = StageNode::new_root(root_state, config, mode);
        Self {
            nodes: vec![root_node],
            root: NodeId(0),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &StageNode<S> {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut StageNode<S> {
        &mut self.nodes[id.0 as usize]
    }

    /// Allocate a child node for `joint_action` out of `parent` and link it.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        joint_action: JointAction,
        state: S,
        config: &MctsConfig,
        mode: OtherAgentMode,
    ) -> NodeId {
        let depth = self.get(parent).depth + 1;
        let child = StageNode::new_child(parent, joint_action.clone(), state, depth, config, mode);

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(child);
        self.get_mut(parent).children.insert(joint_action, id);
        id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get statistics about the tree for debugging.
    pub fn stats(&self) -> TreeStats {
        let root = self.get(self.root);
        TreeStats {
            total_nodes: self.nodes.len(),
            root_visits: root.ego_statistic.reward_pairs().iter().map(|(_, p)| p.action_count).sum(),
            max_depth: self.nodes.iter().map(|node| node.depth).max().unwrap_or(0),
        }
    }
}

/// Statistics about a search tree.
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_visits: u32,
    pub max_depth: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use planner_core::{AgentIdx, StepOutcome};
    use rand_chacha::ChaCha20Rng;

    #[derive(Clone)]
    struct SoloState(u32);

    impl MultiAgentState for SoloState {
        fn agent_indices(&self) -> Vec<AgentIdx> {
            vec![0]
        }

        fn num_actions(&self, _agent: AgentIdx) -> usize {
            2
        }

        fn execute(&self, _joint: &JointAction, _rng: &mut ChaCha20Rng) -> StepOutcome<Self> {
            StepOutcome {
                state: SoloState(self.0 + 1),
                rewards: vec![0.0],
                ego_cost: 0.0,
            }
        }

        fn is_terminal(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_new_tree_has_root_only() {
        let tree = SearchTree::new(SoloState(0), &MctsConfig::for_testing(), OtherAgentMode::Uct);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), NodeId(0));
        assert!(tree.get(tree.root()).parent.is_none());
        assert_eq!(tree.get(tree.root()).depth, 0);
    }

    #[test]
    fn test_add_child_links_parent() {
        let config = MctsConfig::for_testing();
        let mut tree = SearchTree::new(SoloState(0), &config, OtherAgentMode::Uct);

        let joint = JointAction::new(vec![1]);
        let child_id = tree.add_child(tree.root(), joint.clone(), SoloState(1), &config, OtherAgentMode::Uct);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(tree.root()).child(&joint), Some(child_id));
        assert_eq!(tree.get(child_id).parent, tree.root());
        assert_eq!(tree.get(child_id).depth, 1);
        assert_eq!(tree.get(child_id).joint_action.as_ref(), Some(&joint));
    }

    #[test]
    fn test_tree_stats_track_depth() {
        let config = MctsConfig::for_testing();
        let mut tree = SearchTree::new(SoloState(0), &config, OtherAgentMode::Uct);

        let child = tree.add_child(
            tree.root(),
            JointAction::new(vec![0]),
            SoloState(1),
            &config,
            OtherAgentMode::Uct,
        );
        tree.add_child(
            child,
            JointAction::new(vec![1]),
            SoloState(2),
            &config,
            OtherAgentMode::Uct,
        );

        let stats = tree.stats();
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.max_depth, 2);
    }
}
