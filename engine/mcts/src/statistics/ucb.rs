//! Upper-confidence-bound statistic for one agent at one node.
//!
//! Tracks a running mean return per action plus visit counts. Action
//! selection runs in two phases: while progressive widening allows it,
//! uniformly random unexpanded actions are tried; afterwards the UCB rule
//! picks among the expanded ones. Values are normalized into [0, 1] by the
//! configured environment bounds before the exploration bonus is added.

use rand::Rng;
use rand_chacha::ChaCha20Rng;

use planner_core::ActionIdx;

use crate::config::UctConfig;

/// Visit count and running mean return for one action.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UcbPair {
    pub action_count: u32,
    pub action_value: f64,
}

/// Per-node, per-agent UCB estimator.
#[derive(Debug, Clone)]
pub struct UcbStatistic {
    /// Running mean of returns observed at this node (including the
    /// heuristic seed).
    value: f64,

    /// Return produced by the most recent update; parents consume it during
    /// backpropagation.
    latest_return: f64,

    /// Expanded actions and their statistics, keyed by action index.
    pairs: Vec<Option<UcbPair>>,

    total_node_visits: u32,

    /// Action indices that have not been expanded yet.
    unexpanded_actions: Vec<ActionIdx>,

    num_actions: usize,

    lower_bound: f64,
    upper_bound: f64,
    discount_factor: f64,
    exploration_constant: f64,
    progressive_widening_k: f64,
    progressive_widening_alpha: f64,
}

impl UcbStatistic {
    pub fn new(num_actions: usize, config: &UctConfig, discount_factor: f64) -> Self {
        assert!(num_actions > 0, "statistic requires a non-empty action set");
        assert!(
            config.lower_bound < config.upper_bound,
            "normalization bounds must satisfy lower < upper"
        );

        Self {
            value: 0.0,
            latest_return: 0.0,
            pairs: vec![None; num_actions],
            total_node_visits: 0,
            unexpanded_actions: (0..num_actions).collect(),
            num_actions,
            lower_bound: config.lower_bound,
            upper_bound: config.upper_bound,
            discount_factor,
            exploration_constant: config.exploration_constant,
            progressive_widening_k: config.progressive_widening_k,
            progressive_widening_alpha: config.progressive_widening_alpha,
        }
    }

    /// Pick the next action to simulate: a uniformly random unexpanded action
    /// while progressive widening allows more children, the UCB maximizer
    /// otherwise.
    pub fn choose_next_action(&mut self, rng: &mut ChaCha20Rng) -> ActionIdx {
        if self.requires_progressive_widening() {
            let slot = rng.gen_range(0..self.unexpanded_actions.len());
            let action = self.unexpanded_actions.swap_remove(slot);
            self.pairs[action] = Some(UcbPair::default());
            action
        } else {
            self.ucb_maximizing_action()
        }
    }

    /// Whether more children may be expanded:
    /// `expanded <= k * visits^alpha` while unexpanded actions remain.
    fn requires_progressive_widening(&self) -> bool {
        let widening_term = self.progressive_widening_k
            * f64::from(self.total_node_visits).powf(self.progressive_widening_alpha);
        let expanded = self.num_expanded_actions() as f64;
        expanded <= widening_term && self.num_expanded_actions() < self.num_actions
    }

    fn ucb_maximizing_action(&self) -> ActionIdx {
        let mut best_action = 0;
        let mut best_value = f64::MIN;
        for (action, pair) in self.expanded_pairs() {
            let ucb_value = if pair.action_count == 0 {
                f64::MAX
            } else {
                self.normalized_value(action)
                    + 2.0
                        * self.exploration_constant
                        * ((2.0 * f64::from(self.total_node_visits).ln())
                            / f64::from(pair.action_count))
                        .sqrt()
            };
            if ucb_value > best_value {
                best_value = ucb_value;
                best_action = action;
            }
        }
        best_action
    }

    /// Fold one backpropagated child return into the statistics of the action
    /// taken out of this node.
    pub fn update_statistics(&mut self, action: ActionIdx, step_reward: f64, child_return: f64) {
        self.latest_return = step_reward + self.discount_factor * child_return;
        assert!(
            self.latest_return.is_finite(),
            "non-finite return in backpropagation: step_reward={step_reward}, child_return={child_return}"
        );

        let pair = self.pairs[action].get_or_insert_with(UcbPair::default);
        pair.action_count += 1;
        pair.action_value += (self.latest_return - pair.action_value) / f64::from(pair.action_count);

        self.total_node_visits += 1;
        self.value += (self.latest_return - self.value) / f64::from(self.total_node_visits);
    }

    /// Seed this (leaf) statistic with the heuristic estimate.
    pub fn update_from_heuristic(&mut self, estimate: f64) {
        assert!(estimate.is_finite(), "non-finite heuristic estimate");
        self.value = estimate;
        self.latest_return = estimate;
        self.total_node_visits += 1;
    }

    /// Action with the highest raw mean return.
    pub fn best_action(&self) -> ActionIdx {
        let mut best = None;
        for (action, pair) in self.expanded_pairs() {
            let replace = match best {
                None => true,
                Some((_, value)) => pair.action_value > value,
            };
            if replace {
                best = Some((action, pair.action_value));
            }
        }
        best.expect("best_action requires at least one expanded action").0
    }

    /// Mean return of an action mapped into [0, 1] by the configured bounds.
    /// Leaving that interval is an invariant failure (misconfigured bounds or
    /// an environment producing out-of-range returns).
    pub fn normalized_value(&self, action: ActionIdx) -> f64 {
        let value = self.pair(action).action_value;
        let normalized = (value - self.lower_bound) / (self.upper_bound - self.lower_bound);
        assert!(
            (-1e-9..=1.0 + 1e-9).contains(&normalized),
            "normalized action value {normalized} outside [0, 1] for action {action}"
        );
        normalized
    }

    /// All actions expanded; selection is past the widening phase.
    pub fn policy_is_ready(&self) -> bool {
        self.unexpanded_actions.is_empty()
    }

    #[inline]
    pub fn latest_return(&self) -> f64 {
        self.latest_return
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn total_node_visits(&self) -> u32 {
        self.total_node_visits
    }

    #[inline]
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    #[inline]
    pub fn num_expanded_actions(&self) -> usize {
        self.num_actions - self.unexpanded_actions.len()
    }

    /// Statistics of one action; unexpanded actions read as (0, 0.0).
    #[inline]
    pub fn pair(&self, action: ActionIdx) -> UcbPair {
        self.pairs[action].unwrap_or_default()
    }

    /// Expanded actions with their statistics, in action order.
    pub fn expanded_pairs(&self) -> impl Iterator<Item = (ActionIdx, UcbPair)> + '_ {
        self.pairs
            .iter()
            .enumerate()
            .filter_map(|(action, pair)| pair.map(|p| (action, p)))
    }

    #[inline]
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    #[inline]
    pub fn upper_bound(&self) -> f64 {
        self.upper_bound
    }
}
