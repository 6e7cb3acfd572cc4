//! Cost-constrained statistic for the ego agent.
//!
//! Combines two UCB estimators (discounted reward, undiscounted cost) through
//! a Lagrangian multiplier. Selection filters actions whose combined score
//! lies within a count-based confidence band of the maximizer, then samples
//! from the solution of a one-constraint linear program over that feasible
//! set: the policy mixes the highest-cost and lowest-cost feasible actions so
//! its expected cost meets the constraint.

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use planner_core::{ActionIdx, Policy};

use crate::config::{MctsConfig, UctConfig};
use crate::statistics::ucb::{UcbPair, UcbStatistic};

/// Greedy selection output: the sampled action and the full distribution it
/// was drawn from.
pub type PolicySampled = (ActionIdx, Policy);

#[derive(Debug, Clone)]
pub struct CostConstrainedStatistic {
    reward_statistic: UcbStatistic,
    cost_statistic: UcbStatistic,

    /// Ego actions not yet expanded from this node.
    unexpanded_actions: Vec<ActionIdx>,

    /// Running mean of the single-step cost observed per action.
    mean_step_costs: Vec<f64>,

    num_actions: usize,

    kappa: f64,
    action_filter_factor: f64,
    cost_constraint: f64,
    gradient_update_step: f64,
    tau_gradient_clip: f64,
    discount_factor: f64,
}

impl CostConstrainedStatistic {
    pub fn new(num_actions: usize, config: &MctsConfig) -> Self {
        assert!(num_actions > 0, "statistic requires a non-empty action set");
        let cc = &config.cost_constrained;

        let reward_config = UctConfig {
            exploration_constant: cc.exploration_constant,
            lower_bound: cc.reward_lower_bound,
            upper_bound: cc.reward_upper_bound,
            ..config.uct.clone()
        };
        let cost_config = UctConfig {
            exploration_constant: cc.exploration_constant,
            lower_bound: cc.cost_lower_bound,
            upper_bound: cc.cost_upper_bound,
            ..config.uct.clone()
        };

        Self {
            reward_statistic: UcbStatistic::new(num_actions, &reward_config, config.discount_factor),
            // Risk is summed undiscounted.
            cost_statistic: UcbStatistic::new(num_actions, &cost_config, 1.0),
            unexpanded_actions: (0..num_actions).collect(),
            mean_step_costs: vec![0.0; num_actions],
            num_actions,
            kappa: cc.kappa,
            action_filter_factor: cc.action_filter_factor,
            cost_constraint: cc.cost_constraint,
            gradient_update_step: cc.gradient_update_step,
            tau_gradient_clip: cc.tau_gradient_clip,
            discount_factor: config.discount_factor,
        }
    }

    /// Pick the next ego action: uniform over unexpanded actions while any
    /// remain, the sampled greedy policy afterwards.
    pub fn choose_next_action(&mut self, lambda: f64, rng: &mut ChaCha20Rng) -> ActionIdx {
        if self.unexpanded_actions.is_empty() {
            self.greedy_policy(lambda, self.kappa, self.action_filter_factor, rng)
                .0
        } else {
            let slot = rng.gen_range(0..self.unexpanded_actions.len());
            self.unexpanded_actions.swap_remove(slot)
        }
    }

    /// All ego actions expanded from this node.
    pub fn policy_is_ready(&self) -> bool {
        self.unexpanded_actions.is_empty()
    }

    /// Sampled action for exploitation (no exploration bonus).
    pub fn best_action(&self, lambda: f64, rng: &mut ChaCha20Rng) -> ActionIdx {
        self.greedy_policy(lambda, 0.0, self.action_filter_factor, rng).0
    }

    /// Full distribution for exploitation (no exploration bonus).
    pub fn policy(&self, lambda: f64, rng: &mut ChaCha20Rng) -> Policy {
        self.greedy_policy(lambda, 0.0, self.action_filter_factor, rng).1
    }

    /// Combined-score selection: score, filter, solve the LP, sample.
    pub fn greedy_policy(
        &self,
        lambda: f64,
        kappa: f64,
        action_filter_factor: f64,
        rng: &mut ChaCha20Rng,
    ) -> PolicySampled {
        let scores = self.combined_scores(lambda, kappa);
        let feasible = self.filter_feasible_actions(&scores, action_filter_factor);
        self.solve_lp_and_sample(&feasible, rng)
    }

    /// `u(a) = reward_norm(a) - lambda * cost_norm(a) + kappa * sqrt(ln N / n_a)`
    /// with an unbounded exploration term for unvisited actions.
    fn combined_scores(&self, lambda: f64, kappa: f64) -> Vec<f64> {
        let total_visits = f64::from(self.reward_statistic.total_node_visits());
        (0..self.num_actions)
            .map(|action| {
                let count = self.reward_statistic.pair(action).action_count;
                let exploration = if count == 0 {
                    f64::MAX
                } else {
                    kappa * (total_visits.ln() / f64::from(count)).sqrt()
                };
                self.reward_statistic.normalized_value(action)
                    - lambda * self.cost_statistic.normalized_value(action)
                    + exploration
            })
            .collect()
    }

    /// Keep actions whose score lies within `factor * b(a)` of the maximum,
    /// where `b(a)` couples the visit counts of the action and the maximizer.
    fn filter_feasible_actions(&self, scores: &[f64], factor: f64) -> Vec<ActionIdx> {
        let count_band = |action: ActionIdx| -> f64 {
            let count = self.reward_statistic.pair(action).action_count;
            if count == 0 {
                f64::MAX
            } else {
                (f64::from(count).ln() / f64::from(count)).sqrt()
            }
        };

        let maximizing_action = scores
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(action, _)| action)
            .expect("scores cover at least one action");
        let max_value = scores[maximizing_action];
        let maximizer_band = count_band(maximizing_action);

        (0..self.num_actions)
            .filter(|&action| {
                let value_difference = (scores[action] - max_value).abs();
                value_difference <= factor * (count_band(action) + maximizer_band)
            })
            .collect()
    }

    /// One-constraint LP over the feasible set, solved in closed form: mix
    /// the highest-cost and lowest-cost feasible actions so the expected
    /// (normalized) cost meets the constraint, degenerating to a
    /// deterministic choice at the boundaries.
    fn solve_lp_and_sample(&self, feasible: &[ActionIdx], rng: &mut ChaCha20Rng) -> PolicySampled {
        assert!(!feasible.is_empty(), "feasible action set must not be empty");

        let mut highest_cost_action = feasible[0];
        let mut lowest_cost_action = feasible[0];
        for &action in feasible {
            if self.normalized_cost_value(action) > self.normalized_cost_value(highest_cost_action)
            {
                highest_cost_action = action;
                continue;
            }
            if self.normalized_cost_value(action) < self.normalized_cost_value(lowest_cost_action) {
                lowest_cost_action = action;
            }
        }

        let mut policy = vec![0.0; self.num_actions];
        if highest_cost_action == lowest_cost_action {
            policy[lowest_cost_action] = 1.0;
            return (lowest_cost_action, policy);
        }

        let highest_cost = self.normalized_cost_value(highest_cost_action);
        let lowest_cost = self.normalized_cost_value(lowest_cost_action);
        if lowest_cost >= self.cost_constraint {
            // Even the cheapest action overruns the constraint.
            policy[lowest_cost_action] = 1.0;
            (lowest_cost_action, policy)
        } else if highest_cost <= self.cost_constraint {
            // Every feasible action is affordable.
            policy[highest_cost_action] = 1.0;
            (highest_cost_action, policy)
        } else {
            let probability_highest =
                (self.cost_constraint - lowest_cost) / (highest_cost - lowest_cost);
            policy[highest_cost_action] = probability_highest;
            policy[lowest_cost_action] = 1.0 - probability_highest;

            let sample: f64 = rng.gen();
            if sample <= probability_highest {
                (highest_cost_action, policy)
            } else {
                (lowest_cost_action, policy)
            }
        }
    }

    /// Fold one backpropagated pair of child returns into both estimators.
    pub fn update_statistics(
        &mut self,
        action: ActionIdx,
        step_reward: f64,
        step_cost: f64,
        child_reward_return: f64,
        child_cost_return: f64,
    ) {
        self.reward_statistic
            .update_statistics(action, step_reward, child_reward_return);
        self.cost_statistic
            .update_statistics(action, step_cost, child_cost_return);

        let count = f64::from(self.cost_statistic.pair(action).action_count);
        self.mean_step_costs[action] += (step_cost - self.mean_step_costs[action]) / count;
    }

    /// Seed this (leaf) statistic with the heuristic's accumulated reward and
    /// cost estimates.
    pub fn update_from_heuristic(&mut self, reward_estimate: f64, cost_estimate: f64) {
        self.reward_statistic.update_from_heuristic(reward_estimate);
        self.cost_statistic.update_from_heuristic(cost_estimate);
    }

    /// Gradient step on the Lagrangian multiplier from the root statistic:
    /// move along the constraint violation of the current greedy action with
    /// a diminishing step size, then clip into the range justified by the
    /// reward scale.
    pub fn next_lambda(&self, current: f64, iteration: u32, rng: &mut ChaCha20Rng) -> f64 {
        let step = self.gradient_update_step / (0.1 * f64::from(iteration) + 1.0);
        let (sampled_action, _) = self.greedy_policy(current, 0.0, 0.0, rng);
        let gradient = self.normalized_cost_value(sampled_action) - self.cost_constraint;

        let clip_upper = (self.reward_statistic.upper_bound() - self.reward_statistic.lower_bound())
            / (self.tau_gradient_clip * (1.0 - self.discount_factor));
        let next = (current + step * gradient).clamp(0.0, clip_upper);

        debug!(
            current,
            next,
            gradient,
            sampled_action,
            "lagrange multiplier update"
        );
        next
    }

    /// Expected cost of a policy under the current cost estimates.
    pub fn expected_policy_cost(&self, policy: &Policy) -> f64 {
        (0..self.num_actions)
            .map(|action| policy[action] * self.normalized_cost_value(action))
            .sum()
    }

    #[inline]
    pub fn normalized_cost_value(&self, action: ActionIdx) -> f64 {
        self.cost_statistic.normalized_value(action)
    }

    #[inline]
    pub fn latest_reward_return(&self) -> f64 {
        self.reward_statistic.latest_return()
    }

    #[inline]
    pub fn latest_cost_return(&self) -> f64 {
        self.cost_statistic.latest_return()
    }

    /// Per-action reward statistics for diagnostics.
    pub fn reward_pairs(&self) -> Vec<(ActionIdx, UcbPair)> {
        self.reward_statistic.expanded_pairs().collect()
    }

    /// Per-action cost statistics for diagnostics.
    pub fn cost_pairs(&self) -> Vec<(ActionIdx, UcbPair)> {
        self.cost_statistic.expanded_pairs().collect()
    }

    #[inline]
    pub fn mean_step_cost(&self, action: ActionIdx) -> f64 {
        self.mean_step_costs[action]
    }

    #[inline]
    pub fn reward_value(&self) -> f64 {
        self.reward_statistic.value()
    }

    #[inline]
    pub fn cost_value(&self) -> f64 {
        self.cost_statistic.value()
    }

    #[inline]
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// Statistic with both actions fully expanded and pinned cost/reward
    /// means: reward via `rewards`, cost via `costs`, one visit per sample.
    fn stat_with_means(rewards: &[&[f64]], costs: &[&[f64]], constraint: f64) -> CostConstrainedStatistic {
        let mut config = MctsConfig::default().with_cost_constraint(constraint);
        config.cost_constrained.reward_lower_bound = 0.0;
        config.cost_constrained.reward_upper_bound = 1.0;
        let mut stat = CostConstrainedStatistic::new(rewards.len(), &config);
        let mut rng = ChaCha20Rng::seed_from_u64(0);

        // Drain the expansion phase first.
        for _ in 0..rewards.len() {
            let _ = stat.choose_next_action(0.0, &mut rng);
        }
        for (action, (action_rewards, action_costs)) in
            rewards.iter().zip(costs.iter()).enumerate()
        {
            for (r, c) in action_rewards.iter().zip(action_costs.iter()) {
                stat.update_statistics(action, *r, *c, 0.0, 0.0);
            }
        }
        stat
    }

    #[test]
    fn test_expansion_phase_covers_all_actions() {
        let mut stat = CostConstrainedStatistic::new(3, &MctsConfig::default());
        let mut rng = ChaCha20Rng::seed_from_u64(42);

        let mut seen: Vec<_> = (0..3).map(|_| stat.choose_next_action(0.5, &mut rng)).collect();
        seen.sort_unstable();

        assert_eq!(seen, vec![0, 1, 2]);
        assert!(stat.policy_is_ready());
    }

    // The LP tests below pin each action's mean with two identical samples:
    // a single visit gives the count band sqrt(ln 1 / 1) = 0, which would
    // collapse the feasible set to the maximizer alone.

    #[test]
    fn test_lp_deterministic_when_all_affordable() {
        // Costs 0.2 and 0.4, constraint 0.5: the high-cost action is still
        // affordable and gets all the mass.
        let stat = stat_with_means(
            &[&[0.6, 0.6], &[0.8, 0.8]],
            &[&[0.2, 0.2], &[0.4, 0.4]],
            0.5,
        );
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let (action, policy) = stat.greedy_policy(0.0, 0.0, 10.0, &mut rng);

        assert_eq!(action, 1);
        assert!((policy[1] - 1.0).abs() < 1e-12);
        assert!(policy[0].abs() < 1e-12);
    }

    #[test]
    fn test_lp_deterministic_when_nothing_affordable() {
        // Both actions overrun the constraint: all mass on the cheaper one,
        // regardless of reward.
        let stat = stat_with_means(
            &[&[1.0, 1.0], &[0.1, 0.1]],
            &[&[0.9, 0.9], &[0.7, 0.7]],
            0.5,
        );
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let (action, policy) = stat.greedy_policy(0.0, 0.0, 10.0, &mut rng);

        assert_eq!(action, 1);
        assert!((policy[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_lp_boundary_low_cost_equals_constraint() {
        let stat = stat_with_means(
            &[&[0.5, 0.5], &[0.9, 0.9]],
            &[&[0.3, 0.3], &[0.8, 0.8]],
            0.3,
        );
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        // lowest cost == constraint: deterministic on the low-cost action.
        let (action, policy) = stat.greedy_policy(0.0, 0.0, 10.0, &mut rng);
        assert_eq!(action, 0);
        assert!((policy[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_lp_boundary_high_cost_equals_constraint() {
        let stat = stat_with_means(
            &[&[0.5, 0.5], &[0.9, 0.9]],
            &[&[0.1, 0.1], &[0.3, 0.3]],
            0.3,
        );
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        // highest cost == constraint: deterministic on the high-cost action.
        let (action, policy) = stat.greedy_policy(0.0, 0.0, 10.0, &mut rng);
        assert_eq!(action, 1);
        assert!((policy[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_lp_mixes_to_meet_constraint() {
        let stat = stat_with_means(
            &[&[0.5, 0.5], &[0.9, 0.9]],
            &[&[0.1, 0.1], &[0.9, 0.9]],
            0.5,
        );
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let (_, policy) = stat.greedy_policy(0.0, 0.0, 10.0, &mut rng);

        // p_high = (0.5 - 0.1) / (0.9 - 0.1) = 0.5
        assert!((policy[1] - 0.5).abs() < 1e-9);
        assert!((policy[0] - 0.5).abs() < 1e-9);
        let total: f64 = policy.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!((stat.expected_policy_cost(&policy) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_policy_mass_only_on_feasible_set() {
        // Action 2 has a hopeless score and enough visits for a narrow band,
        // so it must be filtered out and receive zero mass.
        let stat = stat_with_means(
            &[&[0.9; 30], &[0.8; 30], &[0.0; 30]],
            &[&[0.2; 30], &[0.4; 30], &[0.9; 30]],
            0.5,
        );
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let (_, policy) = stat.greedy_policy(0.0, 0.0, 1.0, &mut rng);

        assert!(policy[2].abs() < 1e-12);
        let total: f64 = policy.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_step_costs_track_running_mean() {
        let stat = stat_with_means(&[&[0.0, 0.0]], &[&[1.0, 0.0]], 0.5);
        assert!((stat.mean_step_cost(0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_lambda_update_moves_toward_constraint() {
        // Single affordable action with cost 0.8 against constraint 0.3:
        // the multiplier must grow.
        let stat = stat_with_means(&[&[0.9]], &[&[0.8]], 0.3);
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let next = stat.next_lambda(0.0, 0, &mut rng);
        assert!(next > 0.0);

        // Non-decreasing while the sampled action keeps overrunning.
        let mut lambda = 0.0;
        for iteration in 0..20 {
            let next = stat.next_lambda(lambda, iteration, &mut rng);
            assert!(next >= lambda);
            lambda = next;
        }
    }

    #[test]
    fn test_lambda_clip_respects_reward_scale() {
        let stat = stat_with_means(&[&[0.9]], &[&[1.0]], 0.0);
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        // clip = (1 - 0) / (tau * (1 - 0.9)) = 10 with default tau = 1.
        let next = stat.next_lambda(1e9, 0, &mut rng);
        assert!(next <= 10.0 + 1e-9);
        assert!(next >= 0.0);
    }
}
