//! Search configuration parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by [`MctsConfig::validate`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("discount factor must lie in (0, 1], got {0}")]
    InvalidDiscount(f64),

    #[error("{which} bounds must satisfy lower < upper, got [{lower}, {upper}]")]
    InvalidBounds {
        which: &'static str,
        lower: f64,
        upper: f64,
    },

    #[error("at least one search iteration must be allowed")]
    EmptyIterationBudget,

    #[error("{name} must be non-negative, got {value}")]
    NegativeParameter { name: &'static str, value: f64 },

    #[error("tau gradient clip must be positive, got {0}")]
    InvalidTau(f64),

    #[error("progressive widening alpha must lie in [0, 1], got {0}")]
    InvalidWideningAlpha(f64),

    #[error("belief prior smoothing must lie in [0, 1], got {0}")]
    InvalidPriorSmoothing(f64),
}

/// Configuration for the plain UCB statistic (reward estimation and
/// progressive widening). The cost-constrained statistic derives two of these
/// internally with its own bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UctConfig {
    /// Exploration constant `c` in the UCB selection rule.
    pub exploration_constant: f64,

    /// Smallest return the environment can produce; used for normalization.
    pub lower_bound: f64,

    /// Largest return the environment can produce; used for normalization.
    pub upper_bound: f64,

    /// Progressive widening coefficient `k`: a node may expand while
    /// `expanded <= k * visits^alpha`.
    pub progressive_widening_k: f64,

    /// Progressive widening exponent `alpha`.
    pub progressive_widening_alpha: f64,
}

impl Default for UctConfig {
    fn default() -> Self {
        Self {
            exploration_constant: 0.7,
            lower_bound: -1010.0,
            upper_bound: 100.0,
            progressive_widening_k: 4.0,
            progressive_widening_alpha: 0.25,
        }
    }
}

/// Configuration for the ego agent's cost-constrained statistic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConstrainedConfig {
    /// Bound on expected discounted cost the returned policy must respect.
    pub cost_constraint: f64,

    pub reward_lower_bound: f64,
    pub reward_upper_bound: f64,
    pub cost_lower_bound: f64,
    pub cost_upper_bound: f64,

    /// Exploration constant of the two inner UCB estimators.
    pub exploration_constant: f64,

    /// Exploration constant `kappa` of the combined greedy selection rule.
    pub kappa: f64,

    /// Initial Lagrangian multiplier.
    pub lambda: f64,

    /// Base gradient step `g0` for the multiplier update; the effective step
    /// at iteration `i` is `g0 / (0.1 * i + 1)`.
    pub gradient_update_step: f64,

    /// Divisor `tau` of the multiplier clip
    /// `(reward_upper - reward_lower) / (tau * (1 - discount))`.
    pub tau_gradient_clip: f64,

    /// Width factor of the statistical band used to filter near-optimal
    /// actions before the policy is sampled.
    pub action_filter_factor: f64,
}

impl Default for CostConstrainedConfig {
    fn default() -> Self {
        Self {
            cost_constraint: 0.1,
            reward_lower_bound: -1010.0,
            reward_upper_bound: 100.0,
            cost_lower_bound: 0.0,
            cost_upper_bound: 1.0,
            exploration_constant: 0.7,
            kappa: 0.7,
            lambda: 1.0,
            gradient_update_step: 1.0,
            tau_gradient_clip: 1.0,
            action_filter_factor: 1.0,
        }
    }
}

/// Configuration of the hypothesis belief tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeliefConfig {
    /// Fraction of each posterior update replaced by the hypothesis prior.
    /// Zero disables smoothing.
    pub prior_smoothing: f64,
}

impl Default for BeliefConfig {
    fn default() -> Self {
        Self {
            prior_smoothing: 0.0,
        }
    }
}

/// Configuration of the random-rollout leaf estimator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Depth cap for rollouts that do not reach a terminal state.
    pub max_depth: u32,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self { max_depth: 20 }
    }
}

/// Configuration for one search invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// Reward discount factor. Costs are always accumulated undiscounted.
    pub discount_factor: f64,

    /// Iteration budget per search.
    pub max_iterations: u32,

    /// Wall-time budget per search in milliseconds. Checked between
    /// iterations; a running iteration is never aborted.
    pub max_search_time_ms: u64,

    /// Seed for the search RNG.
    pub random_seed: u64,

    pub uct: UctConfig,
    pub cost_constrained: CostConstrainedConfig,
    pub belief: BeliefConfig,
    pub rollout: RolloutConfig,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            discount_factor: 0.9,
            max_iterations: 2000,
            max_search_time_ms: 1000,
            random_seed: 1000,
            uct: UctConfig::default(),
            cost_constrained: CostConstrainedConfig::default(),
            belief: BeliefConfig::default(),
            rollout: RolloutConfig::default(),
        }
    }
}

impl MctsConfig {
    /// Create a fast config for testing.
    pub fn for_testing() -> Self {
        Self {
            max_iterations: 200,
            max_search_time_ms: 10_000,
            ..Self::default()
        }
    }

    /// Builder pattern: set the iteration budget.
    pub fn with_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n;
        self
    }

    /// Builder pattern: set the wall-time budget.
    pub fn with_search_time_ms(mut self, ms: u64) -> Self {
        self.max_search_time_ms = ms;
        self
    }

    /// Builder pattern: set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Builder pattern: set the reward discount factor.
    pub fn with_discount(mut self, gamma: f64) -> Self {
        self.discount_factor = gamma;
        self
    }

    /// Builder pattern: set the expected-cost bound.
    pub fn with_cost_constraint(mut self, constraint: f64) -> Self {
        self.cost_constrained.cost_constraint = constraint;
        self
    }

    /// Builder pattern: set the reward normalization bounds of the
    /// cost-constrained statistic.
    pub fn with_reward_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.cost_constrained.reward_lower_bound = lower;
        self.cost_constrained.reward_upper_bound = upper;
        self
    }

    /// Check the parameter block for values the search cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.discount_factor > 0.0 && self.discount_factor <= 1.0) {
            return Err(ConfigError::InvalidDiscount(self.discount_factor));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::EmptyIterationBudget);
        }

        let bounds = [
            ("uct", self.uct.lower_bound, self.uct.upper_bound),
            (
                "reward",
                self.cost_constrained.reward_lower_bound,
                self.cost_constrained.reward_upper_bound,
            ),
            (
                "cost",
                self.cost_constrained.cost_lower_bound,
                self.cost_constrained.cost_upper_bound,
            ),
        ];
        for (which, lower, upper) in bounds {
            if !(lower < upper) {
                return Err(ConfigError::InvalidBounds {
                    which,
                    lower,
                    upper,
                });
            }
        }

        let non_negative = [
            ("uct.exploration_constant", self.uct.exploration_constant),
            (
                "uct.progressive_widening_k",
                self.uct.progressive_widening_k,
            ),
            (
                "cost_constrained.exploration_constant",
                self.cost_constrained.exploration_constant,
            ),
            ("cost_constrained.kappa", self.cost_constrained.kappa),
            ("cost_constrained.lambda", self.cost_constrained.lambda),
            (
                "cost_constrained.gradient_update_step",
                self.cost_constrained.gradient_update_step,
            ),
            (
                "cost_constrained.action_filter_factor",
                self.cost_constrained.action_filter_factor,
            ),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ConfigError::NegativeParameter { name, value });
            }
        }

        if !(self.cost_constrained.tau_gradient_clip > 0.0) {
            return Err(ConfigError::InvalidTau(
                self.cost_constrained.tau_gradient_clip,
            ));
        }
        let alpha = self.uct.progressive_widening_alpha;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ConfigError::InvalidWideningAlpha(alpha));
        }
        let smoothing = self.belief.prior_smoothing;
        if !(0.0..=1.0).contains(&smoothing) {
            return Err(ConfigError::InvalidPriorSmoothing(smoothing));
        }

        Ok(())
    }
}
