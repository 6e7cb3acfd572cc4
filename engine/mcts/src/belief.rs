//! Posterior tracking over hypothesis policies for other agents.
//!
//! The tracker lives with the episode runner and persists across planning
//! decisions: after every environment step it multiplies each hypothesis
//! weight by the likelihood of the action that agent was observed taking.
//! The search engine only borrows it to sample a hypothesis assignment per
//! iteration.

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeMap;
use tracing::warn;

use planner_core::{AgentIdx, HypothesisAssignment, HypothesisState, Probability, EGO_AGENT_IDX};

#[derive(Debug, Clone)]
pub struct BeliefTracker {
    /// Normalized posterior weight per hypothesis, per other agent.
    beliefs: BTreeMap<AgentIdx, Vec<f64>>,

    /// Fraction of each update replaced by the hypothesis prior; zero
    /// disables smoothing.
    prior_smoothing: f64,
}

impl BeliefTracker {
    /// Initialise beliefs for every other agent from the hypothesis priors.
    pub fn new<S: HypothesisState>(state: &S, prior_smoothing: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&prior_smoothing),
            "prior smoothing must lie in [0, 1]"
        );

        let mut beliefs = BTreeMap::new();
        for agent in state.agent_indices() {
            if agent == EGO_AGENT_IDX {
                continue;
            }
            let num_hypotheses = state.num_hypotheses(agent);
            assert!(
                num_hypotheses > 0,
                "agent {agent} has an empty hypothesis set"
            );
            let mut weights: Vec<f64> = (0..num_hypotheses)
                .map(|hypothesis| state.hypothesis_prior(hypothesis, agent))
                .collect();
            normalize_or_reset(&mut weights, agent);
            beliefs.insert(agent, weights);
        }

        Self {
            beliefs,
            prior_smoothing,
        }
    }

    /// Fold the observed transition into the posterior: for each other agent,
    /// weight each hypothesis by how likely it found the action the agent
    /// actually took.
    pub fn belief_update<S: HypothesisState>(&mut self, last_state: &S, current_state: &S) {
        for (agent, weights) in &mut self.beliefs {
            let observed_action = current_state.last_action(*agent);
            for (hypothesis, weight) in weights.iter_mut().enumerate() {
                let likelihood =
                    last_state.hypothesis_probability(hypothesis, *agent, observed_action);
                let prior = last_state.hypothesis_prior(hypothesis, *agent);
                *weight = (1.0 - self.prior_smoothing) * *weight * likelihood
                    + self.prior_smoothing * prior;
            }
            normalize_or_reset(weights, *agent);
        }
    }

    /// Sample one hypothesis per other agent from the current posterior. The
    /// assignment stays fixed for one search iteration; the tracker itself is
    /// not modified.
    pub fn sample_hypotheses(&self, rng: &mut ChaCha20Rng) -> HypothesisAssignment {
        self.beliefs
            .iter()
            .map(|(agent, weights)| (*agent, sample_categorical(weights, rng)))
            .collect()
    }

    /// Snapshot of the normalized posterior, for logging.
    pub fn beliefs(&self) -> &BTreeMap<AgentIdx, Vec<Probability>> {
        &self.beliefs
    }
}

/// Normalize weights in place; reset to uniform if all mass vanished (every
/// hypothesis assigned zero likelihood to the observed action).
fn normalize_or_reset(weights: &mut [f64], agent: AgentIdx) {
    let total: f64 = weights.iter().sum();
    assert!(total.is_finite(), "non-finite belief mass for agent {agent}");

    if total <= 0.0 {
        warn!(agent, "belief mass collapsed, resetting to uniform");
        let uniform = 1.0 / weights.len() as f64;
        weights.iter_mut().for_each(|w| *w = uniform);
    } else {
        weights.iter_mut().for_each(|w| *w /= total);
    }
}

fn sample_categorical(weights: &[f64], rng: &mut ChaCha20Rng) -> usize {
    let sample: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if sample < cumulative {
            return index;
        }
    }
    weights.len() - 1
}
