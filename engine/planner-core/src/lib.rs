//! Core traits and types for multi-agent planning environments
//!
//! This crate provides the fundamental abstractions consumed by the search
//! engine:
//! - `MultiAgentState`: capability set every environment must offer
//!   (joint-action execution, terminal test, action counts)
//! - `HypothesisState`: extension for environments whose other agents follow
//!   one of a finite set of candidate policies
//! - `JointAction` and the index/scalar types shared across crates

pub mod state;
pub mod types;

// Re-export main types for convenience
pub use state::{HypothesisState, MultiAgentState, StepOutcome};
pub use types::{
    ActionIdx, AgentIdx, Cost, HypothesisAssignment, HypothesisId, JointAction, Policy,
    Probability, Reward, EGO_AGENT_IDX,
};
