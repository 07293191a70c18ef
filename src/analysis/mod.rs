//! Entropy statistics and health scoring.
//!
//! This module provides the statistical estimators and the scoring
//! model used for both finished collection cycles and the live feed.
//! These are sanity checks, not cryptographic proofs of entropy.

mod health;
mod statistics;

pub use health::{
    CycleAssessment, HealthScorer, Penalty, FALLBACK_HEALTH, FALLBACK_SECURITY,
};
pub use statistics::{autocorrelation, mean_motion, min_entropy, shannon_entropy, EntropyStats};
