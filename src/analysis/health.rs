//! Health and security scoring.
//!
//! Two independent paths map statistics to a 0-100 health score:
//! the cycle-end path (run once per finished collection cycle) and
//! the live path, which is attack-aware. The two paths use different
//! motion thresholds.

use super::statistics::EntropyStats;
use crate::attack::AttackState;
use serde::{Deserialize, Serialize};

/// Health reported for a fallback cycle.
pub const FALLBACK_HEALTH: u8 = 95;
/// Security rating reported for a fallback cycle.
pub const FALLBACK_SECURITY: u8 = 90;

/// A single deduction applied by the cycle-end or live scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Penalty {
    /// Shannon entropy below 0.5.
    CriticalEntropy,
    /// Shannon entropy below 0.8.
    LowEntropy,
    /// |autocorrelation| above 0.1.
    StrongCorrelation,
    /// |autocorrelation| above 0.05.
    WeakCorrelation,
    /// Fewer than 10 debiased bits.
    SparseBits,
    /// Mean motion below 0.05.
    Stationary,
}

impl Penalty {
    /// Points deducted from the health score.
    pub fn points(self) -> i32 {
        match self {
            Penalty::CriticalEntropy => 50,
            Penalty::LowEntropy => 20,
            Penalty::StrongCorrelation => 40,
            Penalty::WeakCorrelation => 15,
            Penalty::SparseBits => 10,
            Penalty::Stationary => 50,
        }
    }
}

/// Result of scoring a finished cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleAssessment {
    /// Health score in [0, 100].
    pub health_score: u8,
    /// Security rating in [0, 100].
    pub security_rating: u8,
    /// Deductions that were applied, in evaluation order.
    pub penalties: Vec<Penalty>,
}

/// Maps statistics to health and security scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthScorer;

impl HealthScorer {
    /// Scores a cycle that collected data.
    pub fn score_cycle(stats: &EntropyStats) -> CycleAssessment {
        let mut penalties = Self::quality_penalties(stats);

        if stats.bit_count < 10 {
            penalties.push(Penalty::SparseBits);
        }
        if stats.avg_motion < 0.05 {
            penalties.push(Penalty::Stationary);
        }

        let raw_health = 100 - penalties.iter().map(|p| p.points()).sum::<i32>();
        let health_score = clamp_score(raw_health as f64);

        let mut security = (stats.shannon_entropy + stats.min_entropy) / 2.0 * 100.0;
        if health_score < 80 {
            security *= f64::from(health_score) / 100.0;
        }

        let assessment = CycleAssessment {
            health_score,
            security_rating: clamp_score(security),
            penalties,
        };

        tracing::debug!(
            health = assessment.health_score,
            security = assessment.security_rating,
            penalties = ?assessment.penalties,
            "Cycle scored"
        );

        assessment
    }

    /// Scores a cycle served by the DRBG fallback.
    pub fn score_fallback() -> CycleAssessment {
        CycleAssessment {
            health_score: FALLBACK_HEALTH,
            security_rating: FALLBACK_SECURITY,
            penalties: Vec::new(),
        }
    }

    /// Live health score over the rolling window.
    ///
    /// An active attack without fallback protection overrides the
    /// statistics-based formula entirely.
    pub fn score_live(stats: &EntropyStats, attack: &AttackState) -> u8 {
        if attack.is_compromised() {
            let mut health: i32 = if stats.avg_motion < 0.1 {
                0
            } else if stats.avg_motion < 0.5 {
                10
            } else {
                20
            };
            if stats.shannon_entropy < 0.3 {
                health = health.min(5);
            }
            return clamp_score(health as f64);
        }

        let deducted: i32 = Self::quality_penalties(stats)
            .iter()
            .map(|p| p.points())
            .sum();
        clamp_score(f64::from(100 - deducted))
    }

    /// Entropy and autocorrelation deductions shared by both paths.
    fn quality_penalties(stats: &EntropyStats) -> Vec<Penalty> {
        let mut penalties = Vec::with_capacity(4);

        if stats.shannon_entropy < 0.5 {
            penalties.push(Penalty::CriticalEntropy);
        } else if stats.shannon_entropy < 0.8 {
            penalties.push(Penalty::LowEntropy);
        }

        let ac = stats.autocorrelation.abs();
        if ac > 0.1 {
            penalties.push(Penalty::StrongCorrelation);
        } else if ac > 0.05 {
            penalties.push(Penalty::WeakCorrelation);
        }

        penalties
    }
}

/// Clamps to [0, 100] and truncates toward zero. NaN maps to 0.
fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0) as u8
}
