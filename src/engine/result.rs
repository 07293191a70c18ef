//! Outcome of a finished collection cycle.

use crate::analysis::{EntropyStats, Penalty};
use crate::derivation::DerivedKey;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Key reported when a cycle produced nothing.
pub const BLIND_KEY: &str = "SYSTEM BLIND";
/// Mode label attached to fallback cycles.
pub const FALLBACK_MODE: &str = "DRBG_FALLBACK";

/// A cycle that collected motion samples.
#[derive(Debug, Clone, Serialize)]
pub struct NormalCycle {
    /// Key derived from the pool.
    pub key: DerivedKey,
    /// Statistics over the debiased bits.
    pub entropy_stats: EntropyStats,
    /// Health score in [0, 100].
    pub health_score: u8,
    /// Security rating in [0, 100].
    pub security_rating: u8,
    /// Deductions behind the health score.
    pub penalties: Vec<Penalty>,
    /// Horizontal displacement samples.
    pub dx: Vec<f64>,
    /// Vertical displacement samples.
    pub dy: Vec<f64>,
    /// Running sum of `dx`.
    pub cum_x: Vec<f64>,
    /// Running sum of `dy`.
    pub cum_y: Vec<f64>,
    /// Squared distance from the origin per sample.
    pub msd: Vec<f64>,
    /// Raw bit count per sensor cycle.
    pub bits_per_frame: Vec<usize>,
    /// Finalization time.
    pub finalized_at: DateTime<Utc>,
}

/// A cycle with no samples, served from the retained seed.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackCycle {
    /// Key re-derived from the retained seed.
    pub key: DerivedKey,
    /// Fixed fallback health.
    pub health_score: u8,
    /// Fixed fallback security rating.
    pub security_rating: u8,
    /// Finalization time.
    pub finalized_at: DateTime<Utc>,
}

/// A cycle with no samples and no fallback available.
#[derive(Debug, Clone, Serialize)]
pub struct BlindCycle {
    /// Finalization time.
    pub finalized_at: DateTime<Utc>,
}

/// Result of [`Engine::stop`](super::Engine::stop).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleResult {
    /// Samples were collected.
    Normal(NormalCycle),
    /// Nothing collected; the fallback produced a key.
    Fallback(FallbackCycle),
    /// Nothing collected and no key produced.
    Blind(BlindCycle),
}

impl CycleResult {
    /// Health score in [0, 100].
    pub fn health_score(&self) -> u8 {
        match self {
            CycleResult::Normal(c) => c.health_score,
            CycleResult::Fallback(c) => c.health_score,
            CycleResult::Blind(_) => 0,
        }
    }

    /// Security rating in [0, 100].
    pub fn security_rating(&self) -> u8 {
        match self {
            CycleResult::Normal(c) => c.security_rating,
            CycleResult::Fallback(c) => c.security_rating,
            CycleResult::Blind(_) => 0,
        }
    }

    /// Derived key, if any.
    pub fn key(&self) -> Option<&DerivedKey> {
        match self {
            CycleResult::Normal(c) => Some(&c.key),
            CycleResult::Fallback(c) => Some(&c.key),
            CycleResult::Blind(_) => None,
        }
    }

    /// Hex key, or the blind sentinel.
    pub fn key_hex(&self) -> String {
        self.key()
            .map(DerivedKey::to_hex)
            .unwrap_or_else(|| BLIND_KEY.to_string())
    }

    /// Cycle statistics; all zero when nothing was collected.
    pub fn entropy_stats(&self) -> EntropyStats {
        match self {
            CycleResult::Normal(c) => c.entropy_stats,
            _ => EntropyStats::default(),
        }
    }

    /// `Some("DRBG_FALLBACK")` for fallback cycles.
    pub fn mode(&self) -> Option<&'static str> {
        match self {
            CycleResult::Fallback(_) => Some(FALLBACK_MODE),
            _ => None,
        }
    }

    /// When the cycle was finalized.
    pub fn finalized_at(&self) -> DateTime<Utc> {
        match self {
            CycleResult::Normal(c) => c.finalized_at,
            CycleResult::Fallback(c) => c.finalized_at,
            CycleResult::Blind(c) => c.finalized_at,
        }
    }

    /// Short outcome label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            CycleResult::Normal(_) => "normal",
            CycleResult::Fallback(_) => "fallback",
            CycleResult::Blind(_) => "blind",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blind_accessors() {
        let blind = CycleResult::Blind(BlindCycle {
            finalized_at: Utc::now(),
        });
        assert_eq!(blind.health_score(), 0);
        assert_eq!(blind.security_rating(), 0);
        assert_eq!(blind.key_hex(), BLIND_KEY);
        assert_eq!(blind.mode(), None);
        assert_eq!(blind.entropy_stats(), EntropyStats::default());
    }

    #[test]
    fn test_blind_serializes_with_outcome_tag() {
        let blind = CycleResult::Blind(BlindCycle {
            finalized_at: Utc::now(),
        });
        let json = serde_json::to_value(&blind).unwrap();
        assert_eq!(json["outcome"], "blind");
    }
}
