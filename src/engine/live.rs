//! Always-on live statistics.
//!
//! Runs on every sensor cycle regardless of collection state and keeps
//! short rolling windows for the polling endpoint. Nothing here is
//! reset by starting or stopping a collection cycle.

use super::ring::RingBuffer;
use crate::analysis::{mean_motion, EntropyStats, HealthScorer};
use crate::attack::AttackState;
use crate::sensor::SensorCycle;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Cycles kept in the bit-count and MSD windows.
pub const FRAME_WINDOW: usize = 60;
/// Raw bits kept for live statistics.
pub const BIT_WINDOW: usize = 256;
/// Standard deviation of the synthetic drift used when no features move.
pub const JITTER_STD: f64 = 0.5;

/// Non-blocking view of the live windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStats {
    /// Per-cycle bit counts (oldest first).
    pub bits_per_frame: Vec<usize>,
    /// Mean-squared displacement series (oldest first).
    pub msd: Vec<f64>,
    /// Statistics over the recent bit window.
    pub entropy_stats: EntropyStats,
    /// Attack-aware live health score.
    pub health_score: u8,
    /// Last finalized key or the initialization sentinel.
    pub key: String,
}

/// Rolling windows fed by every sensor cycle.
#[derive(Debug, Clone)]
pub struct LiveStatsAggregator {
    bits_per_frame: RingBuffer<usize>,
    msd: RingBuffer<f64>,
    recent_bits: RingBuffer<u8>,
    cum_x: f64,
    cum_y: f64,
    avg_motion: f64,
    jitter: SmallRng,
}

impl LiveStatsAggregator {
    /// Creates an aggregator with OS-seeded jitter.
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Creates an aggregator with reproducible jitter.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(jitter: SmallRng) -> Self {
        Self {
            bits_per_frame: RingBuffer::new(FRAME_WINDOW),
            msd: RingBuffer::new(FRAME_WINDOW),
            recent_bits: RingBuffer::new(BIT_WINDOW),
            cum_x: 0.0,
            cum_y: 0.0,
            avg_motion: 0.0,
            jitter,
        }
    }

    /// Folds one sensor cycle into the windows.
    ///
    /// While collecting, the bit-count series records extracted bits;
    /// while idle it records the tracked feature count as an activity
    /// proxy. A cycle without samples keeps the last measured motion.
    pub fn update(&mut self, cycle: &SensorCycle, collecting: bool) {
        let count = if collecting {
            cycle.raw_bits().len()
        } else {
            cycle.feature_count()
        };
        self.bits_per_frame.push(count);

        let (step_x, step_y) = if cycle.is_empty() {
            (self.drift(), self.drift())
        } else {
            let n = cycle.dx().len() as f64;
            self.avg_motion = mean_motion(cycle.dx(), cycle.dy());
            (
                cycle.dx().iter().sum::<f64>() / n,
                cycle.dy().iter().sum::<f64>() / n,
            )
        };
        self.cum_x += step_x;
        self.cum_y += step_y;
        self.msd.push(self.cum_x.powi(2) + self.cum_y.powi(2));

        self.recent_bits.extend_from_slice(cycle.raw_bits());
    }

    /// Statistics over the recent window.
    pub fn stats(&self) -> EntropyStats {
        self.capture().stats()
    }

    /// Cumulative displacement since the aggregator was created.
    pub fn cumulative_displacement(&self) -> (f64, f64) {
        (self.cum_x, self.cum_y)
    }

    /// Copies the windows without computing anything.
    pub fn capture(&self) -> LiveWindow {
        LiveWindow {
            bits_per_frame: self.bits_per_frame.to_vec(),
            msd: self.msd.to_vec(),
            recent_bits: self.recent_bits.to_vec(),
            avg_motion: self.avg_motion,
        }
    }

    /// Copies the windows and scores them against `attack`.
    pub fn snapshot(&self, attack: &AttackState, key: String) -> LiveStats {
        self.capture().score(attack, key)
    }

    fn drift(&mut self) -> f64 {
        let z: f64 = self.jitter.sample(StandardNormal);
        z * JITTER_STD
    }
}

impl Default for LiveStatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned copy of the live windows, scored after the engine lock is released.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveWindow {
    bits_per_frame: Vec<usize>,
    msd: Vec<f64>,
    recent_bits: Vec<u8>,
    avg_motion: f64,
}

impl LiveWindow {
    /// Statistics over the copied bit window.
    pub fn stats(&self) -> EntropyStats {
        EntropyStats::from_bits(&self.recent_bits, self.avg_motion)
    }

    /// Computes statistics and the attack-aware health score.
    pub fn score(self, attack: &AttackState, key: String) -> LiveStats {
        let stats = self.stats();
        LiveStats {
            bits_per_frame: self.bits_per_frame,
            msd: self.msd,
            entropy_stats: stats,
            health_score: HealthScorer::score_live(&stats, attack),
            key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::AttackMode;

    fn cycle(dx: Vec<f64>, dy: Vec<f64>, bits: Vec<u8>, features: usize) -> SensorCycle {
        SensorCycle::new(dx, dy, bits, features, 0).unwrap()
    }

    #[test]
    fn test_idle_uses_feature_count_proxy() {
        let mut live = LiveStatsAggregator::with_seed(1);
        live.update(&cycle(vec![1.0], vec![1.0], vec![1, 0, 1], 17), false);
        live.update(&cycle(vec![1.0], vec![1.0], vec![1, 0, 1], 17), true);

        let snap = live.snapshot(&AttackState::default(), String::new());
        assert_eq!(snap.bits_per_frame, vec![17, 3]);
    }

    #[test]
    fn test_msd_tracks_cumulative_mean_displacement() {
        let mut live = LiveStatsAggregator::with_seed(1);
        live.update(&cycle(vec![1.0, 3.0], vec![0.0, 0.0], vec![], 2), false);
        live.update(&cycle(vec![0.0], vec![2.0], vec![], 1), false);

        let snap = live.snapshot(&AttackState::default(), String::new());
        assert_eq!(snap.msd, vec![4.0, 8.0]);
        assert_eq!(live.cumulative_displacement(), (2.0, 2.0));
    }

    #[test]
    fn test_empty_cycle_still_extends_msd() {
        let mut live = LiveStatsAggregator::with_seed(9);
        for _ in 0..5 {
            live.update(&SensorCycle::empty(0), false);
        }
        let snap = live.snapshot(&AttackState::default(), String::new());
        assert_eq!(snap.msd.len(), 5);
        assert!(snap.msd.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert_eq!(snap.entropy_stats.avg_motion, 0.0);
    }

    #[test]
    fn test_empty_cycle_keeps_last_motion() {
        let mut live = LiveStatsAggregator::with_seed(5);
        live.update(&cycle(vec![1.0], vec![0.0], vec![1, 0, 1, 1, 0, 0, 1], 1), false);
        live.update(&SensorCycle::empty(1), false);

        let blinded = AttackState {
            mode: AttackMode::Brightness,
            drbg_fallback: false,
        };
        let snap = live.snapshot(&blinded, String::new());
        assert_eq!(snap.entropy_stats.avg_motion, 1.0);
        assert_eq!(snap.health_score, 20);
    }

    #[test]
    fn test_captured_window_scores_like_snapshot() {
        let mut live = LiveStatsAggregator::with_seed(6);
        live.update(&cycle(vec![0.5, -0.5], vec![1.0, 0.2], vec![0, 1, 1, 0, 1], 2), true);

        let attack = AttackState::default();
        let window = live.capture();
        assert_eq!(window.stats(), live.stats());
        assert_eq!(
            window.score(&attack, "k".into()),
            live.snapshot(&attack, "k".into())
        );
    }

    #[test]
    fn test_windows_are_bounded() {
        let mut live = LiveStatsAggregator::with_seed(2);
        for i in 0..100 {
            let bits = vec![(i % 2) as u8; 10];
            live.update(&cycle(vec![0.1; 10], vec![0.1; 10], bits, 10), true);
        }
        let snap = live.snapshot(&AttackState::default(), String::new());
        assert_eq!(snap.bits_per_frame.len(), FRAME_WINDOW);
        assert_eq!(snap.msd.len(), FRAME_WINDOW);
        assert_eq!(snap.entropy_stats.bit_count, BIT_WINDOW);
    }

    #[test]
    fn test_stats_recomputed_from_window() {
        let mut live = LiveStatsAggregator::with_seed(3);
        live.update(&cycle(vec![3.0], vec![4.0], vec![0, 1, 0, 1], 1), true);
        let stats = live.stats();
        assert!((stats.shannon_entropy - 1.0).abs() < 1e-12);
        assert!((stats.avg_motion - 5.0).abs() < 1e-12);
        assert_eq!(stats.bit_count, 4);
    }

    #[test]
    fn test_snapshot_scores_attack() {
        let mut live = LiveStatsAggregator::with_seed(4);
        live.update(&cycle(vec![0.0; 4], vec![0.0; 4], vec![1, 1, 1, 1], 4), true);

        let attacked = AttackState {
            mode: AttackMode::Freeze,
            drbg_fallback: false,
        };
        assert_eq!(live.snapshot(&attacked, String::new()).health_score, 0);
    }
}
