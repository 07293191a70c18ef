//! One sensor cycle of motion samples and extracted bits.

use super::SensorError;
use std::time::Instant;

/// Output of a single sensor cycle.
///
/// Displacement samples are index-aligned: `dx()[i]` and `dy()[i]`
/// belong to the same tracked feature. This is checked on construction.
#[derive(Clone)]
pub struct SensorCycle {
    /// Horizontal displacement per tracked feature.
    dx: Vec<f64>,
    /// Vertical displacement per tracked feature.
    dy: Vec<f64>,
    /// Bits extracted this cycle.
    raw_bits: Vec<u8>,
    /// Number of features the tracker currently follows.
    feature_count: usize,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic sequence number.
    sequence: u64,
}

impl SensorCycle {
    /// Creates a cycle, rejecting misaligned displacement samples.
    pub fn new(
        dx: Vec<f64>,
        dy: Vec<f64>,
        raw_bits: Vec<u8>,
        feature_count: usize,
        sequence: u64,
    ) -> Result<Self, SensorError> {
        if dx.len() != dy.len() {
            return Err(SensorError::ShapeMismatch {
                dx: dx.len(),
                dy: dy.len(),
            });
        }

        Ok(Self {
            dx,
            dy,
            raw_bits,
            feature_count,
            timestamp: Instant::now(),
            sequence,
        })
    }

    /// A cycle with no tracked features.
    pub fn empty(sequence: u64) -> Self {
        Self {
            dx: Vec::new(),
            dy: Vec::new(),
            raw_bits: Vec::new(),
            feature_count: 0,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Horizontal displacements.
    #[inline]
    pub fn dx(&self) -> &[f64] {
        &self.dx
    }

    /// Vertical displacements, index-aligned with `dx`.
    #[inline]
    pub fn dy(&self) -> &[f64] {
        &self.dy
    }

    /// Extracted bits.
    #[inline]
    pub fn raw_bits(&self) -> &[u8] {
        &self.raw_bits
    }

    /// Tracked feature count, used as an activity proxy while idle.
    #[inline]
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// When the cycle was produced.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Per-sensor cycle number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns true if no displacement samples were produced.
    pub fn is_empty(&self) -> bool {
        self.dx.is_empty()
    }
}

impl std::fmt::Debug for SensorCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorCycle")
            .field("sequence", &self.sequence)
            .field("samples", &self.dx.len())
            .field("bits", &self.raw_bits.len())
            .field("features", &self.feature_count)
            .finish()
    }
}
