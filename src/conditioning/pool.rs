//! Per-cycle entropy pool.
//!
//! Accumulates the motion samples and bits of one collection cycle.
//! The pool is replaced wholesale when a cycle starts and is read
//! by moving its contents out when it finishes.

use super::debias::VonNeumannDebiaser;

/// Samples and bits gathered during one collection cycle.
#[derive(Debug, Clone, Default)]
pub struct EntropyPool {
    /// Horizontal displacement samples.
    dx: Vec<f64>,
    /// Vertical displacement samples, index-aligned with `dx`.
    dy: Vec<f64>,
    /// Raw extracted bits in arrival order.
    raw_bits: Vec<u8>,
    /// Von Neumann output.
    unbiased_bits: Vec<u8>,
    /// Raw bit count contributed by each sensor cycle.
    bits_per_frame: Vec<usize>,
}

/// Contents of a finished pool, moved out under the engine lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolSnapshot {
    /// Horizontal displacement samples.
    pub dx: Vec<f64>,
    /// Vertical displacement samples.
    pub dy: Vec<f64>,
    /// Raw extracted bits.
    pub raw_bits: Vec<u8>,
    /// Von Neumann output.
    pub unbiased_bits: Vec<u8>,
    /// Raw bit count per sensor cycle.
    pub bits_per_frame: Vec<usize>,
}

impl PoolSnapshot {
    /// True if no motion samples were collected.
    pub fn is_empty(&self) -> bool {
        self.dx.is_empty()
    }
}

impl EntropyPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one sensor cycle, debiasing its bits.
    ///
    /// `dx` and `dy` must be index-aligned; callers validate this
    /// when the cycle is constructed.
    pub fn record_cycle(
        &mut self,
        dx: &[f64],
        dy: &[f64],
        raw_bits: &[u8],
        debiaser: &mut VonNeumannDebiaser,
    ) {
        debug_assert_eq!(dx.len(), dy.len());

        self.dx.extend_from_slice(dx);
        self.dy.extend_from_slice(dy);
        self.raw_bits.extend_from_slice(raw_bits);
        let emitted = debiaser.process_into(raw_bits, &mut self.unbiased_bits);
        self.bits_per_frame.push(raw_bits.len());

        tracing::trace!(
            samples = dx.len(),
            raw = raw_bits.len(),
            emitted,
            pool_bits = self.unbiased_bits.len(),
            "Recorded cycle into pool"
        );
    }

    /// Number of motion samples collected.
    pub fn sample_count(&self) -> usize {
        self.dx.len()
    }

    /// Number of raw bits collected.
    pub fn raw_bit_count(&self) -> usize {
        self.raw_bits.len()
    }

    /// Number of debiased bits collected.
    pub fn unbiased_bit_count(&self) -> usize {
        self.unbiased_bits.len()
    }

    /// Consumes the pool, yielding its contents.
    pub fn into_snapshot(self) -> PoolSnapshot {
        PoolSnapshot {
            dx: self.dx,
            dy: self.dy,
            raw_bits: self.raw_bits,
            unbiased_bits: self.unbiased_bits,
            bits_per_frame: self.bits_per_frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_starts_empty() {
        let pool = EntropyPool::new();
        assert_eq!(pool.sample_count(), 0);
        assert!(pool.into_snapshot().is_empty());
    }

    #[test]
    fn test_record_cycle_appends_everything() {
        let mut pool = EntropyPool::new();
        let mut vn = VonNeumannDebiaser::new();

        pool.record_cycle(&[1.0, 2.0], &[0.5, -0.5], &[0, 1, 1], &mut vn);
        pool.record_cycle(&[3.0], &[1.5], &[0], &mut vn);

        let snap = pool.into_snapshot();
        assert_eq!(snap.dx, vec![1.0, 2.0, 3.0]);
        assert_eq!(snap.dy, vec![0.5, -0.5, 1.5]);
        assert_eq!(snap.raw_bits, vec![0, 1, 1, 0]);
        // (0,1) -> 1, then (1,0) completes across cycles -> 0
        assert_eq!(snap.unbiased_bits, vec![1, 0]);
        assert_eq!(snap.bits_per_frame, vec![3, 1]);
    }

    #[test]
    fn test_unbiased_never_exceeds_raw() {
        let mut pool = EntropyPool::new();
        let mut vn = VonNeumannDebiaser::new();
        for _ in 0..10 {
            pool.record_cycle(&[], &[], &[1, 0, 1, 0, 1], &mut vn);
        }
        assert!(pool.unbiased_bit_count() <= pool.raw_bit_count());
        assert!(pool.unbiased_bit_count() <= pool.raw_bit_count() / 2);
    }
}
