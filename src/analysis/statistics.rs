//! Statistical estimators for entropy quality.
//!
//! These are sanity checks over short windows of harvested data,
//! not proofs of entropy quality. Every estimator returns a defined
//! neutral value (0.0) on degenerate input instead of failing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Summary statistics for a collection cycle or live window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntropyStats {
    /// Shannon entropy of the bit sequence (bits/symbol).
    pub shannon_entropy: f64,
    /// Min-entropy of the bit sequence (bits/symbol).
    pub min_entropy: f64,
    /// Lag-1 autocorrelation of the bit sequence.
    pub autocorrelation: f64,
    /// Number of bits the statistics were computed over.
    pub bit_count: usize,
    /// Mean displacement magnitude of the motion samples.
    pub avg_motion: f64,
}

impl EntropyStats {
    /// Computes all bit statistics over `bits` and attaches `avg_motion`.
    pub fn from_bits(bits: &[u8], avg_motion: f64) -> Self {
        Self {
            shannon_entropy: shannon_entropy(bits),
            min_entropy: min_entropy(bits),
            autocorrelation: autocorrelation(bits, 1),
            bit_count: bits.len(),
            avg_motion,
        }
    }
}

/// Counts occurrences of each distinct symbol.
fn symbol_counts<T: Eq + Hash>(seq: &[T]) -> HashMap<&T, usize> {
    let mut counts = HashMap::new();
    for symbol in seq {
        *counts.entry(symbol).or_insert(0) += 1;
    }
    counts
}

/// Shannon entropy H = -Σ p·log2(p) of the empirical symbol distribution.
///
/// Returns 0.0 for an empty sequence.
pub fn shannon_entropy<T: Eq + Hash>(seq: &[T]) -> f64 {
    if seq.is_empty() {
        return 0.0;
    }

    let n = seq.len() as f64;
    let h: f64 = symbol_counts(seq)
        .values()
        .map(|&count| {
            let p = count as f64 / n;
            -p * p.log2()
        })
        .sum();

    // A single-symbol sequence yields -0.0; normalize it.
    h.max(0.0)
}

/// Min-entropy -log2(max p) of the empirical symbol distribution.
///
/// Returns 0.0 for an empty sequence.
pub fn min_entropy<T: Eq + Hash>(seq: &[T]) -> f64 {
    let Some(&max_count) = symbol_counts(seq).values().max() else {
        return 0.0;
    };

    let max_prob = max_count as f64 / seq.len() as f64;
    (-max_prob.log2()).max(0.0)
}

/// Lag-k autocorrelation.
///
/// Numerator Σ(x_i-μ)(x_{i+lag}-μ) over the overlapping region,
/// denominator Σ(x_i-μ)² over the whole sequence. Returns 0.0 when
/// the sequence is not longer than `lag` or has zero variance.
pub fn autocorrelation<T: Copy + Into<f64>>(seq: &[T], lag: usize) -> f64 {
    if seq.len() <= lag {
        return 0.0;
    }

    let n = seq.len() as f64;
    let mean: f64 = seq.iter().map(|&x| x.into()).sum::<f64>() / n;

    let denominator: f64 = seq.iter().map(|&x| (x.into() - mean).powi(2)).sum();
    if denominator == 0.0 {
        return 0.0;
    }

    let numerator: f64 = seq
        .iter()
        .zip(seq.iter().skip(lag))
        .map(|(&a, &b)| (a.into() - mean) * (b.into() - mean))
        .sum();

    numerator / denominator
}

/// Mean Euclidean magnitude of the (dx, dy) displacement vectors.
///
/// Returns 0.0 when there are no samples.
pub fn mean_motion(dx: &[f64], dy: &[f64]) -> f64 {
    let n = dx.len().min(dy.len());
    if n == 0 {
        return 0.0;
    }

    let total: f64 = dx.iter().zip(dy).map(|(x, y)| x.hypot(*y)).sum();
    total / n as f64
}
