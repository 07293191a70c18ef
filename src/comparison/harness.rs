//! Side-by-side randomness comparison.
//!
//! Runs the same tests over this engine's derived output and a set of
//! reference generators. Each source is sampled twice; a source whose
//! two samples match would repeat itself after a restart.

use super::nist::{bits_from_bytes, monobit_frequency, runs_test};
use crate::engine::Engine;
use chrono::Utc;
use rand::rngs::{SmallRng, StdRng};
use rand::{RngCore, SeedableRng};
use rand_core::OsRng;
use serde::Serialize;
use std::fmt;

/// Whether two independent samples of a source repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebootVulnerability {
    /// Both samples were identical.
    Detected,
    /// The samples differed.
    Secure,
}

impl RebootVulnerability {
    fn from_samples(first: &[u8], second: &[u8]) -> Self {
        if first == second {
            RebootVulnerability::Detected
        } else {
            RebootVulnerability::Secure
        }
    }
}

impl fmt::Display for RebootVulnerability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebootVulnerability::Detected => f.write_str("DETECTED"),
            RebootVulnerability::Secure => f.write_str("SECURE"),
        }
    }
}

/// Test outcome for one generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceResult {
    /// Generator label.
    pub source: &'static str,
    /// Monobit frequency p-value.
    pub monobit_p: f64,
    /// Runs test p-value.
    pub runs_p: f64,
    /// Whether a restart would repeat the output.
    pub reboot_vulnerability: RebootVulnerability,
    /// Short description of the source.
    pub notes: &'static str,
}

impl SourceResult {
    fn evaluate(
        source: &'static str,
        notes: &'static str,
        first: &[u8],
        second: &[u8],
    ) -> Self {
        let bits = bits_from_bytes(first);
        let result = Self {
            source,
            monobit_p: monobit_frequency(&bits),
            runs_p: runs_test(&bits),
            reboot_vulnerability: RebootVulnerability::from_samples(first, second),
            notes,
        };
        tracing::debug!(
            source,
            monobit_p = result.monobit_p,
            runs_p = result.runs_p,
            reboot = %result.reboot_vulnerability,
            "Source evaluated"
        );
        result
    }
}

/// Comparison over a fixed number of bits per source.
///
/// The bit count is rounded down to whole bytes.
#[derive(Debug, Clone, Copy)]
pub struct RngComparison {
    n_bits: usize,
}

impl RngComparison {
    /// Creates a comparison over `n_bits` bits per source.
    pub fn new(n_bits: usize) -> Self {
        Self { n_bits }
    }

    /// Bytes drawn per sample.
    pub fn n_bytes(&self) -> usize {
        self.n_bits / 8
    }

    /// Evaluates every source in a fixed order.
    pub fn run(&self, engine: &Engine) -> Vec<SourceResult> {
        let n = self.n_bytes();
        let time_seed = Utc::now().timestamp().unsigned_abs();
        tracing::info!(n_bits = n * 8, time_seed, "Running generator comparison");

        let mut results = Vec::with_capacity(4);

        results.push(SourceResult::evaluate(
            "StdRng (ChaCha12)",
            "Deterministic if seeded with time",
            &seeded_bytes::<StdRng>(time_seed, n),
            &seeded_bytes::<StdRng>(time_seed, n),
        ));

        results.push(SourceResult::evaluate(
            "SmallRng (Xoshiro256++)",
            "Deterministic if seeded with time",
            &seeded_bytes::<SmallRng>(time_seed, n),
            &seeded_bytes::<SmallRng>(time_seed, n),
        ));

        results.push(SourceResult::evaluate(
            "OsRng (CSPRNG)",
            "OS-level CSPRNG",
            &os_bytes(n),
            &os_bytes(n),
        ));

        let (first, second, notes) = match (engine.expand_output(n), engine.expand_output(n)) {
            (Some(first), Some(second)) => (first, second, "Seeded by chaotic physical motion"),
            _ => {
                tracing::warn!("No key derived yet, substituting OS CSPRNG for engine output");
                (os_bytes(n), os_bytes(n), "No key derived yet; OS CSPRNG substituted")
            }
        };
        results.push(SourceResult::evaluate(
            "Brownian Entropy Engine",
            notes,
            &first,
            &second,
        ));

        results
    }
}

fn seeded_bytes<R: SeedableRng + RngCore>(seed: u64, n: usize) -> Vec<u8> {
    let mut rng = R::seed_from_u64(seed);
    let mut out = vec![0u8; n];
    rng.fill_bytes(&mut out);
    out
}

fn os_bytes(n: usize) -> Vec<u8> {
    let mut out = vec![0u8; n];
    OsRng.fill_bytes(&mut out);
    out
}
