//! Randomness comparison against reference generators.

mod harness;
mod nist;

pub use harness::{RebootVulnerability, RngComparison, SourceResult};
pub use nist::{bits_from_bytes, monobit_frequency, runs_test};
