//! Pool hashing into a 256-bit seed.
//!
//! # Pool encoding
//!
//! The hashed byte string is, in order:
//!
//! 1. `len(dx)` as u64 little-endian, then every dx sample as f64 little-endian
//! 2. `len(dy)` as u64 little-endian, then every dy sample as f64 little-endian
//! 3. `len(bits)` as u64 little-endian, then one byte (0 or 1) per debiased bit
//!
//! The length prefixes keep section boundaries unambiguous.

use blake3::Hasher as Blake3Hasher;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Supported hash algorithms for seed derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 - widely deployed, conservative choice.
    #[default]
    Sha256,
    /// BLAKE3 - fast alternative with the same output size.
    Blake3,
}

/// A 32-byte seed hashed from an entropy pool.
///
/// The contents are never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed([u8; 32]);

impl Seed {
    /// Wraps raw seed bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the seed bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seed").finish_non_exhaustive()
    }
}

/// Incremental hasher over either algorithm.
enum PoolHasher {
    Sha256(Sha256),
    Blake3(Box<Blake3Hasher>),
}

impl PoolHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => PoolHasher::Sha256(Sha256::new()),
            HashAlgorithm::Blake3 => PoolHasher::Blake3(Box::new(Blake3Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            PoolHasher::Sha256(h) => h.update(data),
            PoolHasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> [u8; 32] {
        match self {
            PoolHasher::Sha256(h) => {
                let mut out = [0u8; 32];
                out.copy_from_slice(&h.finalize());
                out
            }
            PoolHasher::Blake3(h) => *h.finalize().as_bytes(),
        }
    }
}

/// Hashes pool contents into a seed using the documented encoding.
pub fn hash_pool(algorithm: HashAlgorithm, dx: &[f64], dy: &[f64], bits: &[u8]) -> Seed {
    let mut hasher = PoolHasher::new(algorithm);

    for samples in [dx, dy] {
        hasher.update(&(samples.len() as u64).to_le_bytes());
        for sample in samples {
            hasher.update(&sample.to_le_bytes());
        }
    }

    hasher.update(&(bits.len() as u64).to_le_bytes());
    hasher.update(bits);

    Seed(hasher.finalize())
}
