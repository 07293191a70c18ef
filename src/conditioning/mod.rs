//! Debiasing, pooling and seed hashing.
//!
//! Raw bits pass through a Von Neumann extractor into the per-cycle
//! pool. When a cycle finishes, the pool is hashed with a standard
//! 256-bit hash into seed material for key derivation.

mod debias;
mod hash;
mod pool;

pub use debias::VonNeumannDebiaser;
pub use hash::{hash_pool, HashAlgorithm, Seed};
pub use pool::{EntropyPool, PoolSnapshot};
