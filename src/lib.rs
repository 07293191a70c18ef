//! Brownian Entropy Engine Library
//!
//! A physical entropy source driven by the Brownian-like motion of
//! tracked features in a video feed. Motion samples and extracted bits
//! are pooled per collection cycle, debiased, hashed into a seed and
//! expanded with ChaCha20 into a 256-bit key.
//!
//! # Architecture
//!
//! ```text
//! sensor thread ──► Engine::ingest_cycle ──► pool (+ Von Neumann) ──┐
//!                          │                                        │ stop()
//!                          └──► live windows ──► get_live_stats     ▼
//!                                                      hash → ChaCha20 → CycleResult
//! ```
//!
//! The sensor thread is the single producer. Control (`start`, `stop`,
//! attack mode, fallback toggle) and observation (`get_live_stats`,
//! `get_current_key`) may come from any thread.
//!
//! # Design Principles
//!
//! - **Fail-closed**: a cycle with no samples yields no key unless the
//!   DRBG fallback is enabled and a previous seed exists
//! - **Attack-aware**: live health collapses while a simulated attack is
//!   active without fallback protection
//! - **Uses standard primitives**: SHA-256/BLAKE3 for conditioning, ChaCha20 for derivation
//! - **No cryptographic claims**: statistical tests are sanity checks, not proofs
//!
//! # Example
//!
//! ```no_run
//! use brownian_entropy::{
//!     attack::AttackMode,
//!     engine::Engine,
//!     sensor::{MockSensor, Sensor, SensorConfig},
//! };
//!
//! let engine = Engine::default();
//! let mut sensor = MockSensor::new();
//! sensor.open(&SensorConfig::default()).unwrap();
//!
//! engine.start();
//! for _ in 0..100 {
//!     let cycle = sensor.read_cycle(AttackMode::None).unwrap();
//!     engine.ingest_cycle(&cycle);
//! }
//! let result = engine.stop();
//!
//! println!("key = {} (health {})", result.key_hex(), result.health_score());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod attack;
pub mod comparison;
pub mod conditioning;
pub mod derivation;
pub mod engine;
pub mod metrics;
pub mod sensor;

// Re-export commonly used types at crate root
pub use analysis::{EntropyStats, HealthScorer};
pub use attack::{AttackMode, AttackState};
pub use comparison::{RngComparison, SourceResult};
pub use conditioning::{HashAlgorithm, VonNeumannDebiaser};
pub use derivation::{DerivedKey, KeyDerivation};
pub use engine::{CycleResult, Engine, LiveStats};
pub use sensor::{EngineConfig, MockSensor, Sensor, SensorConfig, SensorCycle};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
