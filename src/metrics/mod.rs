//! Prometheus metrics exporter for engine monitoring.
//!
//! # Metrics Exposed
//!
//! ## Health Metrics
//! - `brownian_entropy_live_health` - Attack-aware live health score
//! - `brownian_entropy_cycle_health` - Health of the last finalized cycle
//! - `brownian_entropy_cycle_security` - Security rating of the last finalized cycle
//!
//! ## Live Statistics
//! - `brownian_entropy_shannon_bits` - Shannon entropy over the live window
//! - `brownian_entropy_min_entropy_bits` - Min-entropy over the live window
//! - `brownian_entropy_autocorrelation` - Lag-1 autocorrelation
//! - `brownian_entropy_avg_motion` - Mean displacement magnitude
//! - `brownian_entropy_live_window_bits` - Bits in the live window
//!
//! ## Control State
//! - `brownian_entropy_attack_mode` - Simulated attack code
//! - `brownian_entropy_drbg_fallback` - Fallback toggle
//! - `brownian_entropy_collecting` - Collection running
//!
//! ## Counters
//! - `brownian_entropy_cycles_total{outcome}` - Finalized cycles by outcome
//! - `brownian_entropy_sensor_cycles_total` - Sensor cycles ingested
//! - `brownian_entropy_sensor_faults_total` - Sensor faults handled
//!
//! # Example
//!
//! ```no_run
//! use brownian_entropy::engine::Engine;
//! use brownian_entropy::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let engine = Engine::default();
//!
//! registry.update(&MetricsSnapshot::from_engine(&engine, None));
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
