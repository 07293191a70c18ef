//! Sensor abstraction for motion capture.
//!
//! The optical tracker is treated as a black box producing, per cycle,
//! a list of 2-D displacement samples and a parallel bit stream. This
//! trait lets real hardware and the mock source be swapped freely.

use super::{SensorConfig, SensorCycle};
use crate::attack::AttackMode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use thiserror::Error;

/// Errors that can occur during sensor operations.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open sensor: {0}")]
    OpenFailed(String),
    #[error("failed to read cycle: {0}")]
    ReadFailed(String),
    #[error("displacement shape mismatch: {dx} dx samples vs {dy} dy samples")]
    ShapeMismatch { dx: usize, dy: usize },
    #[error("sensor disconnected")]
    Disconnected,
    #[error("sensor not initialized")]
    NotInitialized,
}

impl SensorError {
    /// True if retrying the read after a backoff may succeed.
    ///
    /// Everything else requires reopening the sensor.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SensorError::ReadFailed(_) | SensorError::ShapeMismatch { .. }
        )
    }
}

/// Trait for motion sensor implementations.
pub trait Sensor: Send {
    /// Opens and initializes the sensor with the given configuration.
    fn open(&mut self, config: &SensorConfig) -> Result<(), SensorError>;

    /// Produces one cycle, adapting the feed to the attack mode.
    fn read_cycle(&mut self, mode: AttackMode) -> Result<SensorCycle, SensorError>;

    /// Checks if the sensor is currently open.
    fn is_open(&self) -> bool;

    /// Closes the sensor and releases resources.
    fn close(&mut self);

    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Mock sensor that simulates Brownian feature motion.
///
/// Honours every attack mode the way a real tracker would react:
/// a frozen feed stops all motion and replays stale bits, a saturated
/// feed loses every feature, and a checkerboard yields motionless
/// features whose bits flip in lockstep.
#[derive(Debug)]
pub struct MockSensor {
    config: Option<SensorConfig>,
    motion: Option<Normal<f64>>,
    rng: StdRng,
    sequence: u64,
    tracked: usize,
    /// Bits from the last unmanipulated cycle.
    frozen_bits: Vec<u8>,
    pattern_phase: u8,
}

impl MockSensor {
    /// Creates a mock seeded from OS entropy.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Creates a reproducible mock.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            config: None,
            motion: None,
            rng,
            sequence: 0,
            tracked: 0,
            frozen_bits: Vec::new(),
            pattern_phase: 0,
        }
    }

    fn live_cycle(&mut self, config: &SensorConfig, motion: Normal<f64>) -> (Vec<f64>, Vec<f64>, Vec<u8>) {
        // Features occasionally drop out; re-detect when too few remain.
        self.tracked = (0..self.tracked).filter(|_| !self.rng.gen_bool(0.02)).count();
        if self.tracked < config.min_features {
            self.tracked = config.max_features;
        }

        let dx: Vec<f64> = (0..self.tracked).map(|_| motion.sample(&mut self.rng)).collect();
        let dy: Vec<f64> = (0..self.tracked).map(|_| motion.sample(&mut self.rng)).collect();
        let bits: Vec<u8> = (0..self.tracked).map(|_| self.rng.gen_range(0..=1)).collect();

        self.frozen_bits = bits.clone();
        (dx, dy, bits)
    }
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sensor for MockSensor {
    fn open(&mut self, config: &SensorConfig) -> Result<(), SensorError> {
        config
            .validate()
            .map_err(|e| SensorError::OpenFailed(e.to_string()))?;
        let motion = Normal::new(0.0, config.motion_std)
            .map_err(|e| SensorError::OpenFailed(e.to_string()))?;

        self.config = Some(config.clone());
        self.motion = Some(motion);
        self.sequence = 0;
        self.tracked = 0;
        tracing::info!(max_features = config.max_features, "MockSensor opened");
        Ok(())
    }

    fn read_cycle(&mut self, mode: AttackMode) -> Result<SensorCycle, SensorError> {
        let config = self.config.clone().ok_or(SensorError::NotInitialized)?;
        let motion = self.motion.ok_or(SensorError::NotInitialized)?;
        self.sequence += 1;

        let (dx, dy, bits) = match mode {
            AttackMode::None => self.live_cycle(&config, motion),
            AttackMode::Freeze => {
                let n = self.frozen_bits.len();
                (vec![0.0; n], vec![0.0; n], self.frozen_bits.clone())
            }
            AttackMode::Brightness => {
                self.tracked = 0;
                return Ok(SensorCycle::empty(self.sequence));
            }
            AttackMode::Pattern => {
                self.pattern_phase ^= 1;
                let n = config.max_features;
                (vec![0.0; n], vec![0.0; n], vec![self.pattern_phase; n])
            }
        };

        let features = dx.len();
        SensorCycle::new(dx, dy, bits, features, self.sequence)
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        self.config = None;
        self.motion = None;
        tracing::info!("MockSensor closed");
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
