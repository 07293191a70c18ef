//! Sensor cycle loop with an explicit fault policy.
//!
//! Failures are classified instead of swallowed:
//!
//! - recoverable (failed read, misaligned samples): back off and retry,
//!   counting consecutive failures
//! - fatal for the current handle (disconnect, uninitialized), or too
//!   many consecutive recoverable failures: close and reopen the sensor
//! - too many failed reopen attempts: switch permanently to the mock
//!   source
//!
//! Every transition is a [`SensorState`] change and is logged.

use super::{FaultPolicyConfig, MockSensor, Sensor, SensorConfig, SensorError};
use crate::engine::Engine;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Observable state of the sensor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SensorState {
    /// Cycles are arriving normally.
    Streaming,
    /// Retrying after `failures` consecutive recoverable failures.
    Backoff { failures: u32 },
    /// Reopening the sensor.
    Reinitializing { attempt: u32 },
    /// Running on the mock source after giving up on hardware.
    Mock,
}

/// What the loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// Proceed with the next cycle.
    Continue,
    /// Sleep, then read again.
    Retry { delay: Duration },
    /// Close and reopen the sensor.
    Reinitialize,
    /// Replace the sensor with the mock source.
    SwitchToMock,
}

/// Tracks failures and decides on recovery steps.
#[derive(Debug, Clone)]
pub struct FaultPolicy {
    config: FaultPolicyConfig,
    state: SensorState,
    consecutive_failures: u32,
    reinit_attempts: u32,
    total_faults: u64,
}

impl FaultPolicy {
    /// Creates a policy in the streaming state.
    pub fn new(config: FaultPolicyConfig) -> Self {
        Self {
            config,
            state: SensorState::Streaming,
            consecutive_failures: 0,
            reinit_attempts: 0,
            total_faults: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Faults observed since creation.
    pub fn total_faults(&self) -> u64 {
        self.total_faults
    }

    /// Records a successful read.
    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
        self.reinit_attempts = 0;
        if self.state != SensorState::Mock && self.state != SensorState::Streaming {
            tracing::info!(previous = ?self.state, "Sensor recovered");
            self.state = SensorState::Streaming;
        }
    }

    /// Classifies a failed read.
    pub fn on_error(&mut self, err: &SensorError) -> FaultAction {
        self.total_faults += 1;

        if self.state == SensorState::Mock {
            return FaultAction::Retry {
                delay: self.backoff(),
            };
        }

        if !err.is_recoverable() {
            return self.begin_reinit();
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures > self.config.max_read_failures {
            return self.begin_reinit();
        }

        self.state = SensorState::Backoff {
            failures: self.consecutive_failures,
        };
        FaultAction::Retry {
            delay: self.backoff(),
        }
    }

    /// Records the outcome of a reopen attempt.
    pub fn on_reinit_result(&mut self, reopened: bool) -> FaultAction {
        if reopened {
            self.consecutive_failures = 0;
            self.state = SensorState::Streaming;
            FaultAction::Continue
        } else {
            self.begin_reinit()
        }
    }

    /// Marks the policy as running on the mock source.
    ///
    /// Call only once the mock has opened; until then the policy stays in
    /// `Reinitializing` and keeps asking for the switch.
    pub fn enter_mock(&mut self) {
        self.state = SensorState::Mock;
        self.consecutive_failures = 0;
    }

    fn begin_reinit(&mut self) -> FaultAction {
        self.reinit_attempts += 1;
        self.state = SensorState::Reinitializing {
            attempt: self.reinit_attempts,
        };
        if self.reinit_attempts > self.config.max_reinit_attempts {
            FaultAction::SwitchToMock
        } else {
            FaultAction::Reinitialize
        }
    }

    fn backoff(&self) -> Duration {
        Duration::from_millis(self.config.backoff_ms)
    }
}

/// Shared view of the loop for metrics and operators.
#[derive(Debug, Clone, Serialize)]
pub struct DriverStatus {
    /// Fault-policy state.
    pub state: SensorState,
    /// Name of the active sensor.
    pub source: &'static str,
    /// Cycles delivered to the engine.
    pub cycles: u64,
    /// Faults seen so far.
    pub faults: u64,
}

/// One sensor plus its fault policy, advanced one step at a time.
pub struct SensorLoop {
    sensor: Box<dyn Sensor>,
    config: SensorConfig,
    policy: FaultPolicy,
    cycles: u64,
}

impl SensorLoop {
    /// Opens `sensor`, falling back to the mock source if it cannot open.
    pub fn new(
        mut sensor: Box<dyn Sensor>,
        config: SensorConfig,
        fault: FaultPolicyConfig,
    ) -> Result<Self, SensorError> {
        let mut policy = FaultPolicy::new(fault);

        if let Err(e) = sensor.open(&config) {
            tracing::warn!(sensor = sensor.name(), error = %e, "Sensor failed to open, switching to mock");
            sensor = Box::new(MockSensor::new());
            sensor.open(&config)?;
            policy.enter_mock();
        }

        Ok(Self {
            sensor,
            config,
            policy,
            cycles: 0,
        })
    }

    /// Reads one cycle and feeds it to the engine.
    ///
    /// Returns how long the caller should wait before the next step.
    pub fn step(&mut self, engine: &Engine) -> Duration {
        let interval = Duration::from_millis(self.config.cycle_interval_ms);

        match self.sensor.read_cycle(engine.attack_mode()) {
            Ok(cycle) => {
                self.policy.on_success();
                engine.ingest_cycle(&cycle);
                self.cycles += 1;
                interval
            }
            Err(e) => {
                let action = self.policy.on_error(&e);
                tracing::warn!(
                    sensor = self.sensor.name(),
                    error = %e,
                    state = ?self.policy.state(),
                    "Sensor read failed"
                );
                self.apply(action)
            }
        }
    }

    fn apply(&mut self, mut action: FaultAction) -> Duration {
        loop {
            match action {
                FaultAction::Continue => return Duration::ZERO,
                FaultAction::Retry { delay } => return delay,
                FaultAction::Reinitialize => {
                    self.sensor.close();
                    let reopened = self.sensor.open(&self.config).is_ok();
                    tracing::info!(sensor = self.sensor.name(), reopened, "Sensor reinitialization");
                    action = self.policy.on_reinit_result(reopened);
                }
                FaultAction::SwitchToMock => {
                    tracing::warn!(
                        sensor = self.sensor.name(),
                        "Too many sensor failures, switching to mock source"
                    );
                    self.sensor.close();
                    let mut mock = MockSensor::new();
                    if let Err(e) = mock.open(&self.config) {
                        tracing::error!(error = %e, "Mock sensor failed to open");
                        return Duration::from_millis(self.config.cycle_interval_ms.max(100));
                    }
                    self.sensor = Box::new(mock);
                    self.policy.enter_mock();
                    return Duration::ZERO;
                }
            }
        }
    }

    /// Current loop status.
    pub fn status(&self) -> DriverStatus {
        DriverStatus {
            state: self.policy.state(),
            source: self.sensor.name(),
            cycles: self.cycles,
            faults: self.policy.total_faults(),
        }
    }
}

/// Shared, continuously refreshed [`DriverStatus`].
pub type StatusHandle = Arc<Mutex<DriverStatus>>;

/// Background thread running a [`SensorLoop`].
pub struct SensorDriver {
    running: Arc<AtomicBool>,
    status: StatusHandle,
    handle: Option<JoinHandle<()>>,
}

impl SensorDriver {
    /// Spawns the producer thread feeding `engine`.
    pub fn spawn(engine: Arc<Engine>, mut sensor_loop: SensorLoop) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let status = Arc::new(Mutex::new(sensor_loop.status()));

        let thread_running = Arc::clone(&running);
        let thread_status = Arc::clone(&status);
        let handle = std::thread::Builder::new()
            .name("sensor-loop".into())
            .spawn(move || {
                tracing::info!("Sensor loop started");
                while thread_running.load(Ordering::Relaxed) {
                    let wait = sensor_loop.step(&engine);
                    *thread_status.lock() = sensor_loop.status();
                    if !wait.is_zero() {
                        std::thread::sleep(wait);
                    }
                }
                tracing::info!("Sensor loop stopped");
            })?;

        Ok(Self {
            running,
            status,
            handle: Some(handle),
        })
    }

    /// Latest loop status.
    pub fn status(&self) -> DriverStatus {
        self.status.lock().clone()
    }

    /// Handle that keeps tracking the status after `self` moves.
    pub fn status_handle(&self) -> StatusHandle {
        Arc::clone(&self.status)
    }

    /// Signals the loop to stop and waits for it.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Sensor loop panicked");
            }
        }
    }
}

impl Drop for SensorDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
