//! Motion sensor input and the producer loop.
//!
//! The optical tracker is an external collaborator: it yields, per
//! cycle, displacement samples and extracted bits. This module defines
//! that contract, a mock implementation, configuration, and the thread
//! that drives the sensor with an explicit fault policy.

mod config;
mod cycle;
mod driver;
mod source;

pub use config::{
    ConfigError, EngineConfig, FaultPolicyConfig, FileConfig, OutputConfig, SensorConfig,
};
pub use cycle::SensorCycle;
pub use driver::{
    DriverStatus, FaultAction, FaultPolicy, SensorDriver, SensorLoop, SensorState,
    StatusHandle,
};
pub use source::{MockSensor, Sensor, SensorError};
