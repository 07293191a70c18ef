//! Sensor and application configuration.
//!
//! Settings load from a TOML file; every section falls back to its
//! defaults when omitted.

use crate::conditioning::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the motion sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Maximum number of tracked features per cycle.
    pub max_features: usize,
    /// Minimum tracked features before the tracker re-detects.
    pub min_features: usize,
    /// Delay between cycles in milliseconds.
    pub cycle_interval_ms: u64,
    /// Standard deviation of simulated per-feature displacement (pixels).
    pub motion_std: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            max_features: 20,
            min_features: 5,
            cycle_interval_ms: 50, // ~20 cycles/s
            motion_std: 1.5,
        }
    }
}

impl SensorConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_features == 0 || self.min_features > self.max_features {
            return Err(ConfigError::InvalidFeatureBudget);
        }
        if self.cycle_interval_ms > 10_000 {
            return Err(ConfigError::InvalidCycleInterval);
        }
        if !self.motion_std.is_finite() || self.motion_std < 0.0 {
            return Err(ConfigError::InvalidMotionScale);
        }
        Ok(())
    }
}

/// Sensor fault handling budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultPolicyConfig {
    /// Consecutive failed reads tolerated before reinitializing.
    pub max_read_failures: u32,
    /// Delay after a failed read, in milliseconds.
    pub backoff_ms: u64,
    /// Reinitialization attempts before switching to the mock source.
    pub max_reinit_attempts: u32,
}

impl Default for FaultPolicyConfig {
    fn default() -> Self {
        Self {
            max_read_failures: 10,
            backoff_ms: 1000,
            max_reinit_attempts: 3,
        }
    }
}

impl FaultPolicyConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_read_failures == 0 {
            return Err(ConfigError::InvalidFaultBudget);
        }
        Ok(())
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hash used to condense the pool into a seed.
    pub hash: HashAlgorithm,
    /// Initial state of the DRBG fallback toggle.
    pub drbg_fallback: bool,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Run collection cycles until interrupted.
    pub continuous: bool,
    /// Number of collection cycles if not continuous.
    pub cycles: u32,
    /// Time spent collecting per cycle, in milliseconds.
    pub collect_ms: u64,
    /// Bits per source for the comparison harness.
    pub compare_bits: usize,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            cycles: 1,
            collect_ms: 5000,
            compare_bits: 100_000,
            metrics_port: 9090,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid feature budget (need 0 < min_features <= max_features)")]
    InvalidFeatureBudget,
    #[error("invalid cycle interval (must be at most 10000 ms)")]
    InvalidCycleInterval,
    #[error("invalid motion scale (must be finite and non-negative)")]
    InvalidMotionScale,
    #[error("invalid fault budget (max_read_failures must be positive)")]
    InvalidFaultBudget,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[sensor]` section.
    #[serde(default)]
    pub sensor: SensorConfig,
    /// `[fault]` section.
    #[serde(default)]
    pub fault: FaultPolicyConfig,
    /// `[engine]` section.
    #[serde(default)]
    pub engine: EngineConfig,
    /// `[output]` section.
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.sensor.validate()?;
        config.fault.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(SensorConfig::default().validate().is_ok());
        assert!(FaultPolicyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_features_invalid() {
        let config = SensorConfig {
            max_features: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFeatureBudget)
        ));
    }

    #[test]
    fn test_sensor_section_keys() {
        let encoded = toml::to_string(&SensorConfig::default()).unwrap();
        let table: toml::Table = toml::from_str(&encoded).unwrap();
        let mut keys: Vec<_> = table.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["cycle_interval_ms", "max_features", "min_features", "motion_std"]
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [engine]
            hash = "blake3"
            drbg_fallback = true

            [output]
            cycles = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.hash, HashAlgorithm::Blake3);
        assert!(config.engine.drbg_fallback);
        assert_eq!(config.output.cycles, 3);
        assert_eq!(config.output.collect_ms, 5000);
        assert_eq!(config.sensor.max_features, 20);
        assert_eq!(config.fault.max_read_failures, 10);
    }

    #[test]
    fn test_invalid_toml_reports_parse_error() {
        assert!(matches!(
            FileConfig::from_toml("[engine]\nhash = \"md5\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        assert!(matches!(
            FileConfig::from_toml("[fault]\nmax_read_failures = 0"),
            Err(ConfigError::InvalidFaultBudget)
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FileConfig::from_file("/nonexistent/brownian.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
