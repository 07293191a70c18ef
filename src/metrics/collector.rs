//! Metrics collection and registry.

use crate::engine::Engine;
use crate::sensor::DriverStatus;
use parking_lot::Mutex;
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of engine state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Attack-aware live health score.
    pub live_health: u8,
    /// Health score of the last finalized cycle.
    pub last_health: Option<u8>,
    /// Security rating of the last finalized cycle.
    pub last_security: Option<u8>,
    /// Shannon entropy over the live bit window.
    pub shannon_entropy: f64,
    /// Min-entropy over the live bit window.
    pub min_entropy: f64,
    /// Lag-1 autocorrelation over the live bit window.
    pub autocorrelation: f64,
    /// Mean motion magnitude of the latest sensor cycle.
    pub avg_motion: f64,
    /// Bits currently in the live window.
    pub live_bits: usize,
    /// Numeric attack mode (0 = none).
    pub attack_mode: i64,
    /// Whether the DRBG fallback is enabled.
    pub drbg_fallback: bool,
    /// Whether a collection cycle is running.
    pub collecting: bool,
    /// Finalized cycles with collected data.
    pub normal_cycles: u64,
    /// Finalized cycles served by the fallback.
    pub fallback_cycles: u64,
    /// Finalized cycles with no output.
    pub blind_cycles: u64,
    /// Sensor cycles ingested.
    pub sensor_cycles: u64,
    /// Sensor faults seen by the driver.
    pub sensor_faults: u64,
}

/// Prometheus metrics registry for engine monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    // Health metrics
    live_health: IntGauge,
    last_health: IntGauge,
    last_security: IntGauge,

    // Live statistics
    shannon_entropy: Gauge,
    min_entropy: Gauge,
    autocorrelation: Gauge,
    avg_motion: Gauge,
    live_bits: IntGauge,

    // Control state
    attack_mode: IntGauge,
    drbg_fallback: IntGauge,
    collecting: IntGauge,

    // Counters
    cycles_total: IntCounterVec,
    sensor_cycles_total: IntCounter,
    sensor_faults_total: IntCounter,
    counter_sync: Mutex<()>,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all engine metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let live_health = IntGauge::new(
            "brownian_entropy_live_health",
            "Attack-aware live health score (0-100)",
        )?;
        let last_health = IntGauge::new(
            "brownian_entropy_cycle_health",
            "Health score of the last finalized cycle (-1 before the first)",
        )?;
        let last_security = IntGauge::new(
            "brownian_entropy_cycle_security",
            "Security rating of the last finalized cycle (-1 before the first)",
        )?;

        let shannon_entropy = Gauge::new(
            "brownian_entropy_shannon_bits",
            "Shannon entropy per bit over the live window",
        )?;
        let min_entropy = Gauge::new(
            "brownian_entropy_min_entropy_bits",
            "Min-entropy per bit over the live window",
        )?;
        let autocorrelation = Gauge::new(
            "brownian_entropy_autocorrelation",
            "Lag-1 autocorrelation over the live window",
        )?;
        let avg_motion = Gauge::new(
            "brownian_entropy_avg_motion",
            "Mean displacement magnitude of the latest sensor cycle",
        )?;
        let live_bits = IntGauge::new(
            "brownian_entropy_live_window_bits",
            "Bits currently held in the live window",
        )?;

        let attack_mode = IntGauge::new(
            "brownian_entropy_attack_mode",
            "Simulated attack (0=none, 1=freeze, 2=brightness, 3=pattern)",
        )?;
        let drbg_fallback = IntGauge::new(
            "brownian_entropy_drbg_fallback",
            "DRBG fallback enabled (1) or disabled (0)",
        )?;
        let collecting = IntGauge::new(
            "brownian_entropy_collecting",
            "Collection cycle running (1) or idle (0)",
        )?;

        let cycles_total = IntCounterVec::new(
            Opts::new(
                "brownian_entropy_cycles_total",
                "Finalized collection cycles by outcome",
            ),
            &["outcome"],
        )?;
        let sensor_cycles_total = IntCounter::new(
            "brownian_entropy_sensor_cycles_total",
            "Sensor cycles ingested",
        )?;
        let sensor_faults_total = IntCounter::new(
            "brownian_entropy_sensor_faults_total",
            "Sensor faults handled by the driver",
        )?;

        registry.register(Box::new(live_health.clone()))?;
        registry.register(Box::new(last_health.clone()))?;
        registry.register(Box::new(last_security.clone()))?;
        registry.register(Box::new(shannon_entropy.clone()))?;
        registry.register(Box::new(min_entropy.clone()))?;
        registry.register(Box::new(autocorrelation.clone()))?;
        registry.register(Box::new(avg_motion.clone()))?;
        registry.register(Box::new(live_bits.clone()))?;
        registry.register(Box::new(attack_mode.clone()))?;
        registry.register(Box::new(drbg_fallback.clone()))?;
        registry.register(Box::new(collecting.clone()))?;
        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(sensor_cycles_total.clone()))?;
        registry.register(Box::new(sensor_faults_total.clone()))?;

        // Materialize every outcome label so scrapes see zeros.
        for outcome in ["normal", "fallback", "blind"] {
            cycles_total.with_label_values(&[outcome]);
        }
        last_health.set(-1);
        last_security.set(-1);

        Ok(Self {
            registry,
            live_health,
            last_health,
            last_security,
            shannon_entropy,
            min_entropy,
            autocorrelation,
            avg_motion,
            live_bits,
            attack_mode,
            drbg_fallback,
            collecting,
            cycles_total,
            sensor_cycles_total,
            sensor_faults_total,
            counter_sync: Mutex::new(()),
        })
    }

    /// Updates all metrics from a snapshot of engine state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.live_health.set(i64::from(snapshot.live_health));
        if let Some(health) = snapshot.last_health {
            self.last_health.set(i64::from(health));
        }
        if let Some(security) = snapshot.last_security {
            self.last_security.set(i64::from(security));
        }

        self.shannon_entropy.set(snapshot.shannon_entropy);
        self.min_entropy.set(snapshot.min_entropy);
        self.autocorrelation.set(snapshot.autocorrelation);
        self.avg_motion.set(snapshot.avg_motion);
        self.live_bits.set(snapshot.live_bits as i64);

        self.attack_mode.set(snapshot.attack_mode);
        self.drbg_fallback.set(i64::from(snapshot.drbg_fallback));
        self.collecting.set(i64::from(snapshot.collecting));

        // Counters only move forward by the difference; read and increment
        // must not interleave between concurrent updates.
        let _guard = self.counter_sync.lock();
        for (outcome, total) in [
            ("normal", snapshot.normal_cycles),
            ("fallback", snapshot.fallback_cycles),
            ("blind", snapshot.blind_cycles),
        ] {
            advance(&self.cycles_total.with_label_values(&[outcome]), total);
        }
        advance(&self.sensor_cycles_total, snapshot.sensor_cycles);
        advance(&self.sensor_faults_total, snapshot.sensor_faults);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from the engine and, if running, the sensor driver.
    pub fn from_engine(engine: &Engine, driver: Option<&DriverStatus>) -> Self {
        let live = engine.get_live_stats();
        let counters = engine.counters();
        let attack = engine.attack_state();

        Self {
            live_health: live.health_score,
            last_health: counters.last_health,
            last_security: counters.last_security,
            shannon_entropy: live.entropy_stats.shannon_entropy,
            min_entropy: live.entropy_stats.min_entropy,
            autocorrelation: live.entropy_stats.autocorrelation,
            avg_motion: live.entropy_stats.avg_motion,
            live_bits: live.entropy_stats.bit_count,
            attack_mode: attack.mode.code(),
            drbg_fallback: attack.drbg_fallback,
            collecting: engine.is_collecting(),
            normal_cycles: counters.normal,
            fallback_cycles: counters.fallback,
            blind_cycles: counters.blind,
            sensor_cycles: counters.sensor_cycles,
            sensor_faults: driver.map_or(0, |d| d.faults),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::AttackMode;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            live_health: 85,
            last_health: Some(90),
            last_security: Some(97),
            attack_mode: 2,
            normal_cycles: 3,
            blind_cycles: 1,
            sensor_faults: 4,
            ..Default::default()
        };

        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("brownian_entropy_live_health 85"));
        assert!(output.contains("brownian_entropy_cycle_health 90"));
        assert!(output.contains("brownian_entropy_attack_mode 2"));
        assert!(output.contains("brownian_entropy_cycles_total{outcome=\"normal\"} 3"));
        assert!(output.contains("brownian_entropy_cycles_total{outcome=\"fallback\"} 0"));
        assert!(output.contains("brownian_entropy_sensor_faults_total 4"));
    }

    #[test]
    fn test_counters_never_decrease() {
        let registry = MetricsRegistry::new().unwrap();
        registry.update(&MetricsSnapshot {
            sensor_cycles: 10,
            ..Default::default()
        });
        registry.update(&MetricsSnapshot {
            sensor_cycles: 4,
            ..Default::default()
        });

        let output = registry.encode().unwrap();
        assert!(output.contains("brownian_entropy_sensor_cycles_total 10"));
    }

    #[test]
    fn test_concurrent_updates_match_totals() {
        let registry = std::sync::Arc::new(MetricsRegistry::new().unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = std::sync::Arc::clone(&registry);
                std::thread::spawn(move || {
                    for total in 1..=200 {
                        registry.update(&MetricsSnapshot {
                            normal_cycles: total,
                            sensor_cycles: total * 3,
                            ..Default::default()
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let output = registry.encode().unwrap();
        assert!(output.contains("brownian_entropy_cycles_total{outcome=\"normal\"} 200"));
        assert!(output.contains("brownian_entropy_sensor_cycles_total 600"));
    }

    #[test]
    fn test_metrics_encode_before_first_cycle() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("brownian_entropy_cycle_health -1"));
        assert!(output.contains("brownian_entropy_live_health"));
        assert!(output.contains("brownian_entropy_cycles_total"));
    }

    #[test]
    fn test_snapshot_from_engine() {
        let engine = Engine::default();
        engine.set_attack(AttackMode::Pattern);
        engine.set_drbg_mode(true);
        engine.start();
        engine.stop();

        let snapshot = MetricsSnapshot::from_engine(&engine, None);
        assert_eq!(snapshot.attack_mode, 3);
        assert!(snapshot.drbg_fallback);
        assert!(!snapshot.collecting);
        assert_eq!(snapshot.blind_cycles, 1);
        assert_eq!(snapshot.last_health, Some(0));
        assert_eq!(snapshot.sensor_faults, 0);
    }
}
