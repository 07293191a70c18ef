//! Collection controller.
//!
//! Owns all shared mutable state behind one mutex: the collection
//! mode, the pool and debiaser, the attack configuration, the retained
//! seed, the live aggregator and the last published key. The sensor
//! thread calls [`Engine::ingest_cycle`]; control and observer calls
//! come from any other thread.
//!
//! Finalization moves the pool out under the lock and does all
//! hashing and statistics after releasing it, so the producer never
//! waits on a cycle being finished.

use super::live::{LiveStats, LiveStatsAggregator};
use super::result::{BlindCycle, CycleResult, FallbackCycle, NormalCycle};
use crate::analysis::{mean_motion, EntropyStats, HealthScorer};
use crate::attack::{AttackMode, AttackModeError, AttackState};
use crate::comparison::{RngComparison, SourceResult};
use crate::conditioning::{EntropyPool, PoolSnapshot, Seed, VonNeumannDebiaser};
use crate::derivation::{DerivedKey, KeyDerivation};
use crate::sensor::{EngineConfig, SensorCycle};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Key reported before any cycle has produced one.
pub const INITIALIZING_KEY: &str = "INITIALIZING...";

/// Whether ingested cycles are being pooled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMode {
    /// Cycles only feed the live windows.
    #[default]
    Idle,
    /// Cycles are pooled for the next key.
    Collecting,
}

/// Running totals for observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleCounters {
    /// Cycles finalized from collected data.
    pub normal: u64,
    /// Cycles served from the retained seed.
    pub fallback: u64,
    /// Cycles that produced nothing.
    pub blind: u64,
    /// Sensor cycles ingested.
    pub sensor_cycles: u64,
    /// Health of the last finalized cycle.
    pub last_health: Option<u8>,
    /// Security rating of the last finalized cycle.
    pub last_security: Option<u8>,
}

impl CycleCounters {
    fn record(&mut self, result: &CycleResult) {
        match result {
            CycleResult::Normal(_) => self.normal += 1,
            CycleResult::Fallback(_) => self.fallback += 1,
            CycleResult::Blind(_) => self.blind += 1,
        }
        self.last_health = Some(result.health_score());
        self.last_security = Some(result.security_rating());
    }

    /// Total finalized cycles.
    pub fn finalized(&self) -> u64 {
        self.normal + self.fallback + self.blind
    }
}

#[derive(Debug)]
struct EngineState {
    mode: CollectionMode,
    pool: EntropyPool,
    debiaser: VonNeumannDebiaser,
    attack: AttackState,
    last_seed: Option<Seed>,
    live: LiveStatsAggregator,
    current_key: Option<DerivedKey>,
    counters: CycleCounters,
}

/// Concurrent entropy engine.
#[derive(Debug)]
pub struct Engine {
    state: Mutex<EngineState>,
    derivation: KeyDerivation,
}

impl Engine {
    /// Creates an idle engine.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_live(config, LiveStatsAggregator::new())
    }

    fn with_live(config: &EngineConfig, live: LiveStatsAggregator) -> Self {
        info!(hash = ?config.hash, drbg_fallback = config.drbg_fallback, "Engine created");
        Self {
            state: Mutex::new(EngineState {
                mode: CollectionMode::Idle,
                pool: EntropyPool::new(),
                debiaser: VonNeumannDebiaser::new(),
                attack: AttackState {
                    mode: AttackMode::None,
                    drbg_fallback: config.drbg_fallback,
                },
                last_seed: None,
                live,
                current_key: None,
                counters: CycleCounters::default(),
            }),
            derivation: KeyDerivation::new(config.hash),
        }
    }

    /// Begins a collection cycle with a fresh pool.
    ///
    /// Does nothing if a cycle is already running.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if state.mode == CollectionMode::Collecting {
            debug!("start() ignored, already collecting");
            return;
        }
        state.pool = EntropyPool::new();
        state.debiaser.clear();
        state.mode = CollectionMode::Collecting;
        info!("Collection started");
    }

    /// Ends the current cycle and finalizes whatever was pooled.
    ///
    /// Calling this while idle finalizes an empty pool.
    pub fn stop(&self) -> CycleResult {
        let (snapshot, attack, last_seed) = {
            let mut state = self.state.lock();
            state.mode = CollectionMode::Idle;
            let pool = std::mem::take(&mut state.pool);
            (pool.into_snapshot(), state.attack, state.last_seed.clone())
        };

        info!(
            samples = snapshot.dx.len(),
            raw_bits = snapshot.raw_bits.len(),
            unbiased_bits = snapshot.unbiased_bits.len(),
            "Collection stopped, finalizing"
        );

        let (result, new_seed) = if snapshot.is_empty() {
            (self.finalize_empty(attack, last_seed), None)
        } else {
            let seed = self.derivation.seed_from_pool(&snapshot);
            (self.finalize_pool(snapshot, &seed), Some(seed))
        };

        let mut state = self.state.lock();
        if let Some(seed) = new_seed {
            state.last_seed = Some(seed);
        }
        if let Some(key) = result.key() {
            state.current_key = Some(key.clone());
        }
        state.counters.record(&result);
        drop(state);

        info!(
            outcome = result.outcome(),
            health = result.health_score(),
            security = result.security_rating(),
            "Cycle finalized"
        );
        result
    }

    fn finalize_pool(&self, snapshot: PoolSnapshot, seed: &Seed) -> CycleResult {
        let avg_motion = mean_motion(&snapshot.dx, &snapshot.dy);
        let entropy_stats = EntropyStats::from_bits(&snapshot.unbiased_bits, avg_motion);
        let assessment = HealthScorer::score_cycle(&entropy_stats);
        let key = self.derivation.derive(seed);

        let cum_x = cumulative(&snapshot.dx);
        let cum_y = cumulative(&snapshot.dy);
        let msd = cum_x
            .iter()
            .zip(&cum_y)
            .map(|(x, y)| x * x + y * y)
            .collect();

        CycleResult::Normal(NormalCycle {
            key,
            entropy_stats,
            health_score: assessment.health_score,
            security_rating: assessment.security_rating,
            penalties: assessment.penalties,
            dx: snapshot.dx,
            dy: snapshot.dy,
            cum_x,
            cum_y,
            msd,
            bits_per_frame: snapshot.bits_per_frame,
            finalized_at: Utc::now(),
        })
    }

    fn finalize_empty(&self, attack: AttackState, last_seed: Option<Seed>) -> CycleResult {
        match last_seed {
            Some(seed) if attack.drbg_fallback => {
                let assessment = HealthScorer::score_fallback();
                info!("No samples collected, serving key from retained seed");
                CycleResult::Fallback(FallbackCycle {
                    key: self.derivation.derive(&seed),
                    health_score: assessment.health_score,
                    security_rating: assessment.security_rating,
                    finalized_at: Utc::now(),
                })
            }
            _ => {
                if attack.drbg_fallback {
                    warn!("DRBG fallback enabled but no seed has been retained yet");
                }
                warn!(attack = %attack.mode, "No samples collected, system blind");
                CycleResult::Blind(BlindCycle {
                    finalized_at: Utc::now(),
                })
            }
        }
    }

    /// Feeds one sensor cycle. Pooled only while collecting; the live
    /// windows are always updated.
    pub fn ingest_cycle(&self, cycle: &SensorCycle) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let collecting = state.mode == CollectionMode::Collecting;
        if collecting {
            state
                .pool
                .record_cycle(cycle.dx(), cycle.dy(), cycle.raw_bits(), &mut state.debiaser);
        }
        state.live.update(cycle, collecting);
        state.counters.sensor_cycles += 1;
    }

    /// Parses and applies an attack mode literal.
    ///
    /// Unknown literals leave the current mode untouched.
    pub fn set_attack_mode(&self, literal: &str) -> Result<AttackMode, AttackModeError> {
        let mode: AttackMode = literal.parse()?;
        self.set_attack(mode);
        Ok(mode)
    }

    /// Sets the attack mode.
    pub fn set_attack(&self, mode: AttackMode) {
        let previous = std::mem::replace(&mut self.state.lock().attack.mode, mode);
        if previous != mode {
            info!(from = %previous, to = %mode, "Attack mode changed");
        }
    }

    /// Enables or disables the DRBG fallback.
    pub fn set_drbg_mode(&self, enabled: bool) {
        self.state.lock().attack.drbg_fallback = enabled;
        info!(enabled, "DRBG fallback toggled");
    }

    /// Current attack mode.
    pub fn attack_mode(&self) -> AttackMode {
        self.state.lock().attack.mode
    }

    /// Current attack mode and fallback toggle.
    pub fn attack_state(&self) -> AttackState {
        self.state.lock().attack
    }

    /// Current collection mode.
    pub fn collection_mode(&self) -> CollectionMode {
        self.state.lock().mode
    }

    /// True while a cycle is running.
    pub fn is_collecting(&self) -> bool {
        self.collection_mode() == CollectionMode::Collecting
    }

    /// Copies the live windows with an attack-aware health score.
    pub fn get_live_stats(&self) -> LiveStats {
        let (window, attack, key) = {
            let state = self.state.lock();
            (
                state.live.capture(),
                state.attack,
                key_or_sentinel(state.current_key.as_ref()),
            )
        };
        window.score(&attack, key)
    }

    /// Hex of the last derived key, or `"INITIALIZING..."`.
    pub fn get_current_key(&self) -> String {
        key_or_sentinel(self.state.lock().current_key.as_ref())
    }

    /// Last derived key, if any.
    pub fn current_key(&self) -> Option<DerivedKey> {
        self.state.lock().current_key.clone()
    }

    /// Outcome and ingestion totals.
    pub fn counters(&self) -> CycleCounters {
        self.state.lock().counters
    }

    /// Expands the current key into `n_bytes` of ChaCha20 output.
    ///
    /// Returns `None` until a key has been derived.
    pub fn expand_output(&self, n_bytes: usize) -> Option<Vec<u8>> {
        let key = self.current_key()?;
        let seed = Seed::from_bytes(*key.as_bytes());
        Some(self.derivation.expand(&seed, n_bytes))
    }

    /// Runs the generator comparison over `n_bits` bits per source.
    pub fn compare_rng(&self, n_bits: usize) -> Vec<SourceResult> {
        RngComparison::new(n_bits).run(self)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn key_or_sentinel(key: Option<&DerivedKey>) -> String {
    key.map(DerivedKey::to_hex)
        .unwrap_or_else(|| INITIALIZING_KEY.to_string())
}

fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FALLBACK_HEALTH, FALLBACK_SECURITY};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn seeded_engine(config: EngineConfig) -> Engine {
        Engine::with_live(&config, LiveStatsAggregator::with_seed(7))
    }

    fn random_cycle(rng: &mut StdRng, n: usize) -> SensorCycle {
        let dx = (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let dy = (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect();
        let bits = (0..n).map(|_| rng.gen_range(0..=1)).collect();
        SensorCycle::new(dx, dy, bits, n, 0).unwrap()
    }

    fn collect_normal(engine: &Engine, rng: &mut StdRng, cycles: usize) -> CycleResult {
        engine.start();
        for _ in 0..cycles {
            engine.ingest_cycle(&random_cycle(rng, 5));
        }
        engine.stop()
    }

    #[test]
    fn test_initial_key_is_sentinel() {
        let engine = Engine::default();
        assert_eq!(engine.get_current_key(), INITIALIZING_KEY);
        assert_eq!(engine.get_live_stats().key, INITIALIZING_KEY);
        assert!(engine.current_key().is_none());
        assert!(engine.expand_output(8).is_none());
    }

    #[test]
    fn test_random_source_scores_healthy() {
        let mut healthy = 0;
        for trial in 0..40 {
            let engine = seeded_engine(EngineConfig::default());
            let mut rng = StdRng::seed_from_u64(1000 + trial);
            let result = collect_normal(&engine, &mut rng, 100);

            let key = result.key_hex();
            assert_eq!(key.len(), 64);
            assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
            assert_eq!(engine.get_current_key(), key);

            let stats = result.entropy_stats();
            assert!(stats.bit_count <= 250);
            if result.health_score() >= 80 && result.security_rating() >= 70 {
                healthy += 1;
            }
        }
        assert!(healthy >= 20, "only {healthy}/40 trials were healthy");
    }

    #[test]
    fn test_normal_cycle_series() {
        let engine = seeded_engine(EngineConfig::default());
        engine.start();
        engine.ingest_cycle(&SensorCycle::new(vec![1.0, 2.0], vec![0.0, 1.0], vec![0, 1], 2, 1).unwrap());
        engine.ingest_cycle(&SensorCycle::new(vec![-1.0], vec![1.0], vec![1], 1, 2).unwrap());

        match engine.stop() {
            CycleResult::Normal(cycle) => {
                assert_eq!(cycle.dx, vec![1.0, 2.0, -1.0]);
                assert_eq!(cycle.cum_x, vec![1.0, 3.0, 2.0]);
                assert_eq!(cycle.cum_y, vec![0.0, 1.0, 2.0]);
                assert_eq!(cycle.msd, vec![1.0, 10.0, 8.0]);
                assert_eq!(cycle.bits_per_frame, vec![2, 1]);
                assert_eq!(cycle.entropy_stats.bit_count, 1);
            }
            other => panic!("expected normal cycle, got {}", other.outcome()),
        }
    }

    #[test]
    fn test_empty_cycle_is_blind() {
        let engine = seeded_engine(EngineConfig::default());
        engine.set_attack(AttackMode::Brightness);
        engine.start();
        engine.ingest_cycle(&SensorCycle::empty(1));
        let result = engine.stop();

        assert!(matches!(result, CycleResult::Blind(_)));
        assert_eq!(result.health_score(), 0);
        assert_eq!(result.key_hex(), "SYSTEM BLIND");
        assert_eq!(result.mode(), None);
        assert_eq!(engine.get_current_key(), INITIALIZING_KEY);
    }

    #[test]
    fn test_blind_keeps_previous_key() {
        let engine = seeded_engine(EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        let first = collect_normal(&engine, &mut rng, 20);

        engine.start();
        let blind = engine.stop();
        assert!(matches!(blind, CycleResult::Blind(_)));
        assert_eq!(engine.get_current_key(), first.key_hex());
    }

    #[test]
    fn test_fallback_reuses_retained_seed() {
        let engine = seeded_engine(EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(5);
        let first = collect_normal(&engine, &mut rng, 20);
        assert!(matches!(first, CycleResult::Normal(_)));

        engine.set_drbg_mode(true);
        engine.set_attack(AttackMode::Brightness);
        engine.start();
        engine.ingest_cycle(&SensorCycle::empty(1));
        let fallback = engine.stop();

        assert!(matches!(fallback, CycleResult::Fallback(_)));
        assert_eq!(fallback.health_score(), FALLBACK_HEALTH);
        assert_eq!(fallback.security_rating(), FALLBACK_SECURITY);
        assert_eq!(fallback.mode(), Some("DRBG_FALLBACK"));
        assert_ne!(fallback.key_hex(), first.key_hex());
        assert_eq!(engine.get_current_key(), fallback.key_hex());
    }

    #[test]
    fn test_fallback_without_seed_is_blind() {
        let engine = seeded_engine(EngineConfig {
            drbg_fallback: true,
            ..EngineConfig::default()
        });
        engine.start();
        assert!(matches!(engine.stop(), CycleResult::Blind(_)));
    }

    #[test]
    fn test_idle_cycles_are_not_pooled() {
        let engine = seeded_engine(EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(11);
        engine.ingest_cycle(&random_cycle(&mut rng, 5));

        engine.start();
        assert!(matches!(engine.stop(), CycleResult::Blind(_)));
        assert_eq!(engine.get_live_stats().bits_per_frame, vec![5]);
    }

    #[test]
    fn test_start_clears_pending_debias_bit() {
        let engine = seeded_engine(EngineConfig::default());
        engine.start();
        engine.ingest_cycle(&SensorCycle::new(vec![1.0], vec![1.0], vec![0], 1, 1).unwrap());
        engine.stop();

        engine.start();
        engine.ingest_cycle(&SensorCycle::new(vec![1.0], vec![1.0], vec![1], 1, 2).unwrap());
        let result = engine.stop();
        assert!(matches!(result, CycleResult::Normal(_)));
        assert_eq!(result.entropy_stats().bit_count, 0);
    }

    #[test]
    fn test_start_is_idempotent_while_collecting() {
        let engine = seeded_engine(EngineConfig::default());
        engine.start();
        engine.ingest_cycle(&SensorCycle::new(vec![1.0], vec![1.0], vec![0, 1], 1, 1).unwrap());
        engine.start();
        assert!(engine.is_collecting());

        match engine.stop() {
            CycleResult::Normal(cycle) => assert_eq!(cycle.dx.len(), 1),
            other => panic!("expected normal cycle, got {}", other.outcome()),
        }
        assert_eq!(engine.collection_mode(), CollectionMode::Idle);
    }

    #[test]
    fn test_invalid_attack_mode_rejected() {
        let engine = Engine::default();
        engine.set_attack_mode("freeze").unwrap();
        assert!(engine.set_attack_mode("EXPLODE").is_err());
        assert_eq!(engine.attack_mode(), AttackMode::Freeze);
    }

    #[test]
    fn test_blinded_sensor_keeps_last_motion_in_live_health() {
        let engine = seeded_engine(EngineConfig::default());
        let moving = SensorCycle::new(vec![1.0], vec![0.0], vec![1, 0, 1, 1, 0, 0, 1], 1, 0).unwrap();
        engine.ingest_cycle(&moving);

        engine.set_attack(AttackMode::Brightness);
        engine.ingest_cycle(&SensorCycle::empty(1));

        let live = engine.get_live_stats();
        assert_eq!(live.entropy_stats.avg_motion, 1.0);
        assert_eq!(live.health_score, 20);
    }

    #[test]
    fn test_live_health_under_attack() {
        let engine = seeded_engine(EngineConfig::default());
        engine.set_attack(AttackMode::Freeze);
        for seq in 0..10 {
            let frozen = SensorCycle::new(vec![0.0; 5], vec![0.0; 5], vec![1, 0, 1, 1, 0], 5, seq).unwrap();
            engine.ingest_cycle(&frozen);
        }
        assert!(engine.get_live_stats().health_score <= 20);

        engine.set_drbg_mode(true);
        assert!(engine.attack_state().drbg_fallback);
        let protected = engine.get_live_stats().health_score;
        assert!(protected <= 100);
    }

    #[test]
    fn test_expand_output_after_key() {
        let engine = seeded_engine(EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(17);
        collect_normal(&engine, &mut rng, 10);

        let a = engine.expand_output(64).unwrap();
        let b = engine.expand_output(64).unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_counters_track_outcomes() {
        let engine = seeded_engine(EngineConfig::default());
        let mut rng = StdRng::seed_from_u64(23);
        collect_normal(&engine, &mut rng, 10);
        engine.start();
        engine.stop();

        let counters = engine.counters();
        assert_eq!(counters.normal, 1);
        assert_eq!(counters.blind, 1);
        assert_eq!(counters.finalized(), 2);
        assert_eq!(counters.sensor_cycles, 10);
        assert_eq!(counters.last_health, Some(0));
    }

    #[test]
    fn test_concurrent_ingest_and_control() {
        let engine = Arc::new(seeded_engine(EngineConfig::default()));
        let producer = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(99);
                for _ in 0..2000 {
                    engine.ingest_cycle(&random_cycle(&mut rng, 4));
                }
            })
        };

        for _ in 0..50 {
            engine.start();
            let _ = engine.get_live_stats();
            if let CycleResult::Normal(cycle) = engine.stop() {
                assert_eq!(cycle.dx.len(), cycle.dy.len());
                assert!(cycle.entropy_stats.bit_count * 2 <= cycle.bits_per_frame.iter().sum::<usize>());
            }
        }
        producer.join().unwrap();

        let live = engine.get_live_stats();
        assert!(live.bits_per_frame.len() <= 60);
        assert!(live.msd.len() <= 60);
        assert!(live.entropy_stats.bit_count <= 256);
    }
}
