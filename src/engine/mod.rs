//! Collection state machine, live statistics and cycle results.
//!
//! [`Engine`] is the single point of shared state. It is driven by a
//! sensor thread through [`Engine::ingest_cycle`] and controlled by
//! callers through `start`/`stop` and the attack setters.

mod controller;
mod live;
mod result;
mod ring;

pub use controller::{CollectionMode, CycleCounters, Engine, INITIALIZING_KEY};
pub use live::{LiveStats, LiveStatsAggregator, LiveWindow, BIT_WINDOW, FRAME_WINDOW, JITTER_STD};
pub use result::{BlindCycle, CycleResult, FallbackCycle, NormalCycle, BLIND_KEY, FALLBACK_MODE};
pub use ring::RingBuffer;
