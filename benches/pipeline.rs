//! Benchmarks for the finalization path: statistics, pool hashing and
//! key derivation.

use brownian_entropy::{
    analysis::EntropyStats,
    attack::AttackMode,
    comparison::{monobit_frequency, runs_test},
    conditioning::HashAlgorithm,
    engine::Engine,
    sensor::{MockSensor, Sensor, SensorConfig, SensorCycle},
    EngineConfig,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn generate_cycles(count: usize) -> Vec<SensorCycle> {
    let mut sensor = MockSensor::with_seed(7);
    sensor.open(&SensorConfig::default()).unwrap();
    (0..count)
        .map(|_| sensor.read_cycle(AttackMode::None).unwrap())
        .collect()
}

fn bench_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");
    let bits: Vec<u8> = generate_cycles(100)
        .iter()
        .flat_map(|cycle| cycle.raw_bits().to_vec())
        .collect();

    group.throughput(Throughput::Elements(bits.len() as u64));
    group.bench_function("entropy_stats", |b| {
        b.iter(|| black_box(EntropyStats::from_bits(black_box(&bits), 1.0)))
    });
    group.bench_function("nist_monobit_and_runs", |b| {
        b.iter(|| {
            black_box(monobit_frequency(black_box(&bits)));
            black_box(runs_test(black_box(&bits)));
        })
    });

    group.finish();
}

fn bench_finalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("finalize");
    let cycles = generate_cycles(100);

    for (name, hash) in [("sha256", HashAlgorithm::Sha256), ("blake3", HashAlgorithm::Blake3)] {
        let engine = Engine::new(&EngineConfig {
            hash,
            drbg_fallback: false,
        });
        group.bench_function(format!("collect_100_cycles_{name}"), |b| {
            b.iter(|| {
                engine.start();
                for cycle in &cycles {
                    engine.ingest_cycle(cycle);
                }
                black_box(engine.stop())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_statistics, bench_finalize);
criterion_main!(benches);
