//! Brownian Entropy Engine CLI
//!
//! Drives the engine from the mock motion sensor, prints finalized
//! cycles as JSON and runs the generator comparison.

use brownian_entropy::{
    attack::AttackMode,
    comparison::SourceResult,
    engine::Engine,
    sensor::{ConfigError, FileConfig, MockSensor, SensorDriver, SensorError, SensorLoop},
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[cfg(feature = "metrics")]
    #[error(transparent)]
    Metrics(#[from] brownian_entropy::metrics::MetricsError),
}

#[derive(Debug, Parser)]
#[command(name = "brownian-entropy", version, about = "Brownian motion entropy engine")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run collection cycles and print each result as JSON.
    Run {
        /// Keep collecting until Ctrl-C.
        #[arg(long)]
        continuous: bool,
        /// Number of cycles when not continuous.
        #[arg(long)]
        cycles: Option<u32>,
        /// Collection time per cycle in milliseconds.
        #[arg(long)]
        collect_ms: Option<u64>,
        /// Simulated attack (NONE, FREEZE, BRIGHTNESS, PATTERN).
        #[arg(long)]
        attack: Option<AttackMode>,
        /// Enable the DRBG fallback.
        #[arg(long)]
        drbg: bool,
    },
    /// Compare this engine against reference generators.
    Compare {
        /// Bits per source.
        #[arg(long)]
        bits: Option<usize>,
        /// Sensor cycles collected before comparing.
        #[arg(long, default_value_t = 100)]
        warmup: u32,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Brownian Entropy Engine v{}", brownian_entropy::VERSION);

    if let Err(e) = dispatch(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<(), AppError> {
    let config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };

    match cli.command {
        Command::Run {
            continuous,
            cycles,
            collect_ms,
            attack,
            drbg,
        } => {
            let mut config = config;
            config.output.continuous |= continuous;
            if let Some(cycles) = cycles {
                config.output.cycles = cycles;
            }
            if let Some(ms) = collect_ms {
                config.output.collect_ms = ms;
            }
            config.engine.drbg_fallback |= drbg;
            run(config, attack.unwrap_or_default())
        }
        Command::Compare { bits, warmup, json } => {
            let bits = bits.unwrap_or(config.output.compare_bits);
            compare(config, bits, warmup, json)
        }
    }
}

fn run(config: FileConfig, attack: AttackMode) -> Result<(), AppError> {
    let engine = Arc::new(Engine::new(&config.engine));
    engine.set_attack(attack);

    let sensor_loop = SensorLoop::new(
        Box::new(MockSensor::new()),
        config.sensor.clone(),
        config.fault.clone(),
    )?;
    let mut driver = SensorDriver::spawn(Arc::clone(&engine), sensor_loop)?;

    #[cfg(feature = "metrics")]
    if config.output.metrics_port != 0 {
        spawn_metrics_server(config.output.metrics_port, &engine, &driver)?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    let collect = Duration::from_millis(config.output.collect_ms);
    let mut completed = 0u32;
    while running.load(Ordering::SeqCst)
        && (config.output.continuous || completed < config.output.cycles)
    {
        engine.start();
        let began = Instant::now();
        while began.elapsed() < collect && running.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(50).min(collect));
        }
        let result = engine.stop();
        completed += 1;

        if result.health_score() < 50 {
            warn!(
                cycle = completed,
                outcome = result.outcome(),
                health = result.health_score(),
                "Low-health cycle"
            );
        }
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    driver.shutdown();
    let status = driver.status();
    info!(
        cycles = completed,
        sensor_cycles = status.cycles,
        faults = status.faults,
        source = status.source,
        "Done"
    );
    Ok(())
}

fn compare(config: FileConfig, bits: usize, warmup: u32, json: bool) -> Result<(), AppError> {
    let engine = Engine::new(&config.engine);

    if warmup > 0 {
        let mut sensor_loop =
            SensorLoop::new(Box::new(MockSensor::new()), config.sensor, config.fault)?;
        engine.start();
        for _ in 0..warmup {
            sensor_loop.step(&engine);
        }
        let result = engine.stop();
        info!(
            outcome = result.outcome(),
            health = result.health_score(),
            "Warm-up cycle finalized"
        );
    }

    let results = engine.compare_rng(bits);
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_table(&results);
    }
    Ok(())
}

fn print_table(results: &[SourceResult]) {
    println!(
        "{:<26} {:>10} {:>10} {:>10}  {}",
        "source", "monobit_p", "runs_p", "reboot", "notes"
    );
    for r in results {
        println!(
            "{:<26} {:>10.4} {:>10.4} {:>10}  {}",
            r.source, r.monobit_p, r.runs_p, r.reboot_vulnerability, r.notes
        );
    }
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(port: u16, engine: &Arc<Engine>, driver: &SensorDriver) -> Result<(), AppError> {
    use brownian_entropy::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    let server = MetricsServer::new(
        MetricsServerConfig::with_port(port),
        MetricsRegistry::new()?,
        Arc::clone(engine),
        Some(driver.status_handle()),
    );

    std::thread::Builder::new()
        .name("metrics-server".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start metrics runtime");
                    return;
                }
            };
            if let Err(e) = runtime.block_on(server.run()) {
                tracing::error!(error = %e, "Metrics server exited");
            }
        })?;
    Ok(())
}
