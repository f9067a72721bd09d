//! AquaSentinel - water quality pollution event detection
//!
//! # Usage
//!
//! ```bash
//! # Monitor simulated sensors with the status API on :8080
//! aquasentinel run --simulate
//!
//! # Replay a CSV file as fast as possible
//! aquasentinel run --csv data/samples.csv --speed 0
//!
//! # Pipe JSON lines
//! my-sensor-reader | aquasentinel run --stdin
//!
//! # Housekeeping
//! aquasentinel report --days 7
//! aquasentinel export --format csv --start 2024-06-01 --output june.csv
//! ```
//!
//! # Environment Variables
//!
//! - `AQUASENTINEL_CONFIG`: path to the TOML config file
//! - `AQUASENTINEL_CORS_ORIGINS`: comma-separated origins allowed by the API
//! - `RUST_LOG`: logging filter (default: info)

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use aquasentinel::alerts::{Alert, AlertDispatcher};
use aquasentinel::api::{create_app, ApiState};
use aquasentinel::config::{self, defaults, MonitorConfig};
use aquasentinel::pipeline::{
    AnalysisClock, AppState, CsvSource, MonitorLoop, SampleSource, SimulatedSource, StdinSource,
};
use aquasentinel::sensors::{self, SimulatedSensors};
use aquasentinel::storage::{MonitorStorage, TimeRange};
use aquasentinel::{Analyzer, Classifier};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "aquasentinel")]
#[command(about = "AquaSentinel water quality monitoring and pollution event detection")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides the search order)
    #[arg(short, long, global = true, env = "AQUASENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Replay samples from a CSV file (timestamp,pH,turbidity,temperature)
    #[arg(long, conflicts_with_all = ["stdin", "simulate"])]
    csv: Option<PathBuf>,

    /// Read JSON samples from stdin, one per line
    #[arg(long, conflicts_with = "simulate")]
    stdin: bool,

    /// Generate synthetic readings (the default when no source is given)
    #[arg(long)]
    simulate: bool,

    /// Seed for the simulator
    #[arg(long)]
    seed: Option<u64>,

    /// Stop the simulator after this many samples
    #[arg(long)]
    max_samples: Option<u64>,

    /// Speed multiplier for replay and simulation (0 = no delay)
    #[arg(long, default_value_t = 1)]
    speed: u64,

    /// Do not start the status API
    #[arg(long)]
    no_api: bool,

    /// Override the API bind address
    #[arg(long)]
    addr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monitor water quality (default)
    Run(RunArgs),

    /// Classify the latest stored reading
    Status,

    /// Export stored readings
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        /// Start of the range (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// End of the range (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a plain-text report
    Report {
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete stored readings and events older than N days
    Cleanup {
        /// Defaults to storage.retention_days
        #[arg(long)]
        days: Option<u32>,
    },

    /// Check the config file and report errors and unknown keys
    ValidateConfig,

    /// Send a test alert through every configured channel
    TestAlerts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

// ============================================================================
// Task Supervision
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    Monitor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::Monitor => write!(f, "Monitor"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Monitor tasks; the first failure cancels the rest. When the monitor
/// loop finishes on its own (source exhausted) the server is stopped too.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    loop {
        match task_set.join_next().await {
            Some(Ok(Ok(TaskName::Monitor))) => {
                info!("Supervisor: monitor finished, stopping remaining tasks");
                cancel_token.cancel();
            }
            Some(Ok(Ok(task_name))) => {
                info!("Supervisor: task {} completed normally", task_name);
            }
            Some(Ok(Err(e))) => {
                error!("Supervisor: task failed with error: {}", e);
                cancel_token.cancel();
                return Err(e);
            }
            Some(Err(e)) => {
                error!("Supervisor: task panicked: {}", e);
                cancel_token.cancel();
                return Err(anyhow::anyhow!("Task panicked: {}", e));
            }
            None => break,
        }
    }
    Ok(())
}

// ============================================================================
// Run
// ============================================================================

fn open_storage(cfg: &MonitorConfig) -> Result<MonitorStorage> {
    MonitorStorage::open(&cfg.storage.path)
        .with_context(|| format!("Failed to open storage at {}", cfg.storage.path))
}

fn delay_for(base_ms: u64, speed: u64) -> u64 {
    if speed == 0 {
        0
    } else {
        base_ms / speed
    }
}

async fn run_monitor(args: RunArgs, cancel_token: CancellationToken) -> Result<()> {
    let cfg = config::get();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  AquaSentinel - Water Quality Monitoring");
    info!("  Station: {} ({})", cfg.station.name, cfg.station.location);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let storage = match open_storage(cfg) {
        Ok(storage) => {
            info!(path = %cfg.storage.path, readings = storage.reading_count(), "✓ Storage opened");
            let cutoff = Utc::now() - chrono::Duration::days(i64::from(cfg.storage.retention_days));
            match storage.cleanup_before(cutoff) {
                Ok(0) => {}
                Ok(n) => info!("Pruned {} records older than {} days", n, cfg.storage.retention_days),
                Err(e) => warn!("Failed to prune old records: {}", e),
            }
            Some(storage)
        }
        Err(e) => {
            warn!("{:#}. Readings will not be persisted.", e);
            None
        }
    };

    let dispatcher = AlertDispatcher::from_config(&cfg.alerts).context("Invalid alert channel")?;
    let app_state = Arc::new(RwLock::new(AppState::new(cfg.station.name.clone())));

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    if !args.no_api {
        let addr = args.addr.clone().unwrap_or_else(|| cfg.server.addr.clone());
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("✓ Status API listening on http://{}/api/v1", addr);
        let app = create_app(ApiState::new(Arc::clone(&app_state), storage.clone()));
        spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    }

    let mut monitor = MonitorLoop::new(
        Analyzer::new(&cfg.analyzer),
        Classifier::new(cfg.thresholds.clone()),
        dispatcher,
        Arc::clone(&app_state),
        cancel_token.clone(),
    )
    .with_max_consecutive_failures(cfg.system.max_consecutive_failures);
    if let Some(storage) = storage {
        monitor = monitor.with_storage(storage);
    }

    if let Some(path) = &args.csv {
        let path = path.to_string_lossy();
        let samples = sensors::read_csv_data(&path);
        if samples.is_empty() {
            anyhow::bail!("No samples loaded from {}", path);
        }
        let delay_ms = delay_for(defaults::SIMULATION_BASE_DELAY_MS, args.speed);
        info!("📥 Input: CSV replay of {} samples ({}ms delay)", samples.len(), delay_ms);
        let source = CsvSource::new(samples, delay_ms);
        spawn_monitor(&mut task_set, monitor.with_clock(AnalysisClock::SampleTime), source);
    } else if args.stdin {
        info!("📥 Input: stdin (JSON samples)");
        spawn_monitor(&mut task_set, monitor, StdinSource::new());
    } else {
        let delay_ms = delay_for(cfg.system.measurement_interval_secs * 1000, args.speed);
        info!("📥 Input: simulated sensors ({}ms interval)", delay_ms);
        let mut source = SimulatedSource::new(SimulatedSensors::new(args.seed), delay_ms);
        if let Some(n) = args.max_samples {
            source = source.with_max_samples(n);
        }
        spawn_monitor(&mut task_set, monitor, source);
    }

    run_supervisor(&mut task_set, cancel_token).await
}

fn spawn_monitor<S: SampleSource>(
    task_set: &mut JoinSet<Result<TaskName>>,
    monitor: MonitorLoop,
    mut source: S,
) {
    task_set.spawn(async move {
        let stats = monitor.run(&mut source).await;
        info!("Monitor finished: {}", stats);
        Ok(TaskName::Monitor)
    });
}

// ============================================================================
// Housekeeping Commands
// ============================================================================

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(std::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
fn parse_date_arg(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}': expected RFC 3339 or YYYY-MM-DD", s))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("Invalid date '{}'", s))
}

fn show_status(cfg: &MonitorConfig) -> Result<()> {
    let storage = open_storage(cfg)?;
    let Some(latest) = storage.latest_reading()? else {
        println!("No readings stored yet.");
        return Ok(());
    };
    let result = Classifier::new(cfg.thresholds.clone()).classify(&latest.sample);

    println!("Station:   {} ({})", cfg.station.name, cfg.station.location);
    println!("Reading:   {}", latest.sample);
    println!("Quality:   {} (score {})", result.band, result.score);
    if let Some(details) = result.details {
        println!(
            "Bands:     pH {} | turbidity {} | temperature {}",
            details.ph, details.turbidity, details.temperature
        );
    }
    println!();
    println!("{}", result.band.description());
    for rec in result.band.recommendations() {
        println!("  - {}", rec);
    }
    println!();
    println!(
        "Stored: {} readings, {} events",
        storage.reading_count(),
        storage.event_count()
    );
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| {
            let local = PathBuf::from(config::LOCAL_CONFIG_FILE);
            local.exists().then_some(local)
        });
    let Some(path) = path else {
        println!("No config file found; built-in defaults are valid.");
        return Ok(());
    };

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let warnings = config::validation::validate_unknown_keys(&raw);
    for w in &warnings {
        println!("warning: {}", w);
    }
    match MonitorConfig::from_toml_str(&raw) {
        Ok(cfg) => {
            let (_, range_warnings) = config::validation::validate_physical_ranges(&cfg);
            for w in &range_warnings {
                println!("warning: {}", w);
            }
            println!(
                "{}: OK ({} warnings)",
                path.display(),
                warnings.len() + range_warnings.len()
            );
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("{}", e)).context(format!("{} is invalid", path.display())),
    }
}

async fn test_alerts(cfg: &MonitorConfig) -> Result<()> {
    let dispatcher = AlertDispatcher::from_config(&cfg.alerts).context("Invalid alert channel")?;
    let results = dispatcher.dispatch(&Alert::test()).await;
    if results.is_empty() {
        println!("No channel receives info-level alerts.");
    }
    for r in &results {
        match &r.error {
            None => println!("✓ {} ({} ms)", r.channel, r.duration_ms),
            Some(e) => println!("✗ {}: {}", r.channel, e),
        }
    }
    if results.iter().any(|r| !r.success) {
        anyhow::bail!("one or more channels failed");
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let command = args.command.unwrap_or(Command::Run(RunArgs {
        speed: 1,
        ..RunArgs::default()
    }));

    if let Command::ValidateConfig = command {
        return validate_config(args.config.as_deref());
    }

    let monitor_config = match &args.config {
        Some(path) => MonitorConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MonitorConfig::load(),
    };
    config::init(monitor_config);
    let cfg = config::get();

    match command {
        Command::Run(run_args) => {
            let cancel_token = CancellationToken::new();
            let shutdown_token = cancel_token.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("🛑 Received Ctrl+C, initiating shutdown...");
                shutdown_token.cancel();
            });
            run_monitor(run_args, cancel_token).await?;
            info!("✓ AquaSentinel shutdown complete");
        }
        Command::Status => show_status(cfg)?,
        Command::Export {
            format,
            start,
            end,
            output,
        } => {
            let start = start.as_deref().map(parse_date_arg).transpose()?;
            let end = end.as_deref().map(parse_date_arg).transpose()?;
            let storage = open_storage(cfg)?;
            let mut writer = output_writer(output.as_deref())?;
            let range = TimeRange::between(start, end);
            let rows = match format {
                ExportFormat::Csv => {
                    storage.export_csv(range, defaults::EXPORT_ROW_LIMIT, &mut writer)?
                }
                ExportFormat::Json => {
                    storage.export_json(range, defaults::EXPORT_ROW_LIMIT, &mut writer)?
                }
            };
            writer.flush()?;
            info!(rows, "Export complete");
        }
        Command::Report { days, output } => {
            let storage = open_storage(cfg)?;
            let report = aquasentinel::report::generate_report(&storage, days, Utc::now())?;
            let mut writer = output_writer(output.as_deref())?;
            writer.write_all(report.as_bytes())?;
            writer.flush()?;
            if let Some(path) = output {
                info!("Report generated: {}", path.display());
            }
        }
        Command::Cleanup { days } => {
            let days = days.unwrap_or(cfg.storage.retention_days);
            let storage = open_storage(cfg)?;
            let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
            let removed = storage.cleanup_before(cutoff)?;
            storage.flush()?;
            println!("Removed {} records older than {} days", removed, days);
        }
        Command::TestAlerts => test_alerts(cfg).await?,
        Command::ValidateConfig => {}
    }

    Ok(())
}
