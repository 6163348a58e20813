//! rollcall - issue identity codes and take attendance
//!
//! `issue` creates a code for a holder. `scan` reads decoded payloads from
//! stdin, one per line (e.g. piped from `zbarcam --raw`), and logs every
//! authorized holder at most once per suppression interval. `check` tells
//! whether a single payload is authorized.

use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use rollcall::frame::{LineFrameSource, TextCodeReader, ThreadedFrameSource};
use rollcall::{
    AuthorizationEngine, Config, FileAuditLog, FileEventSink, FileRegistry, IdentityEncoder,
    Issuer, LogPresenter, RegistryStore, ScanSession, StopSignal, SvgQrRenderer, SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply if it does not exist)
    #[arg(short, long, default_value = "rollcall.toml", env = "ROLLCALL_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue an identity code for a holder
    Issue {
        /// Holder's display name
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Authorize payloads read from stdin until EOF or Ctrl-C
    Scan {
        /// How often to check for a stop request while waiting for input
        #[arg(long, default_value_t = 100)]
        poll_ms: u64,
    },

    /// Check whether a payload is authorized, without logging attendance
    Check {
        /// Payload exactly as decoded from the code
        payload: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("rollcall v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_file_or_default(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Issue { name } => issue(&config, &name.join(" ")),
        Commands::Scan { poll_ms } => scan(&config, Duration::from_millis(poll_ms)),
        Commands::Check { payload } => check(&config, &payload),
    }
}

fn issue(config: &Config, name: &str) -> Result<ExitCode> {
    let storage = &config.storage;
    let mut issuer = Issuer::new(
        IdentityEncoder::from_entropy(config.issuance.payload_format),
        FileRegistry::new(&storage.registry_path),
        SvgQrRenderer::default(),
        FileAuditLog::new(&storage.audit_path),
        SystemClock,
        &storage.artifact_dir,
    )
    .with_max_id_attempts(config.issuance.max_id_attempts);

    let issued = issuer.issue(name).context("issuance failed")?;
    println!("{}", issued.confirmation);
    println!("{}", issued.artifact_path.display());
    Ok(ExitCode::SUCCESS)
}

fn scan(config: &Config, poll: Duration) -> Result<ExitCode> {
    let storage = &config.storage;
    let registry = FileRegistry::new(&storage.registry_path);
    let engine = AuthorizationEngine::from_store(&registry, config.scanner.cooldown())
        .context("failed to load registry")?;
    let sink = FileEventSink::open(&storage.attendance_log_path)
        .context("failed to open attendance log")?;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.stop()).context("failed to install Ctrl-C handler")?;

    let source = ThreadedFrameSource::spawn(
        LineFrameSource::new(BufReader::new(io::stdin())),
        stop.clone(),
        poll,
    );

    info!("Scanner started - press Ctrl-C to stop");
    let summary = ScanSession::new(engine, source, TextCodeReader, sink, LogPresenter, SystemClock)
        .with_stop_signal(stop)
        .with_frame_retry_limit(config.scanner.frame_retry_limit)
        .run()
        .context("scanning session failed")?;

    println!(
        "{{\"frames\":{},\"logged\":{},\"suppressed\":{},\"denied\":{}}}",
        summary.frames, summary.logged, summary.suppressed, summary.denied
    );
    Ok(ExitCode::SUCCESS)
}

fn check(config: &Config, payload: &str) -> Result<ExitCode> {
    let registry = FileRegistry::new(&config.storage.registry_path)
        .load()
        .context("failed to load registry")?;

    if registry.contains(payload) {
        println!("ACCESS GRANTED");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("ACCESS DENIED");
        Ok(ExitCode::FAILURE)
    }
}
