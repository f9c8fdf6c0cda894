//! axetune - NerdQAxe voltage/frequency auto-tuner
//!
//! **Usage:**
//! ```bash
//! axetune 192.168.2.26 [-v 1150] [-f 600] [--resume] [--fine] [--config tune.toml]
//! ```
//!
//! Runs a coarse frontier sweep (or, with `--fine`, a fine-tune around the
//! best previous results), then leaves the device on the best setting found.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use axetune::device::{DeviceApi, HttpDeviceClient};
use axetune::tuning::{backup_results_file, run_search, CliFormatter, SearchMode, SearchSession};
use axetune::Error;
use axetune_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use axetune_common::{Candidate, TuningConfig};
use clap::{CommandFactory, Parser};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for axetune
#[derive(Parser, Debug)]
#[command(name = "axetune")]
#[command(about = "Voltage/frequency auto-tuner for NerdQAxe mining boards")]
#[command(version)]
struct Args {
    /// Device IP address (or http:// URL)
    address: String,

    /// Initial core voltage in mV
    #[arg(short, long, default_value_t = 1150)]
    voltage: u32,

    /// Initial frequency in MHz
    #[arg(short, long, default_value_t = 600)]
    frequency: u32,

    /// Skip combinations already in the results file
    #[arg(long)]
    resume: bool,

    /// Fine-tune around the best previous results (implies --resume)
    #[arg(long)]
    fine: bool,

    /// TOML tuning config (overrides AXETUNE_CONFIG)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if std::env::args_os().len() <= 1 {
        // Help goes to stdout; exit status 1 either way
        if let Err(e) = Args::command().print_help() {
            eprintln!("✗ Failed to print help: {}", e);
        }
        return ExitCode::FAILURE;
    }

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            // Logging may not be initialised yet
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("axetune={level},axetune_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(args: Args) -> Result<ExitCode> {
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config = TuningConfig::load(config_path.as_deref()).context("Failed to load tuning config")?;
    init_tracing(&config.logging.level);

    let mut resume = args.resume;
    if args.fine && !resume {
        warn!("--fine mode requires previous results. Automatically enabling --resume.");
        resume = true;
    }

    let start = Candidate::new(args.voltage, args.frequency);
    config.validate(start).context("Invalid configuration")?;

    let results_path = config.output.results_path(&args.address);
    if results_path.exists() {
        if let Err(e) = backup_results_file(&results_path) {
            warn!("Failed to back up {}: {}", results_path.display(), e);
        }
        if !resume {
            info!("Results file {} found, resuming", results_path.display());
            resume = true;
        }
    }

    let device = HttpDeviceClient::new(&args.address, &config.http)
        .context("Failed to create device client")?
        .with_apply_pause(Duration::from_millis(config.benchmark.apply_pause_ms));
    info!("Tuning device at {}", device.base_url());

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let defaults = device.defaults_or_fallback().await;
    let mut session = SearchSession::new(defaults, results_path, cancel);

    if resume {
        if let Err(e) = session.resume() {
            warn!("Could not load previous results: {}", e);
        }
    }

    let mode = if args.fine {
        SearchMode::Fine
    } else {
        println!("{}", CliFormatter::format_disclaimer());
        SearchMode::Coarse(start)
    };

    let summary = match run_search(&device, &config, &mut session, mode).await {
        Ok(summary) => summary,
        // Nothing has been applied yet, so no device reset is needed
        Err(Error::NoBaseline) => {
            error!("No previous results loaded. Cannot fine-tune without baseline data.");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).context("Tuning run failed"),
    };

    if let Ok(end) = &summary.outcome {
        println!("{}", CliFormatter::format_search_end(end));
    }
    if !session.store.is_empty() {
        println!("{}", CliFormatter::format_session_summary(&session.store));
    }
    println!("{}", CliFormatter::format_shutdown(&summary.report));

    if summary.is_failure() {
        eprintln!("✗ Tuning failed with no results to fall back on");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Turn Ctrl-C into cancellation; repeats while shutting down are ignored
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            if cancel.is_cancelled() {
                warn!("Shutdown already in progress, ignoring interrupt");
            } else {
                warn!("Interrupt received, restoring device settings...");
                cancel.cancel();
            }
        }
    });
}
