//! Log Rotator - console runner.
//!
//! Loads the configuration, starts one rotation loop per pattern and runs
//! until Ctrl+C or SIGTERM, then stops every loop before exiting.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use rotator_config::{DEFAULT_CONFIG_FILE, RotatorConfig};
use rotator_engine::{GzipCompressor, Rotator};

/// Compress and delete aging log files on a schedule
#[derive(Parser)]
#[command(name = "log-rotator")]
#[command(about = "Compress and delete aging log files on a schedule")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "LOG_ROTATOR_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Run a single pass over every pattern and exit
    #[arg(long, conflicts_with = "check")]
    once: bool,

    /// Validate the configuration, print the patterns and exit
    #[arg(long)]
    check: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, stopping log rotator..."),
        _ = terminate => info!("Received SIGTERM, stopping log rotator..."),
    }
}

async fn run(args: Args) -> Result<()> {
    let config = RotatorConfig::load(&args.config).with_context(|| {
        format!(
            "failed to load configuration from {}",
            args.config.display()
        )
    })?;
    let (poll_interval, patterns) = config.build().context("invalid configuration")?;

    if args.check {
        for pattern in &patterns {
            println!("{pattern}");
        }
        println!(
            "Configuration OK: {} pattern(s), poll interval {}ms",
            patterns.len(),
            poll_interval.as_millis()
        );
        return Ok(());
    }

    let rotator = Rotator::new(poll_interval, patterns)?
        .with_compressor(Arc::new(GzipCompressor::new(config.compression_level)));

    if args.once {
        let processed = rotator.run_once().await?;
        info!(processed, "Single pass completed");
        return Ok(());
    }

    rotator.start()?;
    info!("Press Ctrl+C to stop");

    shutdown_signal().await;
    rotator.stop().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
