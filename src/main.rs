//! Context harvester
//!
//! Command line host for the context aggregation engine.

mod cli;
mod cmd_replay;

use std::sync::OnceLock;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use harvester_config::{ConfigLoader, ConfigValidator, HarvesterConfig, LoggingConfig};
use harvester_core::split_parameter_values;

use crate::cli::{Cli, Commands};
use crate::cmd_replay::handle_replay;

/// Keeps the file writer flushing for the lifetime of the process.
static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize tracing with console output and an optional daily log file.
///
/// Console output goes to stderr so stdout stays a clean stream of JSON lines.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let file_layer = match logging.dir.as_deref() {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(logging.file_prefix.clone())
                .max_log_files(30)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = GUARD.set(guard);
            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(file_layer)
        .init();

    Ok(())
}

/// Load and validate the configuration. Warnings are logged once tracing is up.
fn load_config(cli: &Cli) -> Result<(HarvesterConfig, Vec<String>)> {
    let config = ConfigLoader::load_or_default(cli.config.as_deref())?;
    let result = ConfigValidator::validate(&config);
    let warnings = result
        .warnings
        .iter()
        .map(|w| format!("{}: {}", w.path, w.message))
        .collect();
    if let Some(err) = result.into_error() {
        return Err(err.into());
    }
    Ok((config, warnings))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, warnings) = load_config(&cli)?;

    init_tracing(&config.logging)?;
    for warning in &warnings {
        warn!("Config: {}", warning);
    }
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path.display());
    }

    match cli.command {
        Commands::Replay {
            log,
            document,
            metrics,
        } => handle_replay(&config, &log, &document, metrics),
        Commands::Split { text, min_gap } => {
            let min_gap = min_gap.unwrap_or(config.engine.split_min_gap);
            for part in split_parameter_values(&text, min_gap) {
                println!("{part}");
            }
            Ok(())
        }
    }
}
