//! Tally - Manifest-driven client telemetry pipeline
//!
//! # Usage
//!
//! ```bash
//! # Check a manifest before publishing it
//! tally validate manifest.json
//!
//! # Run recorded events through a full session, printing what each
//! # channel would receive
//! tally replay --events events.jsonl --manifest manifest.json
//! tally replay --events - --opt-out < events.jsonl
//! ```

mod cmd;
mod stdout;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tally_config::Config;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tally - Manifest-driven client telemetry pipeline
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a manifest and report what validation dropped
    Validate(cmd::validate::ValidateArgs),

    /// Replay a JSON-lines event file through a session to stdout
    Replay(cmd::replay::ReplayArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = resolve_log_level(cli.log_level.as_deref(), cli.config.as_deref());
    init_logging(&log_level)?;

    match cli.command {
        Command::Validate(args) => cmd::validate::run(args),
        Command::Replay(args) => cmd::replay::run(args, cli.config.as_deref()).await,
    }
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config_path: Option<&std::path::Path>) -> String {
    // CLI flag takes precedence
    if let Some(level) = cli_level {
        return level.to_string();
    }

    if let Some(path) = config_path
        && path.exists()
        && let Ok(config) = Config::from_file(path)
    {
        return config.log.level.as_str().to_string();
    }

    "info".to_string()
}

/// Initialize the tracing subscriber, logging to stderr
///
/// Stdout carries replayed events only.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();

    Ok(())
}
