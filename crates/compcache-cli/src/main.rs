//! compcache CLI - drive and inspect compressed RAM block devices.
//!
//! # Usage
//!
//! ```bash
//! # Show configured devices
//! compcache devices
//!
//! # Write, verify and discard 10k mixed pages on device 0
//! compcache bench --pages 10000 --pattern mixed --discard
//!
//! # JSON output with a custom configuration
//! compcache --format json --config ./compcache.toml bench
//! ```

#![deny(missing_docs)]
#![deny(clippy::panic)]
#![warn(clippy::all, clippy::pedantic)]

mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// compcache: compressed in-memory block store
#[derive(Parser)]
#[command(name = "compcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Configuration file (defaults to /etc/compcache.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show device configuration
    Devices(commands::DevicesArgs),

    /// Run a write/read workload against a device
    Bench(commands::BenchArgs),
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = config::load_config(cli.config.as_deref())?;
    let registry = config.build_registry()?;

    match &cli.command {
        Commands::Devices(args) => commands::devices(args, &registry, cli.format),
        Commands::Bench(args) => commands::bench(args, &registry, cli.format),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
