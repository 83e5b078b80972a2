// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use samplecam::Config;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "samplecam")]
#[command(about = "Single-sensor capture service for sample imaging stations")]
#[command(version)]
struct Cli {
    /// Config file path (default: config dir samplecam/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the synthetic test-pattern sensor instead of hardware
    #[arg(long)]
    synthetic: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a full-resolution still
    Still {
        /// Sample identifier used as the filename prefix
        #[arg(short, long)]
        sample_id: Option<String>,
    },

    /// Record a timed video clip (Ctrl-C stops early)
    Record {
        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Sample identifier used as the filename prefix
        #[arg(short, long)]
        sample_id: Option<String>,
    },

    /// Save preview frames as JPEG files
    Preview {
        /// Number of frames to save
        #[arg(short = 'n', long, default_value = "10")]
        count: u32,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Report removable storage status
    Storage,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=samplecam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    match args.command {
        Commands::Still { sample_id } => {
            cli::take_still(config, args.synthetic, sample_id.as_deref())
        }
        Commands::Record {
            duration,
            sample_id,
        } => cli::record(config, args.synthetic, duration, sample_id.as_deref()),
        Commands::Preview { count, out } => cli::preview(config, args.synthetic, count, out),
        Commands::Storage => cli::storage_status(config),
    }
}
