// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stillcam::ControllerConfig;

mod cli;

#[derive(Parser)]
#[command(name = "stillcam")]
#[command(about = "Still photo capture against a simulated camera platform")]
#[command(version = stillcam::constants::app_info::version())]
struct Cli {
    /// Controller config file (JSON); defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Take a photo
    Photo {
        /// Camera id to use (from 'stillcam list'); overrides the saved state
        #[arg(short, long)]
        camera: Option<String>,

        /// Output file path (default: ~/Pictures/stillcam/IMG_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Switch camera once before shooting
        #[arg(long)]
        switch: bool,

        /// File the chosen camera is saved to and restored from between runs
        #[arg(long)]
        state: Option<PathBuf>,

        /// Display rotation in degrees, used to orient the JPEG
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        rotation: i32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=stillcam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::load_or_default(),
    };

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Photo {
            camera,
            output,
            switch,
            state,
            rotation,
        } => cli::take_photo(config, camera, output, switch, state, rotation),
    }
}
