// SPDX-License-Identifier: GPL-3.0-only

use cameraman::Config;
use cameraman::config::BackendKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "cameraman")]
#[command(about = "Capture photos and videos through the CameraMan session coordinator")]
#[command(version = cameraman::constants::app_info::version())]
struct Cli {
    /// Configuration file (default: ~/.config/cameraman/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Capture backend, overriding the configuration
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,

    /// Asset library directory, overriding the configuration
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices
    Devices,

    /// Take a photo and commit it to the library
    Photo,

    /// Record a video and commit it to the library
    Video {
        /// Recording duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },

    /// List committed assets
    Library,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Simulated,
    Gstreamer,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Simulated => BackendKind::Simulated,
            BackendArg::Gstreamer => BackendKind::GStreamer,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=cameraman=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    if let Some(library) = cli.library {
        config.library_dir = Some(library);
    }

    match cli.command {
        Commands::Devices => cli::list_devices(&config),
        Commands::Photo => cli::take_photo(config),
        Commands::Video { duration } => cli::record_video(config, duration),
        Commands::Library => cli::list_library(&config),
    }
}
