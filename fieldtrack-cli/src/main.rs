//! FieldTrack CLI - replay tracks and manage geofences.
//!
//! State lives under the data directory (`--data-dir`, the `[storage]`
//! config section, or the platform data dir): persisted engine state in
//! `state/` and daily log files in `logs/`.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use commands::geofence::GeofenceAction;
use commands::resume::ResumeArgs;
use commands::simulate::SimulateArgs;
use error::CliError;
use runner::{CliRunner, GlobalOptions};

#[derive(Debug, Parser)]
#[command(name = "fieldtrack")]
#[command(version, about = "Location tracking and geofence detection for field workers")]
struct Cli {
    /// Path to config.ini (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for persisted state and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a recorded track (JSON lines) through the tracking engine
    Simulate {
        /// Track file, one location sample per line
        #[arg(long)]
        track: PathBuf,

        /// Worker id to track
        #[arg(long)]
        worker: String,

        /// Backend base URL (default: [backend] url, else log only)
        #[arg(long)]
        backend_url: Option<String>,

        /// Replay speed multiplier
        #[arg(long, default_value_t = 1.0)]
        speedup: f64,

        /// Leave the session active at the end, as if the process were killed
        #[arg(long)]
        keep_session: bool,
    },

    /// Show the persisted session, last known location and geofence state
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage geofence regions
    Geofence {
        #[command(subcommand)]
        action: GeofenceAction,
    },

    /// Resume a session left active by an earlier run
    Resume {
        /// Track file to replay for the resumed session
        #[arg(long)]
        track: PathBuf,

        /// Backend base URL (default: [backend] url, else log only)
        #[arg(long)]
        backend_url: Option<String>,

        /// Replay speed multiplier
        #[arg(long, default_value_t = 1.0)]
        speedup: f64,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let runner = CliRunner::new(&GlobalOptions {
        config: cli.config,
        data_dir: cli.data_dir,
        verbose: cli.verbose,
    })?;

    match cli.command {
        Commands::Simulate {
            track,
            worker,
            backend_url,
            speedup,
            keep_session,
        } => commands::simulate::run(
            &runner,
            SimulateArgs {
                track,
                worker,
                backend_url,
                speedup,
                keep_session,
            },
        ),
        Commands::Status { json } => commands::status::run(&runner, json),
        Commands::Geofence { action } => commands::geofence::run(&runner, action),
        Commands::Resume {
            track,
            backend_url,
            speedup,
        } => commands::resume::run(
            &runner,
            ResumeArgs {
                track,
                backend_url,
                speedup,
            },
        ),
    }
}
