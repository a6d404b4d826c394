//! Race CLI - headless runner for racekit
//!
//! # Commands
//!
//! - `race simulate` - Run an AI race to the finish, optionally recording
//!   a history file and driving the frame renderer
//! - `race replay` - Re-run a recorded history file
//! - `race progress` - Show or edit a progress document
//!
//! # Usage
//!
//! ```bash
//! # Six AI karts, record the race
//! race simulate --karts 6 --seed 7 --record race.history
//!
//! # Same race again from the file, checking the final positions
//! race replay race.history --verify
//!
//! # Exercise the render scheduler without a GPU
//! race simulate --render headless
//! ```
//!
//! Exit code 2 means a history file could not be read.

mod progress;
mod replay;
mod scene;
mod simulate;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use racekit_core::HistoryError;

/// Race CLI - headless runner for racekit
#[derive(Parser)]
#[command(name = "race")]
#[command(about = "Headless race runner for racekit")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an AI race to the finish
    Simulate(simulate::SimulateArgs),

    /// Re-run a recorded history file
    Replay(replay::ReplayArgs),

    /// Show or edit a progress document
    Progress(progress::ProgressArgs),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Simulate(args) => simulate::execute(args),
        Commands::Replay(args) => replay::execute(args),
        Commands::Progress(args) => progress::execute(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if err.chain().any(|cause| cause.is::<HistoryError>()) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
