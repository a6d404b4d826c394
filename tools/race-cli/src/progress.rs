//! Progress command - inspect and edit a player progress document

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use racekit_core::progress::{Counter, Progress, TrackCounter};

/// Arguments for the progress command
#[derive(Args)]
pub struct ProgressArgs {
    #[command(subcommand)]
    pub command: ProgressCommand,
}

#[derive(Subcommand)]
pub enum ProgressCommand {
    /// Print every counter and per-track stats
    Show {
        /// Progress document (TOML)
        path: PathBuf,
    },

    /// Increase one counter and save
    Increment {
        /// Progress document (TOML), created when missing
        path: PathBuf,

        /// Counter key, e.g. `won-races`
        counter: String,

        #[arg(default_value = "1")]
        amount: u32,
    },
}

/// Execute the progress command
pub fn execute(args: ProgressArgs) -> Result<()> {
    match args.command {
        ProgressCommand::Show { path } => show(&path),
        ProgressCommand::Increment {
            path,
            counter,
            amount,
        } => increment(&path, &counter, amount),
    }
}

fn load(path: &Path) -> Result<Progress> {
    Progress::load_or_new(path).with_context(|| format!("Failed to load progress {}", path.display()))
}

fn show(path: &Path) -> Result<()> {
    let progress = load(path)?;

    println!("Counters:");
    for counter in Counter::ALL {
        println!("  {:<24} {}", counter.key(), progress.get(counter));
    }

    let tracks = progress.track_names();
    if tracks.is_empty() {
        return Ok(());
    }
    println!("Tracks:");
    for name in tracks {
        let Some(stats) = progress.track(name) else {
            continue;
        };
        let line = TrackCounter::ALL
            .iter()
            .map(|c| format!("{}={}", c.key(), stats.get(*c)))
            .collect::<Vec<_>>()
            .join(" ");
        println!("  {name:<16} {line}");
    }
    Ok(())
}

fn parse_counter(key: &str) -> Result<Counter> {
    match Counter::from_key(key) {
        Some(counter) => Ok(counter),
        None => {
            let valid: Vec<_> = Counter::ALL.iter().map(|c| c.key()).collect();
            bail!("Unknown counter '{key}'. Valid counters: {}", valid.join(", "))
        }
    }
}

fn increment(path: &Path, key: &str, amount: u32) -> Result<()> {
    let counter = parse_counter(key)?;
    let mut progress = load(path)?;
    progress.increase(counter, amount);
    progress
        .save(path)
        .with_context(|| format!("Failed to save progress {}", path.display()))?;
    println!("{} = {}", counter.key(), progress.get(counter));
    Ok(())
}
