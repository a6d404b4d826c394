//! Replay command - play a recorded history back through the world

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use racekit_core::history::{History, HistoryPlayback, ReplayMode};
use racekit_core::RaceSession;

use crate::simulate::{self, TRACK_NAME};

/// Largest distance between replayed and recorded positions `--verify` accepts.
const VERIFY_TOLERANCE: f32 = 1e-3;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ReplayModeArg {
    /// Overwrite kart transforms with the recorded ones
    Positions,
    /// Re-simulate from the recorded controls
    Controls,
}

impl From<ReplayModeArg> for ReplayMode {
    fn from(mode: ReplayModeArg) -> Self {
        match mode {
            ReplayModeArg::Positions => ReplayMode::Positions,
            ReplayModeArg::Controls => ReplayMode::Controls,
        }
    }
}

/// Arguments for the replay command
#[derive(Args)]
pub struct ReplayArgs {
    /// History file written by `race simulate --record`
    pub history: PathBuf,

    /// How recorded frames drive the karts
    #[arg(long, value_enum, default_value = "positions")]
    pub mode: ReplayModeArg,

    /// Gameplay config TOML the race was recorded with
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pickup spacing the race was recorded with
    #[arg(long, default_value = "25.0")]
    pub pickup_spacing: f32,

    /// Fail unless every kart ends where the recording ends
    #[arg(long)]
    pub verify: bool,
}

/// Execute the replay command
pub fn execute(args: ReplayArgs) -> Result<()> {
    let history = History::load(&args.history)
        .with_context(|| format!("Failed to load history {}", args.history.display()))?;

    if history.header.track != TRACK_NAME {
        bail!(
            "History was recorded on track '{}', only '{TRACK_NAME}' is available",
            history.header.track
        );
    }

    tracing::info!(
        karts = history.num_karts(),
        frames = history.frames.len(),
        seed = history.header.seed,
        "replaying history"
    );

    let config = simulate::load_gameplay_config(args.config.as_ref(), None)?;
    let setup = simulate::race_setup(
        config,
        &history.header.karts,
        history.header.seed,
        args.pickup_spacing,
    )?;
    let mut session = RaceSession::new(setup).context("Failed to set up race")?;

    let frames = history.frames.len();
    let expected: Vec<_> = history
        .frames
        .last()
        .map(|frame| frame.karts.iter().map(|k| k.position).collect())
        .unwrap_or_default();

    session
        .world_mut()
        .start_playback(HistoryPlayback::new(history, args.mode.into()))
        .context("History does not match the race")?;

    let ticks = u32::try_from(frames).context("History is too long")?;
    session.step_ticks(ticks);
    session.world_mut().drain_events();

    let world = session.world();
    simulate::print_results(world, ticks, session.tick_dt());

    if args.verify {
        let mut worst = 0.0f32;
        for (kart, recorded) in world.karts().iter().zip(&expected) {
            let deviation = kart.position.distance(*recorded);
            tracing::debug!(kart = %kart.name, deviation, "replay deviation");
            worst = worst.max(deviation);
        }
        if worst > VERIFY_TOLERANCE {
            bail!("Replay diverged from the recording by {worst:.4}m");
        }
        println!("Replay matches the recording (max deviation {worst:.6}m)");
    }

    Ok(())
}
