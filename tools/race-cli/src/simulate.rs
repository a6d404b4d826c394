//! Simulate command - run an AI race to the finish

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use racekit_core::progress::{Progress, RaceResult};
use racekit_core::{
    GameplayConfig, KartSetup, RaceMode, RaceSession, RaceSetup, Track, World, WorldEvent,
};
use racekit_render::{
    FrameRenderer, HeadlessDevice, RenderConfig, RenderDevice, WgpuDevice,
};
use racekit_shared::KartId;
use racekit_shared::constants::MAX_KARTS;

use crate::scene;

/// Name of the built-in track. Histories recorded here carry it.
pub const TRACK_NAME: &str = "oval";

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Normal,
    TimeTrial,
    FollowTheLeader,
}

impl From<ModeArg> for RaceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Normal => RaceMode::Normal,
            ModeArg::TimeTrial => RaceMode::TimeTrial,
            ModeArg::FollowTheLeader => RaceMode::FollowTheLeader,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RenderArg {
    /// Record GPU calls without a device
    Headless,
    /// Render offscreen on the first available adapter
    Gpu,
}

/// Arguments for the simulate command
#[derive(Args)]
pub struct SimulateArgs {
    /// Number of AI karts
    #[arg(short, long, default_value = "4")]
    pub karts: usize,

    /// Race seed
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Race mode
    #[arg(long, value_enum, default_value = "normal")]
    pub mode: ModeArg,

    /// Gameplay config TOML (defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Give up after this many ticks
    #[arg(long, default_value = "36000")]
    pub max_ticks: u32,

    /// Distance between pickup rows in metres (0 disables pickups)
    #[arg(long, default_value = "25.0")]
    pub pickup_spacing: f32,

    /// Save the race history to this file
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Update this progress document with kart 0's race
    #[arg(long)]
    pub progress: Option<PathBuf>,

    /// Drive the frame renderer every tick
    #[arg(long, value_enum)]
    pub render: Option<RenderArg>,

    /// Render config TOML (defaults when omitted)
    #[arg(long)]
    pub render_config: Option<PathBuf>,
}

pub fn built_in_track() -> Result<Track> {
    Track::oval(TRACK_NAME, 100.0, 20.0, 8.0, 16).context("Failed to build track")
}

pub fn load_gameplay_config(path: Option<&PathBuf>, mode: Option<RaceMode>) -> Result<GameplayConfig> {
    let mut config = match path {
        Some(path) => GameplayConfig::load(path)
            .with_context(|| format!("Failed to load gameplay config {}", path.display()))?,
        None => GameplayConfig::default(),
    };
    if let Some(mode) = mode {
        config.race.mode = mode;
    }
    Ok(config)
}

pub fn race_setup(config: GameplayConfig, names: &[String], seed: u64, pickup_spacing: f32) -> Result<RaceSetup> {
    let mut setup = RaceSetup::new(built_in_track()?)
        .with_config(config)
        .with_seed(seed);
    if pickup_spacing > 0.0 {
        setup = setup.with_pickups(pickup_spacing);
    }
    for name in names {
        setup = setup.with_kart(KartSetup::ai(name.clone()));
    }
    Ok(setup)
}

/// Execute the simulate command
pub fn execute(args: SimulateArgs) -> Result<()> {
    if args.karts == 0 || args.karts > MAX_KARTS {
        bail!("--karts must be between 1 and {MAX_KARTS}, got {}", args.karts);
    }

    let config = load_gameplay_config(args.config.as_ref(), Some(args.mode.into()))?;
    let names: Vec<String> = (0..args.karts).map(|i| format!("ai{i}")).collect();
    let setup = race_setup(config, &names, args.seed, args.pickup_spacing)?;
    let mut session = RaceSession::new(setup).context("Failed to set up race")?;

    if args.record.is_some() {
        session.world_mut().start_recording(0);
    }

    let render_config = match &args.render_config {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("Failed to load render config {}", path.display()))?,
        None => RenderConfig::default(),
    };

    match args.render {
        None => run(
            &args,
            &mut session,
            None::<FrameRenderer<HeadlessDevice>>,
            |_| {},
        )?,
        Some(RenderArg::Headless) => {
            let renderer = FrameRenderer::new(HeadlessDevice::new(), render_config)
                .context("Failed to create headless renderer")?;
            // Keep only the current frame's calls
            run(&args, &mut session, Some(renderer), |renderer| {
                renderer.device_mut().clear_log()
            })?;
        }
        Some(RenderArg::Gpu) => {
            let device = pollster::block_on(WgpuDevice::new()).context("Failed to open GPU device")?;
            let renderer =
                FrameRenderer::new(device, render_config).context("Failed to create renderer")?;
            run(&args, &mut session, Some(renderer), |_| {})?;
        }
    }

    if let Some(path) = &args.record {
        let history = session
            .world()
            .history()
            .context("Recording was not started")?;
        history
            .save(path)
            .with_context(|| format!("Failed to save history {}", path.display()))?;
        println!("History written to {}", path.display());
    }

    Ok(())
}

fn run<D: RenderDevice>(
    args: &SimulateArgs,
    session: &mut RaceSession,
    mut renderer: Option<FrameRenderer<D>>,
    mut before_frame: impl FnMut(&mut FrameRenderer<D>),
) -> Result<()> {
    let player = KartId(0);
    let mut progress = match &args.progress {
        Some(path) => {
            let mut progress = Progress::load_or_new(path)
                .with_context(|| format!("Failed to load progress {}", path.display()))?;
            let world = session.world();
            progress.race_started(world.track().name(), world.config().race.mode);
            Some(progress)
        }
        None => None,
    };

    let mut ticks = 0;
    while ticks < args.max_ticks && !session.world().is_finished() {
        session.step_ticks(1);
        ticks += 1;

        for event in session.world_mut().drain_events() {
            log_event(session.world(), &event);
            if let Some(progress) = &mut progress {
                progress.observe(&event, player);
            }
        }

        if let Some(renderer) = &mut renderer {
            before_frame(renderer);
            let world = session.world();
            let aspect = renderer.config().width as f32 / renderer.config().height as f32;
            renderer.prepare_draw_calls(&scene::build_scene(world), &scene::cameras(world, aspect));
            renderer.render_frame().context("Failed to render frame")?;
        }
    }

    let world = session.world();
    if !world.is_finished() {
        tracing::warn!(ticks, "race did not finish within --max-ticks");
    }
    print_results(world, ticks, session.tick_dt());

    if let Some(renderer) = &renderer {
        let stats = renderer.stats();
        println!(
            "Last frame: {} nodes visited, {} culled, {} solid / {} shadow / {} glow polys, {} dropped instances",
            stats.traversal.visited,
            stats.traversal.culled,
            stats.solid_polys,
            stats.shadow_polys,
            stats.glow_polys,
            stats.dropped_instances,
        );
    }

    if let (Some(path), Some(progress)) = (&args.progress, &mut progress) {
        if let Some(result) = RaceResult::from_world(world, player) {
            progress.race_ended(&result);
        }
        progress
            .save(path)
            .with_context(|| format!("Failed to save progress {}", path.display()))?;
    }
    Ok(())
}

fn log_event(world: &World, event: &WorldEvent) {
    let name = |kart: KartId| world.kart(kart).map_or("?", |k| k.name.as_str());
    match event {
        WorldEvent::PhaseChanged(transition) => tracing::debug!(?transition, "phase changed"),
        WorldEvent::KartFinished {
            kart,
            position,
            time,
        } => tracing::info!(kart = name(*kart), position, time, "kart finished"),
        WorldEvent::KartEliminated { kart, position } => {
            tracing::info!(kart = name(*kart), position, "kart eliminated")
        }
        _ => {}
    }
}

pub fn print_results(world: &World, ticks: u32, dt: f32) {
    println!(
        "{} on {}: {} ticks ({:.1}s simulated)",
        if world.is_finished() { "Finished" } else { "Stopped" },
        world.track().name(),
        ticks,
        ticks as f32 * dt
    );
    let mut karts: Vec<_> = world.karts().iter().collect();
    karts.sort_by_key(|k| k.race_position);
    for kart in karts {
        let status = if kart.eliminated {
            "eliminated".to_string()
        } else if kart.finished {
            format!("{:.2}s", kart.finish_time)
        } else {
            format!("lap {}", kart.lap + 1)
        };
        println!("{:>3}. {:<12} {}", kart.race_position, kart.name, status);
    }
}
