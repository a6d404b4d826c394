//! Race setup and the session that owns the world.
//!
//! Setup runs in a fixed order: physics, then the track and start grid,
//! then the karts and their bodies, then the item managers. Any failure is
//! fatal and reported as a [`SetupError`].

use std::time::Duration;

use glam::Vec3;
use racekit_shared::constants::MAX_KARTS;
use racekit_shared::{KartId, PackedControl, RaceHandshake};

use crate::config::GameplayConfig;
use crate::error::SetupError;
use crate::items::PickupField;
use crate::kart::{Controller, Kart};
use crate::physics::{ArcadePhysics, PhysicsBackend};
use crate::runtime::{GameLoop, RuntimeConfig};
use crate::track::Track;
use crate::world::World;

#[derive(Debug, Clone, PartialEq)]
pub struct KartSetup {
    pub name: String,
    pub controller: Controller,
}

impl KartSetup {
    pub fn new(name: impl Into<String>, controller: Controller) -> Self {
        Self {
            name: name.into(),
            controller,
        }
    }

    pub fn ai(name: impl Into<String>) -> Self {
        Self::new(name, Controller::Ai)
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name, Controller::local())
    }

    pub fn network(name: impl Into<String>) -> Self {
        Self::new(name, Controller::network())
    }

    pub fn ghost(name: impl Into<String>, controls: Vec<PackedControl>) -> Self {
        Self::new(name, Controller::ghost(controls))
    }
}

/// Everything needed to start a race.
#[derive(Debug, Clone)]
pub struct RaceSetup {
    pub config: GameplayConfig,
    pub runtime: RuntimeConfig,
    pub track: Track,
    pub karts: Vec<KartSetup>,
    pub seed: u64,
    /// Distance between pickup rows. `None` leaves the track empty.
    pub pickup_spacing: Option<f32>,
}

impl RaceSetup {
    pub fn new(track: Track) -> Self {
        Self {
            config: GameplayConfig::default(),
            runtime: RuntimeConfig::default(),
            track,
            karts: Vec::new(),
            seed: 0,
            pickup_spacing: None,
        }
    }

    pub fn with_config(mut self, config: GameplayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_kart(mut self, kart: KartSetup) -> Self {
        self.karts.push(kart);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_pickups(mut self, spacing: f32) -> Self {
        self.pickup_spacing = Some(spacing);
        self
    }
}

/// Owns the world and drives it at a fixed tick rate.
#[derive(Debug)]
pub struct RaceSession {
    world: World,
    game_loop: GameLoop,
    config_hash: u64,
}

impl RaceSession {
    pub fn new(setup: RaceSetup) -> Result<Self, SetupError> {
        let RaceSetup {
            config,
            runtime,
            track,
            karts: kart_setups,
            seed,
            pickup_spacing,
        } = setup;

        config.validate()?;
        let config_hash = config.config_hash()?;
        if kart_setups.is_empty() || kart_setups.len() > MAX_KARTS {
            return Err(SetupError::KartCount {
                got: kart_setups.len(),
                max: MAX_KARTS,
            });
        }

        let mut physics = ArcadePhysics::new(config.kart.clone(), config.physics.clone());

        let starts = track.start_positions(kart_setups.len(), &track).inspect_err(|e| {
            tracing::error!(track = track.name(), error = %e, "no start grid");
        })?;

        let mut karts = Vec::with_capacity(kart_setups.len());
        for (index, (kart_setup, start)) in kart_setups.into_iter().zip(&starts).enumerate() {
            let id = KartId::from_index(index).ok_or(SetupError::KartCount {
                got: index + 1,
                max: MAX_KARTS,
            })?;
            let body = physics.add_body(start.position, start.yaw, config.kart.mass);
            let mut kart = Kart::new(id, kart_setup.name, kart_setup.controller, body, config.kart.mass);
            kart.reset(config.race.mode);
            kart.position = start.position;
            kart.rotation = Vec3::new(0.0, start.yaw, 0.0);
            kart.distance = track.distance_down_track(start.position);
            kart.last_valid_distance = kart.distance;
            karts.push(kart);
        }

        let pickups = pickup_spacing
            .map(|spacing| PickupField::along_track(&track, spacing))
            .unwrap_or_default();

        tracing::info!(
            track = track.name(),
            karts = karts.len(),
            seed,
            mode = ?config.race.mode,
            "race session created"
        );

        let world = World::new(config, track, Box::new(physics), karts, pickups, seed);
        Ok(Self {
            world,
            game_loop: GameLoop::new(runtime),
            config_hash,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn into_world(self) -> World {
        self.world
    }

    pub fn tick_dt(&self) -> f32 {
        self.game_loop.tick_dt()
    }

    /// Values every netplay peer must agree on.
    pub fn handshake(&self) -> RaceHandshake {
        let mut handshake = RaceHandshake::new(
            self.world.karts().len() as u8,
            self.world.random().seed(),
            self.config_hash,
        );
        handshake.tick_rate = self.game_loop.tick_rate();
        handshake
    }

    /// Run `count` ticks back to back.
    pub fn step_ticks(&mut self, count: u32) {
        let dt = self.tick_dt();
        for _ in 0..count {
            self.world.update(dt);
        }
    }

    /// Run the ticks paid for by `elapsed` wall time. Returns ticks run and
    /// the render interpolation factor.
    pub fn run_frame(&mut self, elapsed: Duration) -> (u32, f32) {
        let world = &mut self.world;
        self.game_loop.advance(elapsed, |dt| world.update(dt))
    }

    /// Tick until the race reaches FINISH or `max_ticks` ran out. Returns
    /// the number of ticks run.
    pub fn run_to_finish(&mut self, max_ticks: u32) -> u32 {
        let dt = self.tick_dt();
        let mut ticks = 0;
        while ticks < max_ticks && !self.world.is_finished() {
            self.world.update(dt);
            ticks += 1;
        }
        ticks
    }
}
