//! Shared test utilities for integration and unit tests

use crate::config::{GameplayConfig, RaceMode};
use crate::session::{KartSetup, RaceSession, RaceSetup};
use crate::track::Track;
use crate::world::World;

pub const DT: f32 = 1.0 / 60.0;

/// 100 m straights joined by 20 m radius turns, 8 m wide.
pub fn test_track() -> Track {
    match Track::oval("test-oval", 100.0, 20.0, 8.0, 16) {
        Ok(track) => track,
        Err(e) => panic!("test track: {e}"),
    }
}

/// Config with a short start sequence so tests reach GO quickly.
pub fn fast_start_config(mode: RaceMode) -> GameplayConfig {
    let mut config = GameplayConfig::default();
    config.race.mode = mode;
    config.race.ready_time = 0.1;
    config.race.set_time = 0.1;
    config.race.go_time = 0.1;
    config
}

/// World with `ai` AI karts behind `players` local karts.
pub fn test_world(config: GameplayConfig, players: usize, ai: usize, seed: u64) -> World {
    let mut setup = RaceSetup::new(test_track())
        .with_config(config)
        .with_seed(seed);
    for i in 0..players {
        setup = setup.with_kart(KartSetup::local(format!("player{i}")));
    }
    for i in 0..ai {
        setup = setup.with_kart(KartSetup::ai(format!("ai{i}")));
    }
    match RaceSession::new(setup) {
        Ok(session) => session.into_world(),
        Err(e) => panic!("test world: {e}"),
    }
}

/// Tick until the world is racing.
pub fn run_to_go(world: &mut World) {
    for _ in 0..600 {
        if world.phase().is_racing() {
            return;
        }
        world.update(DT);
    }
    panic!("race never started, phase {:?}", world.phase());
}

pub fn run_ticks(world: &mut World, ticks: usize) {
    for _ in 0..ticks {
        world.update(DT);
    }
}
