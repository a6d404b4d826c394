//! Whole-race scenarios driven through [`RaceSession`](crate::RaceSession).
//!
//! Covers follow-the-leader eliminations, item outcomes shared between a
//! server and a client, and history record/replay.

#[cfg(test)]
mod race_tests;

#[cfg(test)]
pub(crate) mod scenario {
    use glam::Vec3;

    use crate::config::GameplayConfig;
    use crate::session::{KartSetup, RaceSession, RaceSetup};
    use crate::test_utils::test_track;
    use crate::world::World;

    /// Session with `ai` AI karts and pickups every 25 m.
    pub fn ai_session(config: GameplayConfig, ai: usize, seed: u64) -> RaceSession {
        let mut setup = RaceSetup::new(test_track())
            .with_config(config)
            .with_seed(seed)
            .with_pickups(25.0);
        for i in 0..ai {
            setup = setup.with_kart(KartSetup::ai(format!("ai{i}")));
        }
        RaceSession::new(setup).unwrap()
    }

    /// Session of `count` local karts that never touch the controls.
    pub fn parked_session(config: GameplayConfig, count: usize) -> RaceSession {
        let mut setup = RaceSetup::new(test_track()).with_config(config);
        for i in 0..count {
            setup = setup.with_kart(KartSetup::local(format!("p{i}")));
        }
        RaceSession::new(setup).unwrap()
    }

    /// Move kart `i`'s body to `distance` along the centerline. Takes effect
    /// on the next tick.
    pub fn place_kart(world: &mut World, i: usize, distance: f32) {
        let (position, yaw) = world.track().transform_at(distance, 0.0);
        let handle = world.karts()[i].body;
        let body = world.physics_mut().body_mut(handle).unwrap();
        body.position = position;
        body.yaw = yaw;
        body.velocity = Vec3::ZERO;
    }

    pub fn positions(world: &World) -> Vec<Vec3> {
        world.karts().iter().map(|k| k.position).collect()
    }
}
