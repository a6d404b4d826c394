//! Flying projectiles: straight bowling balls and homing cakes.

use glam::Vec3;
use racekit_shared::KartId;

use crate::config::ProjectileParams;
use crate::track::GroundQuery;

/// Projectiles ride this far above the ground.
const HOVER_HEIGHT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectileKind {
    Bowling,
    Cake,
}

/// Snapshot of a kart for hit tests and target selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KartTarget {
    pub id: KartId,
    pub position: Vec3,
    pub eliminated: bool,
    pub on_ground: bool,
    pub animating: bool,
}

impl KartTarget {
    /// Can be hit by a projectile at all.
    fn hittable(&self) -> bool {
        !self.eliminated && !self.animating
    }
}

/// Why a projectile ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileHit {
    Kart(KartId),
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub kind: ProjectileKind,
    pub owner: KartId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub target: Option<KartId>,
    age: f32,
    exploded: bool,
}

impl Projectile {
    /// Launch along `yaw` from `position`, adding the owner's speed.
    pub fn launch(
        kind: ProjectileKind,
        owner: KartId,
        position: Vec3,
        yaw: f32,
        owner_speed: f32,
        params: &ProjectileParams,
        target: Option<KartId>,
    ) -> Self {
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        Self {
            kind,
            owner,
            position: position + Vec3::Y * HOVER_HEIGHT,
            velocity: forward * (params.speed + owner_speed.max(0.0)),
            target,
            age: 0.0,
            exploded: false,
        }
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn has_exploded(&self) -> bool {
        self.exploded
    }

    /// Move, steer towards the target and test for hits. Returns the hit
    /// once; after that the projectile is inert.
    pub fn update(
        &mut self,
        dt: f32,
        karts: &[KartTarget],
        params: &ProjectileParams,
        owner_grace_time: f32,
        ground: &dyn GroundQuery,
    ) -> Option<ProjectileHit> {
        if self.exploded {
            return None;
        }
        self.age += dt;

        if params.homing_turn_rate > 0.0 {
            self.steer_towards_target(dt, karts, params);
        }

        self.position += self.velocity * dt;
        if let Some(height) = ground.ground_height(self.position) {
            self.position.y = height + HOVER_HEIGHT;
        }

        let hit = karts
            .iter()
            .filter(|k| k.hittable())
            .filter(|k| k.id != self.owner || self.age > owner_grace_time)
            .map(|k| (k.id, (k.position - self.position).length()))
            .filter(|(_, d)| *d <= params.hit_radius + HOVER_HEIGHT)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| ProjectileHit::Kart(id));

        let hit = hit.or_else(|| (self.age >= params.lifetime).then_some(ProjectileHit::Expired));
        if hit.is_some() {
            self.exploded = true;
        }
        hit
    }

    fn steer_towards_target(&mut self, dt: f32, karts: &[KartTarget], params: &ProjectileParams) {
        let Some(target) = self
            .target
            .and_then(|id| karts.iter().find(|k| k.id == id))
        else {
            return;
        };
        if !target.hittable() {
            self.target = None;
            return;
        }
        let to_target = Vec3::new(
            target.position.x - self.position.x,
            0.0,
            target.position.z - self.position.z,
        );
        if to_target.length() > params.max_homing_distance {
            return;
        }

        let speed = self.velocity.length();
        let heading = self.velocity.x.atan2(self.velocity.z);
        let desired = to_target.x.atan2(to_target.z);
        let mut error = desired - heading;
        error = (error + std::f32::consts::PI).rem_euclid(std::f32::consts::TAU)
            - std::f32::consts::PI;
        let max_turn = params.homing_turn_rate * dt;
        let new_heading = heading + error.clamp(-max_turn, max_turn);
        self.velocity = Vec3::new(new_heading.sin(), 0.0, new_heading.cos()) * speed;
    }
}
