//! Physics-detached kart animations.
//!
//! While an animation runs it owns the kart transform: the physics body is
//! detached and control input is ignored. When it ends the world re-attaches
//! the body at [`KartAnimation::end_transform`] with zero velocity.

use glam::Vec3;

use crate::config::ExplosionConfig;
use crate::random::signed_unit;

/// Toss-and-land after an explosion.
///
/// The kart rises with `v0 = g * T / 2`, so it lands back at its start
/// height after exactly `T` seconds, tumbling about each axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionAnimation {
    start: Vec3,
    yaw: f32,
    elapsed: f32,
    duration: f32,
    gravity: f32,
    v0: f32,
    /// Total rotation per axis (pitch, yaw, roll) over the whole animation.
    tumble: Vec3,
}

impl ExplosionAnimation {
    pub fn new(
        start: Vec3,
        yaw: f32,
        direct_hit: bool,
        tumble_draw: u32,
        config: &ExplosionConfig,
        gravity: f32,
    ) -> Self {
        let max_rotation = if direct_hit {
            config.max_rotation_direct
        } else {
            config.max_rotation_indirect
        };
        let tumble = Vec3::new(
            signed_unit(tumble_draw, 0),
            signed_unit(tumble_draw, 10),
            signed_unit(tumble_draw, 20),
        ) * max_rotation;
        let duration = config.explosion_time;
        Self {
            start,
            yaw,
            elapsed: 0.0,
            duration,
            gravity,
            v0: 0.5 * gravity * duration,
            tumble,
        }
    }

    pub fn start(&self) -> Vec3 {
        self.start
    }

    pub fn tumble(&self) -> Vec3 {
        self.tumble
    }

    pub fn height_at(&self, t: f32) -> f32 {
        if t >= self.duration {
            return self.start.y;
        }
        self.start.y + t * (self.v0 - 0.5 * self.gravity * t)
    }
}

/// Lift a fallen or stuck kart and drop it back onto the centerline.
#[derive(Debug, Clone, PartialEq)]
pub struct RescueAnimation {
    start: Vec3,
    yaw: f32,
    target: Vec3,
    target_yaw: f32,
    elapsed: f32,
    duration: f32,
    height: f32,
}

impl RescueAnimation {
    pub fn new(start: Vec3, yaw: f32, target: Vec3, target_yaw: f32, config: &ExplosionConfig) -> Self {
        Self {
            start,
            yaw,
            target,
            target_yaw,
            elapsed: 0.0,
            duration: config.rescue_time,
            height: config.rescue_height,
        }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }
}

/// Which animation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    Explosion,
    Rescue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KartAnimation {
    Explosion(ExplosionAnimation),
    Rescue(RescueAnimation),
}

impl KartAnimation {
    pub fn kind(&self) -> AnimationKind {
        match self {
            KartAnimation::Explosion(_) => AnimationKind::Explosion,
            KartAnimation::Rescue(_) => AnimationKind::Rescue,
        }
    }

    fn elapsed_mut(&mut self) -> (&mut f32, f32) {
        match self {
            KartAnimation::Explosion(a) => (&mut a.elapsed, a.duration),
            KartAnimation::Rescue(a) => (&mut a.elapsed, a.duration),
        }
    }

    /// Advance by `dt`. Returns true once the animation has run its course.
    pub fn update(&mut self, dt: f32) -> bool {
        let (elapsed, duration) = self.elapsed_mut();
        *elapsed = (*elapsed + dt).min(duration);
        *elapsed >= duration
    }

    pub fn is_finished(&self) -> bool {
        match self {
            KartAnimation::Explosion(a) => a.elapsed >= a.duration,
            KartAnimation::Rescue(a) => a.elapsed >= a.duration,
        }
    }

    /// Current position and euler rotation (pitch, yaw, roll).
    pub fn transform(&self) -> (Vec3, Vec3) {
        match self {
            KartAnimation::Explosion(a) => {
                let mut position = a.start;
                position.y = a.height_at(a.elapsed);
                let progress = a.elapsed / a.duration;
                let rotation = Vec3::new(0.0, a.yaw, 0.0) + a.tumble * progress;
                (position, rotation)
            }
            KartAnimation::Rescue(a) => {
                let progress = a.elapsed / a.duration;
                let position = a.start + Vec3::Y * (a.height * progress);
                (position, Vec3::new(0.0, a.yaw, 0.0))
            }
        }
    }

    /// Where the body goes when the animation ends, and its yaw.
    pub fn end_transform(&self) -> (Vec3, f32) {
        match self {
            KartAnimation::Explosion(a) => (a.start, a.yaw),
            KartAnimation::Rescue(a) => (a.target, a.target_yaw),
        }
    }
}
