//! Visual-only explosion effect.

use glam::Vec3;

#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionEffect {
    pub position: Vec3,
    age: f32,
    duration: f32,
}

impl ExplosionEffect {
    pub fn new(position: Vec3, duration: f32) -> Self {
        Self {
            position,
            age: 0.0,
            duration,
        }
    }

    /// Normalized progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.age / self.duration).min(1.0)
        }
    }

    /// Returns true once the effect is over.
    pub fn update(&mut self, dt: f32) -> bool {
        self.age += dt;
        self.age >= self.duration
    }
}
