//! Rigid-body integration behind a trait.
//!
//! The world only talks to [`PhysicsBackend`]: it sets one [`DriveInput`]
//! per body, steps once per tick, then reads positions and kart-kart
//! contacts back. Bodies that are detached (animated karts) keep their slot
//! but are skipped by integration and contact generation.

mod arcade;

pub use arcade::ArcadePhysics;

use glam::Vec3;

use crate::track::GroundQuery;

/// Index of a body inside a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

impl BodyHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBody {
    pub position: Vec3,
    /// Heading around +Y; zero faces +Z.
    pub yaw: f32,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub mass: f32,
    pub on_ground: bool,
    /// Detached bodies are ignored by the simulation.
    pub attached: bool,
}

impl RigidBody {
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    /// Velocity along the heading.
    pub fn speed(&self) -> f32 {
        self.velocity.dot(self.forward())
    }
}

/// Per-tick driving request for one body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveInput {
    /// Throttle in `[0, 1]`.
    pub throttle: f32,
    /// Brake, or reverse once stopped.
    pub brake: bool,
    /// Front wheel angle in radians, positive steers right.
    pub steer_angle: f32,
    pub max_speed: f32,
    /// Force added on top of the engine (zipper, skid bonus).
    pub extra_force: f32,
    /// Multiplier on rolling drag (parachute).
    pub drag_multiplier: f32,
    /// Divides lateral grip while skidding.
    pub skid_factor: f32,
}

impl Default for DriveInput {
    fn default() -> Self {
        Self {
            throttle: 0.0,
            brake: false,
            steer_angle: 0.0,
            max_speed: f32::MAX,
            extra_force: 0.0,
            drag_multiplier: 1.0,
            skid_factor: 1.0,
        }
    }
}

/// Two bodies touching after the last step, `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KartContact {
    pub a: BodyHandle,
    pub b: BodyHandle,
}

pub trait PhysicsBackend {
    fn add_body(&mut self, position: Vec3, yaw: f32, mass: f32) -> BodyHandle;

    fn body(&self, handle: BodyHandle) -> Option<&RigidBody>;

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody>;

    fn set_drive(&mut self, handle: BodyHandle, drive: DriveInput);

    /// Advance every attached body by `dt`.
    fn step(&mut self, dt: f32, ground: &dyn GroundQuery);

    /// Contacts found by the last [`step`](Self::step).
    fn contacts(&self) -> &[KartContact];

    /// Take the body out of the simulation.
    fn detach(&mut self, handle: BodyHandle) {
        if let Some(body) = self.body_mut(handle) {
            body.attached = false;
        }
    }

    /// Put the body back with zeroed velocities.
    fn attach(&mut self, handle: BodyHandle) {
        if let Some(body) = self.body_mut(handle) {
            body.attached = true;
            body.velocity = Vec3::ZERO;
            body.angular_velocity = Vec3::ZERO;
        }
    }
}
