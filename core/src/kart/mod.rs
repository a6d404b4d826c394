//! Kart record and its per-kart state machines.
//!
//! A [`Kart`] owns gameplay state only. Kinematics live in the physics body
//! referenced by [`Kart::body`]; the kart keeps a view transform that is
//! refreshed every tick from the body or from the active animation.

mod animation;
mod attachment;
mod controller;
mod powerup;
mod skidding;
mod speed;

#[cfg(test)]
mod tests;

pub use animation::{AnimationKind, ExplosionAnimation, KartAnimation, RescueAnimation};
pub use attachment::{Attachment, AttachmentType, BananaOutcome};
pub use controller::{Controller, DriverView};
pub use powerup::{
    Powerup, PowerupType, decode_add_info, encode_add_info, pickup_count, roll_powerup,
};
pub use skidding::{SkidBonus, SkidInput, SkidState, Skidding};
pub use speed::{SpeedModifiers, SpeedSource};

use glam::Vec3;
use racekit_shared::{KartControl, KartId};

use crate::config::{GameplayConfig, RaceMode};
use crate::physics::BodyHandle;

/// Render scale of a shrunk kart.
const SHRUNK_SCALE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct Kart {
    pub id: KartId,
    pub name: String,
    pub controller: Controller,
    pub body: BodyHandle,

    /// View transform: position and euler rotation (pitch, yaw, roll).
    pub position: Vec3,
    pub rotation: Vec3,
    /// Forward speed read back from physics.
    pub speed: f32,
    pub on_ground: bool,

    /// 1-based race position.
    pub race_position: u32,
    pub lap: i32,
    pub distance: f32,
    /// Last distance at which the kart had ground below it.
    pub last_valid_distance: f32,
    pub finished: bool,
    pub finish_time: f32,
    pub eliminated: bool,

    pub herrings: u32,
    pub attachment: Attachment,
    pub powerup: Powerup,
    pub skidding: Skidding,
    pub animation: Option<KartAnimation>,
    pub speed_modifiers: SpeedModifiers,
    pub shield: u8,
    pub invulnerable_time: f32,
    base_mass: f32,

    /// Control applied in the current tick.
    pub control: KartControl,
    /// Control applied in the previous tick, for edge-triggered buttons.
    pub previous_control: KartControl,
}

impl Kart {
    pub fn new(id: KartId, name: impl Into<String>, controller: Controller, body: BodyHandle, mass: f32) -> Self {
        Self {
            id,
            name: name.into(),
            controller,
            body,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            speed: 0.0,
            on_ground: true,
            race_position: id.index() as u32 + 1,
            lap: 0,
            distance: 0.0,
            last_valid_distance: 0.0,
            finished: false,
            finish_time: 0.0,
            eliminated: false,
            herrings: 0,
            attachment: Attachment::default(),
            powerup: Powerup::default(),
            skidding: Skidding::default(),
            animation: None,
            speed_modifiers: SpeedModifiers::default(),
            shield: 0,
            invulnerable_time: 0.0,
            base_mass: mass,
            control: KartControl::default(),
            previous_control: KartControl::default(),
        }
    }

    /// Race start state.
    pub fn reset(&mut self, mode: RaceMode) {
        self.lap = 0;
        self.finished = false;
        self.finish_time = 0.0;
        self.eliminated = false;
        self.herrings = 0;
        self.attachment.clear();
        self.powerup.reset(mode);
        self.skidding.reset();
        self.animation = None;
        self.speed_modifiers.clear();
        self.shield = 0;
        self.invulnerable_time = 0.0;
        self.control = KartControl::default();
        self.previous_control = KartControl::default();
    }

    pub fn yaw(&self) -> f32 {
        self.rotation.y
    }

    /// Still competing: neither eliminated nor finished.
    pub fn is_racing(&self) -> bool {
        !self.eliminated && !self.finished
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_time > 0.0
    }

    pub fn is_shielded(&self) -> bool {
        self.shield > 0
    }

    /// Spend one shield charge. Returns false when there was none.
    pub fn consume_shield(&mut self) -> bool {
        if self.shield == 0 {
            return false;
        }
        self.shield -= 1;
        true
    }

    /// Body mass including an attached anvil.
    pub fn mass(&self, config: &GameplayConfig) -> f32 {
        if self.attachment.is(AttachmentType::Anvil) {
            self.base_mass + config.attachment.anvil_weight
        } else {
            self.base_mass
        }
    }

    /// Rolling drag multiplier including an open parachute.
    pub fn drag_multiplier(&self, config: &GameplayConfig) -> f32 {
        if self.attachment.is(AttachmentType::Parachute) {
            config.attachment.parachute_friction
        } else {
            1.0
        }
    }

    pub fn max_speed(&self, config: &GameplayConfig) -> f32 {
        config.kart.max_speed + self.speed_modifiers.max_speed_bonus()
    }

    pub fn visual_scale(&self) -> f32 {
        if self.attachment.is(AttachmentType::Shrunk) {
            SHRUNK_SCALE
        } else {
            1.0
        }
    }

    /// Attach `kind`, recording the current speed for parachutes.
    pub fn set_attachment(&mut self, kind: AttachmentType, duration: f32, previous_owner: Option<KartId>) {
        self.attachment.set(kind, duration, previous_owner);
        if kind == AttachmentType::Parachute {
            self.attachment.set_initial_speed(self.speed);
        }
    }

    /// True on the tick `fire` goes down.
    pub fn fire_pressed(&self) -> bool {
        self.control.fire && !self.previous_control.fire
    }

    pub fn rescue_pressed(&self) -> bool {
        self.control.rescue && !self.previous_control.rescue
    }

    /// Latch a new control for this tick, quantized to wire precision so
    /// local, network and replayed karts drive on identical input.
    pub fn apply_control(&mut self, control: KartControl) {
        self.previous_control = self.control;
        self.control = control.pack().unpack();
    }

    /// Per-tick timers that do not need the rest of the world.
    pub fn update_timers(&mut self, dt: f32) {
        self.invulnerable_time = (self.invulnerable_time - dt).max(0.0);
        self.speed_modifiers.update(dt);
    }
}
