//! Per-kart attachment: parachute, bomb, anvil or shrink.

use racekit_shared::KartId;

use crate::config::AttachmentConfig;

/// Parachute initial speed never drops below this, so a parachute attached
/// to a stopped kart still releases.
const MIN_PARACHUTE_SPEED: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentType {
    #[default]
    None,
    Parachute,
    Bomb,
    Anvil,
    /// Kart is shrunk while being rescued.
    Shrunk,
}

impl AttachmentType {
    /// Attachment handed out by a banana for one random draw.
    pub fn from_draw(draw: u32) -> Self {
        match draw % 3 {
            0 => AttachmentType::Parachute,
            1 => AttachmentType::Bomb,
            _ => AttachmentType::Anvil,
        }
    }

    /// Configured lifetime of a freshly attached item.
    pub fn default_duration(self, config: &AttachmentConfig) -> f32 {
        match self {
            AttachmentType::Parachute => config.parachute_time,
            AttachmentType::Bomb => config.bomb_time,
            AttachmentType::Anvil => config.anvil_time,
            AttachmentType::Shrunk | AttachmentType::None => 0.0,
        }
    }
}

/// What a banana did to a kart's attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BananaOutcome {
    /// The carried bomb went off; `next` was attached afterwards.
    BombExploded { next: AttachmentType },
    /// `kind` is now attached.
    Attached(AttachmentType),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attachment {
    kind: AttachmentType,
    time_left: f32,
    previous_owner: Option<KartId>,
    /// Kart speed when a parachute opened.
    initial_speed: f32,
}

impl Attachment {
    pub fn kind(&self) -> AttachmentType {
        self.kind
    }

    pub fn time_left(&self) -> f32 {
        self.time_left
    }

    /// Kart that passed the current bomb over, if any.
    pub fn previous_owner(&self) -> Option<KartId> {
        self.previous_owner
    }

    pub fn is(&self, kind: AttachmentType) -> bool {
        self.kind == kind
    }

    /// Replace whatever is attached.
    pub fn set(&mut self, kind: AttachmentType, duration: f32, previous_owner: Option<KartId>) {
        self.kind = kind;
        self.time_left = duration;
        self.previous_owner = previous_owner;
        self.initial_speed = 0.0;
    }

    /// Remember the speed a parachute has to slow down from.
    pub fn set_initial_speed(&mut self, speed: f32) {
        self.initial_speed = speed.max(MIN_PARACHUTE_SPEED);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Force the current attachment to expire on the next update.
    pub fn expire_now(&mut self) {
        self.time_left = 0.0;
    }

    /// Tick the timer. Returns the kind that expired this tick.
    pub fn update(
        &mut self,
        dt: f32,
        speed: f32,
        config: &AttachmentConfig,
    ) -> Option<AttachmentType> {
        if self.kind == AttachmentType::None {
            return None;
        }

        self.time_left -= dt;

        if self.kind == AttachmentType::Parachute {
            let f = (self.initial_speed / config.parachute_max_speed).min(1.0);
            let fraction = config.parachute_lbound_fraction
                + f * (config.parachute_ubound_fraction - config.parachute_lbound_fraction);
            if speed <= self.initial_speed * fraction {
                self.time_left = -1.0;
            }
        }

        if self.time_left <= 0.0 {
            let expired = self.kind;
            self.clear();
            return Some(expired);
        }
        None
    }

    /// Apply a banana hit. `rolled` is the attachment chosen by the random
    /// draw for this hit.
    pub fn hit_banana(&mut self, rolled: AttachmentType, config: &AttachmentConfig) -> BananaOutcome {
        match self.kind {
            AttachmentType::Bomb => {
                self.clear();
                self.set(rolled, rolled.default_duration(config), None);
                BananaOutcome::BombExploded { next: rolled }
            }
            AttachmentType::Anvil | AttachmentType::Parachute => {
                let leftover = self.time_left.max(0.0);
                self.set(AttachmentType::Anvil, config.anvil_time + leftover, None);
                BananaOutcome::Attached(AttachmentType::Anvil)
            }
            AttachmentType::None | AttachmentType::Shrunk => {
                self.set(rolled, rolled.default_duration(config), None);
                BananaOutcome::Attached(rolled)
            }
        }
    }
}
