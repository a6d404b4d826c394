//! Per-kart collectable powerup.

use crate::config::{RaceMode, SamePowerupMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PowerupType {
    #[default]
    None = 0,
    Bowling = 1,
    Cake = 2,
    Zipper = 3,
    Anvil = 4,
    Parachute = 5,
    Shield = 6,
}

impl PowerupType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => PowerupType::None,
            1 => PowerupType::Bowling,
            2 => PowerupType::Cake,
            3 => PowerupType::Zipper,
            4 => PowerupType::Anvil,
            5 => PowerupType::Parachute,
            6 => PowerupType::Shield,
            _ => return None,
        })
    }

    /// Powerups that only hurt other karts.
    pub fn is_harmful(self) -> bool {
        matches!(self, PowerupType::Anvil | PowerupType::Parachute)
    }

    pub fn is_projectile(self) -> bool {
        matches!(self, PowerupType::Bowling | PowerupType::Cake)
    }
}

const BENEFICIAL: [PowerupType; 4] = [
    PowerupType::Bowling,
    PowerupType::Cake,
    PowerupType::Zipper,
    PowerupType::Shield,
];
const HARMFUL: [PowerupType; 2] = [PowerupType::Anvil, PowerupType::Parachute];

/// Pick a powerup from one random draw.
///
/// The chance of a harmful item is `special_probability / (active / position)`
/// percent, so karts further back get them more often.
pub fn roll_powerup(draw: u32, position: u32, active_karts: u32, special_probability: u32) -> PowerupType {
    let roll = draw % 100;
    let choice = (draw / 100) as usize;
    let position = position.clamp(1, active_karts.max(1));
    // roll < special * position / active, without the division.
    let harmful = (roll as u64) * (active_karts.max(1) as u64)
        < (special_probability as u64) * (position as u64);
    if harmful {
        HARMFUL[choice % HARMFUL.len()]
    } else {
        BENEFICIAL[choice % BENEFICIAL.len()]
    }
}

/// Number of items granted for a pickup, scaled by collected herrings.
pub fn pickup_count(herrings: u32, max_herrings: u32) -> u8 {
    let max = max_herrings.max(1);
    (1 + 4 * herrings.min(max) / max) as u8
}

/// Pack a pickup result into one byte: type high nibble, count low nibble.
pub fn encode_add_info(kind: PowerupType, count: u8) -> u8 {
    ((kind as u8) << 4) | (count & 0x0F)
}

pub fn decode_add_info(info: u8) -> Option<(PowerupType, u8)> {
    PowerupType::from_u8(info >> 4).map(|kind| (kind, info & 0x0F))
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Powerup {
    kind: PowerupType,
    count: u8,
}

impl Powerup {
    pub fn kind(&self) -> PowerupType {
        self.kind
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.kind == PowerupType::None
    }

    /// Race start state. Time trials start with one zipper.
    pub fn reset(&mut self, mode: RaceMode) {
        if mode == RaceMode::TimeTrial {
            self.set(PowerupType::Zipper, 1, u8::MAX);
        } else {
            self.set(PowerupType::None, 0, u8::MAX);
        }
    }

    /// Replace the held powerup. A zero count or `None` empties the slot.
    pub fn set(&mut self, kind: PowerupType, count: u8, max: u8) {
        if kind == PowerupType::None || count == 0 {
            self.kind = PowerupType::None;
            self.count = 0;
        } else {
            self.kind = kind;
            self.count = count.min(max);
        }
    }

    /// Consume one item. Returns the type that was used.
    pub fn use_one(&mut self) -> Option<PowerupType> {
        if self.is_empty() {
            return None;
        }
        let used = self.kind;
        self.count = self.count.saturating_sub(1);
        if self.count == 0 {
            self.kind = PowerupType::None;
        }
        Some(used)
    }

    /// Add a picked-up powerup according to `mode`.
    pub fn pickup(&mut self, kind: PowerupType, count: u8, mode: SamePowerupMode, max: u8) {
        if kind == PowerupType::None || count == 0 {
            return;
        }
        if self.is_empty() || mode == SamePowerupMode::New {
            self.set(kind, count, max);
            return;
        }
        if mode == SamePowerupMode::Same || kind == self.kind {
            self.count = self.count.saturating_add(count).min(max);
        }
    }
}
