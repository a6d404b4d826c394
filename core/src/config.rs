//! Gameplay tuning (gameplay.toml)
//!
//! Every constant that changes race outcomes lives here so that networked
//! peers can compare a single hash before racing. Sections map 1:1 to TOML
//! tables; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use racekit_shared::constants::MAX_POWERUPS;

/// Complete gameplay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameplayConfig {
    #[serde(default)]
    pub race: RaceConfig,
    #[serde(default)]
    pub kart: KartConfig,
    #[serde(default)]
    pub attachment: AttachmentConfig,
    #[serde(default)]
    pub powerup: PowerupConfig,
    #[serde(default)]
    pub explosion: ExplosionConfig,
    #[serde(default)]
    pub skidding: SkiddingConfig,
    #[serde(default)]
    pub projectile: ProjectileConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
}

/// Race rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RaceMode {
    #[default]
    Normal,
    /// Single kart against the clock, starts with a zipper.
    TimeTrial,
    /// Karts are eliminated from the back while kart 0 leads.
    FollowTheLeader,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    pub mode: RaceMode,
    pub num_laps: u32,
    /// Seconds spent in READY before SET.
    pub ready_time: f32,
    /// Seconds spent in SET before GO.
    pub set_time: f32,
    /// Seconds spent in GO before RACE.
    pub go_time: f32,
    /// Grace period after all players finished before AI times are estimated.
    pub delay_finish_time: f32,
    /// Follow-the-leader countdown intervals. The first one is popped after
    /// each elimination until only the last remains.
    pub leader_intervals: Vec<f32>,
    /// Extra countdown seconds per kart still racing.
    pub leader_time_per_kart: f32,
    /// Seconds a collected item stays disabled.
    pub item_respawn_time: f32,
    /// Ring buffer size for history recording, in ticks.
    pub max_history: usize,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            mode: RaceMode::Normal,
            num_laps: 3,
            ready_time: 1.0,
            set_time: 1.0,
            go_time: 1.0,
            delay_finish_time: 10.0,
            leader_intervals: vec![30.0, 20.0],
            leader_time_per_kart: 0.0,
            item_respawn_time: 2.0,
            max_history: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KartConfig {
    /// Mass in kg.
    pub mass: f32,
    /// Engine force in newtons at full throttle.
    pub engine_force: f32,
    pub max_speed: f32,
    pub max_speed_reverse: f32,
    pub brake_deceleration: f32,
    /// Velocity fraction lost per second when coasting.
    pub rolling_drag: f32,
    /// Maximum front wheel angle in radians.
    pub max_steer_angle: f32,
    pub wheel_base: f32,
    /// How fast sideways velocity is cancelled, per second.
    pub lateral_grip: f32,
    /// Collision sphere radius used for kart-kart contacts.
    pub radius: f32,
    /// Herrings needed for the largest powerup pickup.
    pub max_herrings: u32,
}

impl Default for KartConfig {
    fn default() -> Self {
        Self {
            mass: 225.0,
            engine_force: 4400.0,
            max_speed: 25.0,
            max_speed_reverse: 8.0,
            brake_deceleration: 30.0,
            rolling_drag: 0.3,
            max_steer_angle: 0.55,
            wheel_base: 1.6,
            lateral_grip: 8.0,
            radius: 1.0,
            max_herrings: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    pub bomb_time: f32,
    /// Added to the remaining time when a bomb changes owner. Negative
    /// values make passed bombs more dangerous.
    pub bomb_time_increase: f32,
    pub anvil_time: f32,
    /// Mass added while an anvil is attached.
    pub anvil_weight: f32,
    /// Speed multiplier applied once when an anvil is attached.
    pub anvil_speed_factor: f32,
    pub parachute_time: f32,
    /// Parachute time for karts hit by another kart's parachute powerup.
    pub parachute_time_other: f32,
    /// Drag multiplier while a parachute is open.
    pub parachute_friction: f32,
    pub parachute_lbound_fraction: f32,
    pub parachute_ubound_fraction: f32,
    pub parachute_max_speed: f32,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            bomb_time: 30.0,
            bomb_time_increase: -5.0,
            anvil_time: 2.0,
            anvil_weight: 150.0,
            anvil_speed_factor: 0.5,
            parachute_time: 4.0,
            parachute_time_other: 8.0,
            parachute_friction: 2.0,
            parachute_lbound_fraction: 0.5,
            parachute_ubound_fraction: 0.95,
            parachute_max_speed: 23.0,
        }
    }
}

/// What happens when a kart collects a box while already holding a powerup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamePowerupMode {
    /// The new powerup replaces the old one.
    New,
    /// The count grows, the held type is kept.
    Same,
    /// The count grows only if the new type matches, otherwise nothing.
    #[default]
    OnlyIfSame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerupConfig {
    pub same_powerup_mode: SamePowerupMode,
    pub max_powerups: u8,
    /// Numerator of the position-scaled harmful item chance, in percent.
    pub special_probability: u32,
    pub zipper_time: f32,
    /// Speed added immediately when a zipper fires.
    pub zipper_speed_gain: f32,
    /// Temporary max speed increase while the zipper is active.
    pub zipper_max_speed_increase: f32,
    pub zipper_force: f32,
    /// Shield charges granted by a shield powerup.
    pub shield_charges: u8,
}

impl Default for PowerupConfig {
    fn default() -> Self {
        Self {
            same_powerup_mode: SamePowerupMode::OnlyIfSame,
            max_powerups: MAX_POWERUPS,
            special_probability: 15,
            zipper_time: 3.5,
            zipper_speed_gain: 4.5,
            zipper_max_speed_increase: 15.0,
            zipper_force: 250.0,
            shield_charges: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplosionConfig {
    /// Duration of the toss-and-land animation.
    pub explosion_time: f32,
    /// Maximum tumble per axis over the whole animation, direct hits.
    pub max_rotation_direct: f32,
    /// Maximum tumble per axis over the whole animation, splash hits.
    pub max_rotation_indirect: f32,
    /// Invulnerability after landing.
    pub invulnerability_time: f32,
    pub rescue_time: f32,
    pub rescue_height: f32,
    /// Karts this far below the lowest track point are rescued.
    pub fall_rescue_depth: f32,
}

impl Default for ExplosionConfig {
    fn default() -> Self {
        Self {
            explosion_time: 2.0,
            max_rotation_direct: 4.0 * std::f32::consts::PI,
            max_rotation_indirect: 2.0 * std::f32::consts::PI,
            invulnerability_time: 2.5,
            rescue_time: 1.2,
            rescue_height: 4.0,
            fall_rescue_depth: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkiddingConfig {
    /// Karts slower than this cannot start skidding and break out of one.
    pub min_skid_speed: f32,
    pub skid_max: f32,
    /// Seconds from 1.0 to `skid_max` while skidding.
    pub time_till_max_skid: f32,
    /// Seconds from `skid_max` back to 1.0 after skidding stops.
    pub skid_decrease_time: f32,
    /// Seconds for the visual rotation to reach full deflection.
    pub skid_visual_time: f32,
    pub reduce_turn_min: f32,
    pub reduce_turn_max: f32,
    /// Length of the hop when a skid starts. Re-entry is locked while it runs.
    pub physical_jump_time: f32,
    /// Duration of the SHOW_GFX state after releasing a skid.
    pub show_gfx_time: f32,
    /// Skid durations needed for each bonus tier, strictly increasing.
    pub time_till_bonus: Vec<f32>,
    pub bonus_speed: Vec<f32>,
    pub bonus_time: Vec<f32>,
    pub bonus_force: Vec<f32>,
}

impl Default for SkiddingConfig {
    fn default() -> Self {
        Self {
            min_skid_speed: 10.0,
            skid_max: 2.5,
            time_till_max_skid: 0.4,
            skid_decrease_time: 0.3,
            skid_visual_time: 0.5,
            reduce_turn_min: 0.3,
            reduce_turn_max: 0.8,
            physical_jump_time: 0.1,
            show_gfx_time: 0.3,
            time_till_bonus: vec![1.0, 3.0],
            bonus_speed: vec![4.5, 6.5],
            bonus_time: vec![1.0, 2.0],
            bonus_force: vec![150.0, 250.0],
        }
    }
}

/// Flight parameters of one projectile type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileParams {
    pub speed: f32,
    pub lifetime: f32,
    /// Radius for direct hits.
    pub hit_radius: f32,
    /// Heading change in radians per second towards the target. Zero
    /// disables homing.
    pub homing_turn_rate: f32,
    pub max_homing_distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    /// Karts within this distance of an impact are hit indirectly.
    pub explosion_radius: f32,
    /// Visual lifetime of an explosion effect.
    pub explosion_effect_time: f32,
    /// Seconds during which a projectile cannot hit its owner.
    pub owner_grace_time: f32,
    pub bowling: ProjectileParams,
    pub cake: ProjectileParams,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            explosion_radius: 5.0,
            explosion_effect_time: 1.0,
            owner_grace_time: 0.5,
            bowling: ProjectileParams {
                speed: 22.0,
                lifetime: 8.0,
                hit_radius: 1.2,
                homing_turn_rate: 0.0,
                max_homing_distance: 0.0,
            },
            cake: ProjectileParams {
                speed: 30.0,
                lifetime: 6.0,
                hit_radius: 1.0,
                homing_turn_rate: 2.5,
                max_homing_distance: 80.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f32,
    /// A body within this height above the ground snaps onto it.
    pub ground_snap: f32,
    /// Velocity kept along the contact normal after a kart-kart bump.
    pub restitution: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            ground_snap: 0.3,
            restitution: 0.5,
        }
    }
}

impl GameplayConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Hash of every tuning value. Peers compare this before racing.
    pub fn config_hash(&self) -> Result<u64, ConfigError> {
        let canonical = toml::to_string(self)?;
        Ok(xxhash_rust::xxh3::xxh3_64(canonical.as_bytes()))
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("race.go_time", self.race.go_time)?;
        non_negative("race.ready_time", self.race.ready_time)?;
        non_negative("race.set_time", self.race.set_time)?;
        non_negative("race.delay_finish_time", self.race.delay_finish_time)?;
        non_negative("race.leader_time_per_kart", self.race.leader_time_per_kart)?;
        if self.race.leader_intervals.is_empty()
            || self.race.leader_intervals.iter().any(|t| !(*t > 0.0))
        {
            return Err(ConfigError::EmptyLeaderIntervals);
        }

        positive("kart.mass", self.kart.mass)?;
        positive("kart.max_speed", self.kart.max_speed)?;
        positive("kart.wheel_base", self.kart.wheel_base)?;
        positive("kart.radius", self.kart.radius)?;

        non_negative("attachment.bomb_time", self.attachment.bomb_time)?;
        non_negative("attachment.anvil_time", self.attachment.anvil_time)?;
        non_negative("attachment.parachute_time", self.attachment.parachute_time)?;
        positive(
            "attachment.parachute_max_speed",
            self.attachment.parachute_max_speed,
        )?;
        if !(self.attachment.parachute_lbound_fraction
            <= self.attachment.parachute_ubound_fraction)
        {
            return Err(ConfigError::OutOfRange {
                field: "attachment.parachute_lbound_fraction",
                expected: "<= parachute_ubound_fraction",
                value: self.attachment.parachute_lbound_fraction,
            });
        }

        if self.powerup.max_powerups == 0 || self.powerup.max_powerups > 15 {
            return Err(ConfigError::OutOfRange {
                field: "powerup.max_powerups",
                expected: "between 1 and 15",
                value: self.powerup.max_powerups as f32,
            });
        }

        positive("explosion.explosion_time", self.explosion.explosion_time)?;
        positive("explosion.rescue_time", self.explosion.rescue_time)?;

        let skid = &self.skidding;
        if !(skid.skid_max >= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "skidding.skid_max",
                expected: ">= 1.0",
                value: skid.skid_max,
            });
        }
        positive("skidding.time_till_max_skid", skid.time_till_max_skid)?;
        positive("skidding.skid_decrease_time", skid.skid_decrease_time)?;
        positive("skidding.skid_visual_time", skid.skid_visual_time)?;
        if !(skid.reduce_turn_min <= skid.reduce_turn_max) {
            return Err(ConfigError::OutOfRange {
                field: "skidding.reduce_turn_min",
                expected: "<= reduce_turn_max",
                value: skid.reduce_turn_min,
            });
        }
        let n = skid.time_till_bonus.len();
        if skid.bonus_speed.len() != n
            || skid.bonus_time.len() != n
            || skid.bonus_force.len() != n
            || skid.time_till_bonus.windows(2).any(|w| !(w[0] < w[1]))
        {
            return Err(ConfigError::SkidBonusTable);
        }

        positive("physics.gravity", self.physics.gravity)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "> 0",
            value,
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: ">= 0",
            value,
        })
    }
}
