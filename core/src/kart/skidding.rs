//! Skid (drift) state machine.
//!
//! Holding the skid button while steering accumulates skid time. Releasing
//! it pays out a speed bonus picked from the `time_till_bonus` table.

use crate::config::SkiddingConfig;

/// Steering below this magnitude has no direction.
const STEER_DEADZONE: f32 = 0.01;
/// Visual rotation snaps to its target once closer than this.
const VISUAL_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SkidState {
    #[default]
    None,
    AccumulateLeft,
    AccumulateRight,
    ShowGfxLeft,
    ShowGfxRight,
    /// Kart got too slow; waits for the button to be released.
    Break,
}

impl SkidState {
    pub fn is_accumulating(self) -> bool {
        matches!(self, SkidState::AccumulateLeft | SkidState::AccumulateRight)
    }
}

/// Inputs the skid model reads each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkidInput {
    pub skid: bool,
    /// Player steering in `[-1, 1]`, negative is left.
    pub steer: f32,
    pub speed: f32,
    pub on_ground: bool,
}

/// Reward paid when a skid is released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkidBonus {
    /// 1-based tier index.
    pub tier: usize,
    pub speed: f32,
    pub time: f32,
    pub force: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skidding {
    state: SkidState,
    skid_factor: f32,
    skid_time: f32,
    visual_rotation: f32,
    jump_time_left: f32,
    show_gfx_left: f32,
}

impl Default for Skidding {
    fn default() -> Self {
        Self {
            state: SkidState::None,
            skid_factor: 1.0,
            skid_time: 0.0,
            visual_rotation: 0.0,
            jump_time_left: 0.0,
            show_gfx_left: 0.0,
        }
    }
}

impl Skidding {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> SkidState {
        self.state
    }

    /// Lateral grip divisor in `[1, skid_max]`.
    pub fn skid_factor(&self) -> f32 {
        self.skid_factor
    }

    /// Body yaw offset for rendering, in `[-1, 1]`.
    pub fn visual_rotation(&self) -> f32 {
        self.visual_rotation
    }

    pub fn skid_time(&self) -> f32 {
        self.skid_time
    }

    /// True while the entry hop is in the air.
    pub fn is_jumping(&self) -> bool {
        self.jump_time_left > 0.0
    }

    pub fn update(&mut self, dt: f32, input: SkidInput, config: &SkiddingConfig) -> Option<SkidBonus> {
        self.jump_time_left = (self.jump_time_left - dt).max(0.0);
        let mut bonus = None;

        match self.state {
            SkidState::None => {
                if input.skid
                    && input.on_ground
                    && input.speed >= config.min_skid_speed
                    && input.steer.abs() > STEER_DEADZONE
                    && !self.is_jumping()
                {
                    self.state = if input.steer < 0.0 {
                        SkidState::AccumulateLeft
                    } else {
                        SkidState::AccumulateRight
                    };
                    self.skid_time = 0.0;
                    self.jump_time_left = config.physical_jump_time;
                }
            }
            SkidState::AccumulateLeft | SkidState::AccumulateRight => {
                if input.speed < config.min_skid_speed {
                    self.state = SkidState::Break;
                    self.skid_time = 0.0;
                } else if !input.skid {
                    bonus = bonus_for(self.skid_time, config);
                    self.state = if self.state == SkidState::AccumulateLeft {
                        SkidState::ShowGfxLeft
                    } else {
                        SkidState::ShowGfxRight
                    };
                    self.show_gfx_left = config.show_gfx_time;
                    self.skid_time = 0.0;
                } else {
                    self.skid_time += dt;
                }
            }
            SkidState::ShowGfxLeft | SkidState::ShowGfxRight => {
                self.show_gfx_left -= dt;
                if input.speed < config.min_skid_speed {
                    self.show_gfx_left = 0.0;
                    self.state = SkidState::Break;
                } else if self.show_gfx_left <= 0.0 {
                    self.show_gfx_left = 0.0;
                    self.state = SkidState::None;
                }
            }
            SkidState::Break => {
                if !input.skid {
                    self.state = SkidState::None;
                }
            }
        }

        let span = config.skid_max - 1.0;
        if self.state.is_accumulating() {
            self.skid_factor += span / config.time_till_max_skid * dt;
        } else {
            self.skid_factor -= span / config.skid_decrease_time * dt;
        }
        self.skid_factor = self.skid_factor.clamp(1.0, config.skid_max);

        let target = match self.state {
            SkidState::AccumulateLeft => -1.0,
            SkidState::AccumulateRight => 1.0,
            _ => 0.0,
        };
        let diff = target - self.visual_rotation;
        if diff.abs() > VISUAL_EPSILON {
            let step = dt / config.skid_visual_time;
            self.visual_rotation += diff.signum() * diff.abs().min(step);
        } else {
            self.visual_rotation = target;
        }
        self.visual_rotation = self.visual_rotation.clamp(-1.0, 1.0);

        bonus
    }

    /// Steering actually applied for the player's `steer`.
    ///
    /// While accumulating, the full stick range maps onto
    /// `[reduce_turn_min, reduce_turn_max]` on the skid side.
    pub fn steering(&self, steer: f32, config: &SkiddingConfig) -> f32 {
        let (min, max) = (config.reduce_turn_min, config.reduce_turn_max);
        match self.state {
            SkidState::AccumulateRight => min + (max - min) * (steer + 1.0) * 0.5,
            SkidState::AccumulateLeft => -min + (max - min) * (steer - 1.0) * 0.5,
            _ => steer,
        }
    }

    /// Player steering needed to get `real` steering while skidding.
    pub fn steering_when_skidding(&self, real: f32, config: &SkiddingConfig) -> f32 {
        let (min, max) = (config.reduce_turn_min, config.reduce_turn_max);
        let range = max - min;
        if range <= 0.0 {
            return 0.0;
        }
        let steer = match self.state {
            SkidState::AccumulateRight => 2.0 * (real - min) / range - 1.0,
            SkidState::AccumulateLeft => 2.0 * (real + min) / range + 1.0,
            _ => real,
        };
        steer.clamp(-1.0, 1.0)
    }
}

fn bonus_for(skid_time: f32, config: &SkiddingConfig) -> Option<SkidBonus> {
    let tier = config
        .time_till_bonus
        .iter()
        .take_while(|threshold| skid_time >= **threshold)
        .count();
    if tier == 0 {
        return None;
    }
    let i = tier - 1;
    Some(SkidBonus {
        tier,
        speed: config.bonus_speed[i],
        time: config.bonus_time[i],
        force: config.bonus_force[i],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn skidding_right() -> SkidInput {
        SkidInput {
            skid: true,
            steer: 0.8,
            speed: 20.0,
            on_ground: true,
        }
    }

    fn run(s: &mut Skidding, input: SkidInput, seconds: f32, cfg: &SkiddingConfig) -> Vec<SkidBonus> {
        let ticks = (seconds / DT).round() as usize;
        (0..ticks).filter_map(|_| s.update(DT, input, cfg)).collect()
    }

    #[test]
    fn test_enters_accumulate_on_ground() {
        let cfg = SkiddingConfig::default();
        let mut s = Skidding::default();
        s.update(DT, skidding_right(), &cfg);
        assert_eq!(s.state(), SkidState::AccumulateRight);
        assert!(s.is_jumping());

        let mut left = Skidding::default();
        left.update(DT, SkidInput { steer: -0.5, ..skidding_right() }, &cfg);
        assert_eq!(left.state(), SkidState::AccumulateLeft);
    }

    #[test]
    fn test_entry_requirements() {
        let cfg = SkiddingConfig::default();
        for input in [
            SkidInput { on_ground: false, ..skidding_right() },
            SkidInput { speed: 5.0, ..skidding_right() },
            SkidInput { steer: 0.0, ..skidding_right() },
            SkidInput { skid: false, ..skidding_right() },
        ] {
            let mut s = Skidding::default();
            s.update(DT, input, &cfg);
            assert_eq!(s.state(), SkidState::None, "{input:?}");
        }
    }

    #[test]
    fn test_release_pays_tier_bonus() {
        let cfg = SkiddingConfig::default();
        let mut s = Skidding::default();
        assert!(run(&mut s, skidding_right(), 1.5, &cfg).is_empty());
        let bonus = s
            .update(DT, SkidInput { skid: false, ..skidding_right() }, &cfg)
            .unwrap();
        assert_eq!(bonus.tier, 1);
        assert_eq!(bonus.speed, cfg.bonus_speed[0]);
        assert_eq!(s.state(), SkidState::ShowGfxRight);

        run(&mut s, SkidInput { skid: false, ..skidding_right() }, 0.5, &cfg);
        assert_eq!(s.state(), SkidState::None);
    }

    #[test]
    fn test_short_skid_pays_nothing() {
        let cfg = SkiddingConfig::default();
        let mut s = Skidding::default();
        run(&mut s, skidding_right(), 0.5, &cfg);
        let bonus = s.update(DT, SkidInput { skid: false, ..skidding_right() }, &cfg);
        assert!(bonus.is_none());
        assert_eq!(s.state(), SkidState::ShowGfxRight);
    }

    #[test]
    fn test_long_skid_reaches_top_tier() {
        let cfg = SkiddingConfig::default();
        let mut s = Skidding::default();
        run(&mut s, skidding_right(), 3.5, &cfg);
        let bonus = s
            .update(DT, SkidInput { skid: false, ..skidding_right() }, &cfg)
            .unwrap();
        assert_eq!(bonus.tier, 2);
        assert_eq!(bonus.force, cfg.bonus_force[1]);
    }

    #[test]
    fn test_slowing_down_breaks_skid() {
        let cfg = SkiddingConfig::default();
        let mut s = Skidding::default();
        run(&mut s, skidding_right(), 1.5, &cfg);
        let slow = SkidInput { speed: 2.0, ..skidding_right() };
        assert!(s.update(DT, slow, &cfg).is_none());
        assert_eq!(s.state(), SkidState::Break);

        // Still holding the button: stays broken even when fast again.
        s.update(DT, skidding_right(), &cfg);
        assert_eq!(s.state(), SkidState::Break);
        s.update(DT, SkidInput { skid: false, ..skidding_right() }, &cfg);
        assert_eq!(s.state(), SkidState::None);
    }

    #[test]
    fn test_slowing_down_while_showing_gfx_breaks() {
        let cfg = SkiddingConfig::default();
        let mut s = Skidding::default();
        run(&mut s, skidding_right(), 1.5, &cfg);
        let released = SkidInput { skid: false, ..skidding_right() };
        s.update(DT, released, &cfg);
        assert_eq!(s.state(), SkidState::ShowGfxRight);

        s.update(DT, SkidInput { speed: 2.0, ..released }, &cfg);
        assert_eq!(s.state(), SkidState::Break);
        s.update(DT, released, &cfg);
        assert_eq!(s.state(), SkidState::None);
    }

    #[test]
    fn test_factor_and_rotation_bounds() {
        let cfg = SkiddingConfig::default();
        let mut s = Skidding::default();
        let mut inputs = vec![skidding_right(); 120];
        inputs.extend(vec![SkidInput { skid: false, ..skidding_right() }; 60]);
        inputs.extend(vec![SkidInput { steer: -1.0, ..skidding_right() }; 120]);
        for input in inputs {
            s.update(DT, input, &cfg);
            assert!((1.0..=cfg.skid_max).contains(&s.skid_factor()));
            assert!((-1.0..=1.0).contains(&s.visual_rotation()));
        }
        assert_eq!(s.skid_factor(), cfg.skid_max);
        assert_eq!(s.visual_rotation(), -1.0);
    }

    #[test]
    fn test_steering_remap_and_inverse() {
        let cfg = SkiddingConfig::default();
        let mut s = Skidding::default();
        s.update(DT, skidding_right(), &cfg);
        assert!((s.steering(-1.0, &cfg) - cfg.reduce_turn_min).abs() < 1e-6);
        assert!((s.steering(1.0, &cfg) - cfg.reduce_turn_max).abs() < 1e-6);
        for steer in [-1.0, -0.3, 0.0, 0.6, 1.0] {
            let real = s.steering(steer, &cfg);
            assert!((s.steering_when_skidding(real, &cfg) - steer).abs() < 1e-5);
        }

        let mut left = Skidding::default();
        left.update(DT, SkidInput { steer: -1.0, ..skidding_right() }, &cfg);
        assert!((left.steering(-1.0, &cfg) + cfg.reduce_turn_max).abs() < 1e-6);
        assert!((left.steering(1.0, &cfg) + cfg.reduce_turn_min).abs() < 1e-6);
        let real = left.steering(-0.4, &cfg);
        assert!((left.steering_when_skidding(real, &cfg) + 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_steering_passthrough_when_not_skidding() {
        let cfg = SkiddingConfig::default();
        let s = Skidding::default();
        assert_eq!(s.steering(0.42, &cfg), 0.42);
    }
}
