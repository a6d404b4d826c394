//! Where a kart's per-tick control comes from.

use glam::Vec3;
use racekit_shared::{KartControl, PackedControl};

use crate::track::Track;

/// Distance ahead of the kart the AI aims for.
const AI_LOOKAHEAD: f32 = 8.0;
/// Steering per radian of heading error.
const AI_STEER_GAIN: f32 = 2.0;

/// What the AI may look at when choosing its control.
#[derive(Debug, Clone, Copy)]
pub struct DriverView<'a> {
    pub track: &'a Track,
    pub position: Vec3,
    pub yaw: f32,
    pub distance: f32,
    pub holding_powerup: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Controller {
    /// Input arrives through [`Controller::set_input`] from a local device.
    Local { pending: KartControl },
    /// Centerline follower.
    Ai,
    /// Remote player; input arrives from sync messages.
    Network { last: KartControl },
    /// Replays recorded controls, one per tick.
    Ghost {
        controls: Vec<PackedControl>,
        cursor: usize,
    },
}

impl Controller {
    pub fn local() -> Self {
        Controller::Local {
            pending: KartControl::default(),
        }
    }

    pub fn network() -> Self {
        Controller::Network {
            last: KartControl::default(),
        }
    }

    pub fn ghost(controls: Vec<PackedControl>) -> Self {
        Controller::Ghost { controls, cursor: 0 }
    }

    /// Human-driven karts count as players for the finish logic.
    pub fn is_player(&self) -> bool {
        matches!(self, Controller::Local { .. } | Controller::Network { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Controller::Local { .. } => "local",
            Controller::Ai => "ai",
            Controller::Network { .. } => "network",
            Controller::Ghost { .. } => "ghost",
        }
    }

    /// Feed input for the next tick. Ignored by AI and ghost controllers.
    pub fn set_input(&mut self, control: KartControl) {
        match self {
            Controller::Local { pending } => *pending = control.clamped(),
            Controller::Network { last } => *last = control.clamped(),
            Controller::Ai | Controller::Ghost { .. } => {}
        }
    }

    /// Control to apply this tick.
    pub fn sample(&mut self, view: &DriverView<'_>) -> KartControl {
        match self {
            Controller::Local { pending } => *pending,
            Controller::Network { last } => *last,
            Controller::Ai => drive_ai(view),
            Controller::Ghost { controls, cursor } => {
                let control = controls
                    .get(*cursor)
                    .map(PackedControl::unpack)
                    .unwrap_or_default();
                *cursor = (*cursor + 1).min(controls.len());
                control
            }
        }
    }
}

fn drive_ai(view: &DriverView<'_>) -> KartControl {
    let (target, _) = view.track.transform_at(view.distance + AI_LOOKAHEAD, 0.0);
    let to_target = target - view.position;
    let desired = to_target.x.atan2(to_target.z);
    let error = wrap_angle(desired - view.yaw);
    KartControl {
        // Positive steer lowers yaw.
        steer: (-error * AI_STEER_GAIN).clamp(-1.0, 1.0),
        accel: 1.0,
        fire: view.holding_powerup,
        ..KartControl::default()
    }
}

fn wrap_angle(angle: f32) -> f32 {
    let tau = std::f32::consts::TAU;
    (angle + std::f32::consts::PI).rem_euclid(tau) - std::f32::consts::PI
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> Track {
        Track::oval("oval", 100.0, 20.0, 6.0, 16).unwrap()
    }

    fn view(track: &Track, position: Vec3, yaw: f32) -> DriverView<'_> {
        DriverView {
            track,
            position,
            yaw,
            distance: track.distance_down_track(position),
            holding_powerup: false,
        }
    }

    #[test]
    fn test_ai_steers_back_to_centerline() {
        let track = track();
        let mut ai = Controller::Ai;
        // Left of the centerline (+X), heading +Z: must steer right.
        let control = ai.sample(&view(&track, Vec3::new(3.0, 0.0, 20.0), 0.0));
        assert!(control.steer > 0.0);
        assert_eq!(control.accel, 1.0);

        let control = ai.sample(&view(&track, Vec3::new(-3.0, 0.0, 20.0), 0.0));
        assert!(control.steer < 0.0);
    }

    #[test]
    fn test_ai_fires_when_holding() {
        let track = track();
        let mut ai = Controller::Ai;
        let mut v = view(&track, Vec3::new(0.0, 0.0, 20.0), 0.0);
        assert!(!ai.sample(&v).fire);
        v.holding_powerup = true;
        assert!(ai.sample(&v).fire);
    }

    #[test]
    fn test_local_input_is_clamped() {
        let track = track();
        let mut local = Controller::local();
        local.set_input(KartControl {
            steer: 4.0,
            accel: 2.0,
            ..KartControl::default()
        });
        let control = local.sample(&view(&track, Vec3::ZERO, 0.0));
        assert_eq!(control.steer, 1.0);
        assert_eq!(control.accel, 1.0);
        assert!(local.is_player());
        assert!(!Controller::Ai.is_player());
    }

    #[test]
    fn test_ghost_replays_then_idles() {
        let track = track();
        let recorded = KartControl {
            steer: -1.0,
            accel: 1.0,
            skid: true,
            ..KartControl::default()
        };
        let mut ghost = Controller::ghost(vec![recorded.pack(); 2]);
        let v = view(&track, Vec3::ZERO, 0.0);
        assert_eq!(ghost.sample(&v), recorded.pack().unpack());
        assert_eq!(ghost.sample(&v), recorded.pack().unpack());
        assert_eq!(ghost.sample(&v), KartControl::default());
        assert!(!ghost.is_player());
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * std::f32::consts::PI) - std::f32::consts::PI).abs() < 1e-5
            || (wrap_angle(3.0 * std::f32::consts::PI) + std::f32::consts::PI).abs() < 1e-5);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
        assert!((wrap_angle(-0.5) + 0.5).abs() < 1e-6);
    }
}
