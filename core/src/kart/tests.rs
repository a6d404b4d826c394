use super::*;

use crate::config::GameplayConfig;

fn kart() -> Kart {
    Kart::new(KartId(0), "tux", Controller::Ai, BodyHandle(0), 225.0)
}

#[test]
fn test_anvil_adds_weight() {
    let config = GameplayConfig::default();
    let mut k = kart();
    assert_eq!(k.mass(&config), 225.0);
    k.set_attachment(AttachmentType::Anvil, 2.0, None);
    assert_eq!(k.mass(&config), 225.0 + config.attachment.anvil_weight);
    k.attachment.clear();
    assert_eq!(k.mass(&config), 225.0);
}

#[test]
fn test_parachute_records_speed_and_drag() {
    let config = GameplayConfig::default();
    let mut k = kart();
    k.speed = 20.0;
    k.set_attachment(AttachmentType::Parachute, 4.0, None);
    assert_eq!(k.drag_multiplier(&config), config.attachment.parachute_friction);
    // Slowing below the release threshold drops the parachute.
    let expired = k.attachment.update(0.01, 5.0, &config.attachment);
    assert_eq!(expired, Some(AttachmentType::Parachute));
    assert_eq!(k.drag_multiplier(&config), 1.0);
}

#[test]
fn test_shield_charges() {
    let mut k = kart();
    assert!(!k.consume_shield());
    k.shield = 2;
    assert!(k.consume_shield());
    assert!(k.is_shielded());
    assert!(k.consume_shield());
    assert!(!k.is_shielded());
}

#[test]
fn test_fire_is_edge_triggered() {
    let mut k = kart();
    let fire = KartControl {
        fire: true,
        ..KartControl::default()
    };
    k.apply_control(fire);
    assert!(k.fire_pressed());
    k.apply_control(fire);
    assert!(!k.fire_pressed());
    k.apply_control(KartControl::default());
    k.apply_control(fire);
    assert!(k.fire_pressed());
}

#[test]
fn test_shrunk_scale() {
    let mut k = kart();
    assert_eq!(k.visual_scale(), 1.0);
    k.set_attachment(AttachmentType::Shrunk, 1.0, None);
    assert!(k.visual_scale() < 1.0);
}

#[test]
fn test_reset_clears_race_state() {
    let mut k = kart();
    k.lap = 3;
    k.finished = true;
    k.herrings = 7;
    k.shield = 1;
    k.set_attachment(AttachmentType::Bomb, 10.0, None);
    k.powerup.set(PowerupType::Cake, 2, 5);
    k.reset(RaceMode::TimeTrial);
    assert_eq!(k.lap, 0);
    assert!(k.is_racing());
    assert_eq!(k.herrings, 0);
    assert_eq!(k.attachment.kind(), AttachmentType::None);
    assert_eq!(k.powerup.kind(), PowerupType::Zipper);
}

#[test]
fn test_timers_run_down() {
    let mut k = kart();
    k.invulnerable_time = 0.5;
    k.speed_modifiers.increase(SpeedSource::Zipper, 10.0, 100.0, 0.3);
    let config = GameplayConfig::default();
    assert_eq!(k.max_speed(&config), config.kart.max_speed + 10.0);
    k.update_timers(0.4);
    assert!(k.is_invulnerable());
    assert_eq!(k.max_speed(&config), config.kart.max_speed);
    k.update_timers(0.2);
    assert!(!k.is_invulnerable());
}

#[test]
fn test_applied_control_is_quantized() {
    let mut k = kart();
    let control = KartControl {
        steer: 0.123_456_7,
        accel: 0.333_333_3,
        ..KartControl::default()
    };
    k.apply_control(control);
    let replayed = control.pack().unpack();
    assert_eq!(k.control, replayed);
    k.apply_control(replayed);
    assert_eq!(k.control, replayed);
}
