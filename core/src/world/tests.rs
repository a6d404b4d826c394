use glam::Vec3;
use racekit_shared::{KartControl, KartId};

use super::*;
use crate::history::{HistoryPlayback, ReplayMode};
use crate::items::TrackItem;
use crate::test_utils::{DT, fast_start_config, run_ticks, run_to_go, test_world};

fn world(players: usize, ai: usize) -> World {
    test_world(fast_start_config(RaceMode::Normal), players, ai, 7)
}

/// Move kart `i` onto the centerline at `distance` and run one tick.
fn teleport(world: &mut World, i: usize, distance: f32) {
    let (position, yaw) = world.track().transform_at(distance, 0.0);
    let handle = world.karts()[i].body;
    if let Some(body) = world.physics_mut().body_mut(handle) {
        body.position = position;
        body.yaw = yaw;
        body.velocity = Vec3::ZERO;
    }
    world.update(DT);
}

/// Drive kart `i` once around to just past the line.
fn complete_lap(world: &mut World, i: usize) {
    let length = world.track().length();
    for fraction in [0.3, 0.6, 0.9] {
        teleport(world, i, length * fraction);
    }
    teleport(world, i, 1.0);
}

/// Put two karts on top of each other so the next step reports a contact.
fn overlap(world: &mut World, a: usize, b: usize) {
    let position = world.karts()[a].position + Vec3::new(0.5, 0.0, 0.0);
    let handle = world.karts()[b].body;
    if let Some(body) = world.physics_mut().body_mut(handle) {
        body.position = position;
    }
}

fn press_fire(world: &mut World, i: usize) {
    world.set_input(
        KartId(i as u8),
        KartControl {
            fire: true,
            ..KartControl::default()
        },
    );
}

#[test]
fn test_start_sequence_events() {
    let mut w = world(1, 1);
    run_to_go(&mut w);
    let phases: Vec<RacePhase> = w
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            WorldEvent::PhaseChanged(t) => Some(t.to),
            _ => None,
        })
        .collect();
    assert_eq!(phases, vec![RacePhase::Ready, RacePhase::Set, RacePhase::Go]);
    assert!(w.events().is_empty());
}

#[test]
fn test_karts_hold_still_before_go() {
    let mut w = world(1, 0);
    let start = w.karts()[0].position;
    w.set_input(
        KartId(0),
        KartControl {
            accel: 1.0,
            ..KartControl::default()
        },
    );
    w.update(DT);
    w.update(DT);
    assert_eq!(w.phase(), RacePhase::Ready);
    assert!((w.karts()[0].position - start).length() < 1e-4);

    run_to_go(&mut w);
    run_ticks(&mut w, 60);
    assert!(w.karts()[0].distance > start.z + 5.0);
    assert!(w.karts()[0].speed > 5.0);
}

#[test]
fn test_positions_follow_progress() {
    let mut w = world(3, 0);
    run_to_go(&mut w);
    // The front row shares a distance; the grid slot orders it.
    let positions: Vec<u32> = w.karts().iter().map(|k| k.race_position).collect();
    assert_eq!(positions, vec![1, 2, 3]);

    teleport(&mut w, 2, 40.0);
    let positions: Vec<u32> = w.karts().iter().map(|k| k.race_position).collect();
    assert_eq!(positions, vec![2, 3, 1]);
}

#[test]
fn test_bomb_passes_on_contact() {
    let mut w = world(3, 0);
    w.update(DT);
    w.karts[0].set_attachment(AttachmentType::Bomb, 20.0, None);
    overlap(&mut w, 0, 1);
    w.update(DT);

    assert!(w.karts[0].attachment.is(AttachmentType::None));
    let bomb = &w.karts[1].attachment;
    assert!(bomb.is(AttachmentType::Bomb));
    assert_eq!(bomb.previous_owner(), Some(KartId(0)));
    let expected = 20.0 + w.config.attachment.bomb_time_increase - DT;
    assert!((bomb.time_left() - expected).abs() < 1e-4);
}

#[test]
fn test_bomb_not_returned_to_previous_owner() {
    let mut w = world(3, 0);
    w.update(DT);
    w.karts[1].set_attachment(AttachmentType::Bomb, 20.0, Some(KartId(0)));
    overlap(&mut w, 0, 1);
    w.update(DT);
    assert!(w.karts[1].attachment.is(AttachmentType::Bomb));
    assert!(w.karts[0].attachment.is(AttachmentType::None));
}

#[test]
fn test_bomb_bounces_back_with_two_karts() {
    let mut w = world(2, 0);
    w.update(DT);
    w.karts[1].set_attachment(AttachmentType::Bomb, 20.0, Some(KartId(0)));
    overlap(&mut w, 0, 1);
    w.update(DT);
    assert!(w.karts[0].attachment.is(AttachmentType::Bomb));
}

#[test]
fn test_two_bombs_explode_together() {
    let mut w = world(2, 0);
    w.update(DT);
    w.karts[0].set_attachment(AttachmentType::Bomb, 20.0, None);
    w.karts[1].set_attachment(AttachmentType::Bomb, 20.0, None);
    overlap(&mut w, 0, 1);
    w.update(DT);
    for kart in &w.karts {
        assert!(kart.attachment.is(AttachmentType::None));
        assert_eq!(
            kart.animation.as_ref().map(KartAnimation::kind),
            Some(AnimationKind::Explosion)
        );
    }
    assert_eq!(w.items().explosion_count(), 2);
}

#[test]
fn test_shield_blocks_bomb() {
    let mut w = world(2, 0);
    w.update(DT);
    w.karts[0].set_attachment(AttachmentType::Bomb, 20.0, None);
    w.karts[1].shield = 1;
    overlap(&mut w, 0, 1);
    w.update(DT);
    assert!(w.karts[0].attachment.is(AttachmentType::Bomb));
    assert!(w.karts[1].attachment.is(AttachmentType::None));
    assert_eq!(w.karts[1].shield, 0);
}

#[test]
fn test_explosion_always_draws() {
    let mut w = world(2, 0);
    w.update(DT);
    let draws = RandomEvent::ExplosionTumble;

    w.explode_kart(0, true);
    assert!(w.karts[0].is_animating());
    assert_eq!(w.random.draw_count(draws), 1);
    assert!(!w.physics.body(w.karts[0].body).unwrap().attached);

    // Already animating: no effect, still one draw.
    w.explode_kart(0, false);
    assert_eq!(w.random.draw_count(draws), 2);

    // Shield absorbs and still draws.
    w.karts[1].shield = 1;
    w.explode_kart(1, false);
    assert!(!w.karts[1].is_animating());
    assert_eq!(w.karts[1].shield, 0);
    assert_eq!(w.random.draw_count(draws), 3);

    // Invulnerable: nothing happens.
    w.karts[1].invulnerable_time = 1.0;
    w.explode_kart(1, true);
    assert!(!w.karts[1].is_animating());
    assert_eq!(w.random.draw_count(draws), 4);
}

#[test]
fn test_explosion_lands_and_grants_invulnerability() {
    let mut w = world(1, 0);
    w.update(DT);
    let start = w.karts[0].position;
    w.explode_kart(0, true);

    let ticks = (w.config.explosion.explosion_time / DT).ceil() as usize;
    run_ticks(&mut w, ticks / 2);
    assert!(w.karts[0].position.y > start.y + 1.0);

    run_ticks(&mut w, ticks - ticks / 2 + 2);
    let kart = &w.karts[0];
    assert!(!kart.is_animating());
    assert!((kart.position.y - start.y).abs() < 1e-3);
    assert!(kart.is_invulnerable());
    assert!(w.physics.body(kart.body).unwrap().attached);
}

#[test]
fn test_anvil_hits_leader() {
    let mut w = world(3, 0);
    run_to_go(&mut w);
    assert_eq!(w.karts[0].race_position, 1);

    let max = w.config.powerup.max_powerups;
    w.karts[2].powerup.set(PowerupType::Anvil, 1, max);
    let leader_body = w.karts[0].body;
    w.physics_mut().body_mut(leader_body).unwrap().velocity = Vec3::new(0.0, 0.0, 10.0);
    press_fire(&mut w, 2);
    w.update(DT);

    let config = &w.config.attachment;
    let leader = &w.karts[0];
    assert!(leader.attachment.is(AttachmentType::Anvil));
    assert_eq!(leader.attachment.time_left(), config.anvil_time);
    let speed = w.physics.body(leader_body).unwrap().velocity.z;
    let scaled = 10.0 * config.anvil_speed_factor * 0.5;
    assert!(speed <= scaled && speed > scaled * 0.95, "speed {speed}");
    assert!(w.karts[1].attachment.is(AttachmentType::None));
    assert!(w.karts[2].powerup.is_empty());
}

#[test]
fn test_parachute_hits_karts_ahead_only() {
    let mut w = world(3, 0);
    run_to_go(&mut w);
    teleport(&mut w, 0, 40.0);
    assert_eq!(w.karts[1].race_position, 2);
    let max = w.config.powerup.max_powerups;
    w.karts[1].powerup.set(PowerupType::Parachute, 1, max);
    press_fire(&mut w, 1);
    w.update(DT);

    assert!(w.karts[0].attachment.is(AttachmentType::Parachute));
    assert_eq!(
        w.karts[0].attachment.time_left(),
        w.config.attachment.parachute_time_other
    );
    assert!(w.karts[1].attachment.is(AttachmentType::None));
    assert!(w.karts[2].attachment.is(AttachmentType::None));
}

#[test]
fn test_shield_blocks_parachute() {
    let mut w = world(2, 0);
    run_to_go(&mut w);
    teleport(&mut w, 0, 40.0);
    let max = w.config.powerup.max_powerups;
    w.karts[0].shield = 1;
    w.karts[1].powerup.set(PowerupType::Parachute, 1, max);
    press_fire(&mut w, 1);
    w.update(DT);
    assert!(w.karts[0].attachment.is(AttachmentType::None));
    assert_eq!(w.karts[0].shield, 0);
}

#[test]
fn test_zipper_boosts() {
    let mut w = world(1, 0);
    run_to_go(&mut w);
    let max = w.config.powerup.max_powerups;
    w.karts[0].powerup.set(PowerupType::Zipper, 1, max);
    press_fire(&mut w, 0);
    w.update(DT);
    assert!(w.karts[0].speed_modifiers.is_active(SpeedSource::Zipper));
    w.update(DT);
    assert!(w.karts[0].speed > 4.0);
}

#[test]
fn test_bowling_ball_is_fired() {
    let mut w = world(1, 1);
    run_to_go(&mut w);
    let max = w.config.powerup.max_powerups;
    w.karts[0].powerup.set(PowerupType::Bowling, 2, max);
    press_fire(&mut w, 0);
    w.update(DT);
    assert_eq!(w.items().projectile_count(), 1);
    assert_eq!(w.karts[0].powerup.count(), 1);
    assert!(w.events().contains(&WorldEvent::PowerupUsed {
        kart: KartId(0),
        kind: PowerupType::Bowling
    }));
}

#[test]
fn test_bonus_box_known_and_fresh_stay_aligned() {
    let mut server = world(2, 0);
    let mut client = world(2, 0);
    run_to_go(&mut server);
    run_to_go(&mut client);

    server.collect_bonus_box(1, 3);
    let event = server
        .drain_events()
        .into_iter()
        .find_map(|e| match e {
            WorldEvent::Item(item @ ItemEvent::BoxCollected { .. }) => Some(item),
            _ => None,
        })
        .unwrap();

    client.apply_item_events([event]);
    client.collect_bonus_box(1, 3);

    assert_eq!(client.karts[1].powerup, server.karts[1].powerup);
    assert!(!server.karts[1].powerup.is_empty());
    assert_eq!(
        client.random.draw_count(RandomEvent::BonusBox),
        server.random.draw_count(RandomEvent::BonusBox)
    );
    assert_eq!(
        client.random.clone().draw(RandomEvent::Banana),
        server.random.clone().draw(RandomEvent::Banana)
    );
}

#[test]
fn test_banana_with_known_outcome_overrides_roll() {
    let mut w = world(1, 0);
    run_to_go(&mut w);
    // Whatever the stream would roll, the server said anvil.
    w.apply_item_events([ItemEvent::BananaHit {
        tick: 0,
        kart: KartId(0),
        item: 0,
        attachment: attachment_index(AttachmentType::Anvil),
    }]);
    w.hit_banana(0, 0);
    assert!(w.karts[0].attachment.is(AttachmentType::Anvil));
    assert_eq!(w.random.draw_count(RandomEvent::Banana), 1);
}

#[test]
fn test_banana_on_bomb_explodes_and_disables_item() {
    let mut w = world(1, 0);
    run_to_go(&mut w);
    *w.pickups_mut() = PickupField::new(vec![TrackItem::new(PickupKind::Banana, Vec3::ZERO)]);
    w.karts[0].set_attachment(AttachmentType::Bomb, 20.0, None);
    w.hit_banana(0, 0);

    assert!(w.karts[0].is_animating());
    assert_eq!(w.items().explosion_count(), 1);
    let min_disable = w.config.explosion.explosion_time + 2.0;
    assert!(w.pickups().items()[0].disabled_for() >= min_disable);
}

#[test]
fn test_pickups_collected_while_driving() {
    let mut w = world(1, 0);
    run_to_go(&mut w);
    let position = w.karts[0].position;
    *w.pickups_mut() = PickupField::new(vec![
        TrackItem::new(PickupKind::BigHerring, position),
        TrackItem::new(PickupKind::BonusBox, position + Vec3::new(0.0, 0.0, 0.5)),
    ]);
    w.update(DT);
    assert_eq!(w.karts[0].herrings, 3);
    w.update(DT);
    assert!(!w.karts[0].powerup.is_empty());
    assert_eq!(w.random.draw_count(RandomEvent::BonusBox), 1);
}

#[test]
fn test_rescue_returns_to_centerline() {
    let mut w = world(1, 0);
    run_to_go(&mut w);
    run_ticks(&mut w, 5);
    let last_valid = w.karts[0].last_valid_distance;
    w.set_input(
        KartId(0),
        KartControl {
            rescue: true,
            ..KartControl::default()
        },
    );
    w.update(DT);
    w.set_input(KartId(0), KartControl::default());
    assert_eq!(
        w.karts[0].animation.as_ref().map(KartAnimation::kind),
        Some(AnimationKind::Rescue)
    );
    assert!(w.karts[0].attachment.is(AttachmentType::Shrunk));
    assert!(w.karts[0].visual_scale() < 1.0);

    let ticks = (w.config.explosion.rescue_time / DT).ceil() as usize + 1;
    run_ticks(&mut w, ticks);
    let kart = &w.karts[0];
    assert!(!kart.is_animating());
    let (target, _) = w.track().transform_at(last_valid, 0.0);
    assert!((kart.position - target).length() < 0.5);
}

#[test]
fn test_falling_kart_is_rescued() {
    let mut w = world(1, 0);
    run_to_go(&mut w);
    let handle = w.karts[0].body;
    let body = w.physics_mut().body_mut(handle).unwrap();
    // Off the side of the track, so there is no ground to land on.
    body.position = Vec3::new(200.0, -100.0, 0.0);
    body.on_ground = false;
    w.update(DT);
    assert!(w.events().contains(&WorldEvent::Rescued { kart: KartId(0) }));
}

#[test]
fn test_lap_and_finish_single_ai() {
    let mut config = fast_start_config(RaceMode::Normal);
    config.race.num_laps = 1;
    let mut w = test_world(config, 0, 1, 3);
    run_to_go(&mut w);
    complete_lap(&mut w, 0);

    let kart = &w.karts[0];
    assert_eq!(kart.lap, 1);
    assert!(kart.finished);
    assert_eq!(kart.race_position, 1);
    assert_eq!(w.phase(), RacePhase::Finish);
}

#[test]
fn test_backwards_crossing_loses_lap() {
    let mut w = world(1, 0);
    run_to_go(&mut w);
    let length = w.track().length();
    teleport(&mut w, 0, length - 2.0);
    assert_eq!(w.karts[0].lap, -1);
    teleport(&mut w, 0, 3.0);
    assert_eq!(w.karts[0].lap, 0);
}

#[test]
fn test_delay_finish_estimates_ai() {
    let mut config = fast_start_config(RaceMode::Normal);
    config.race.num_laps = 1;
    config.race.delay_finish_time = 0.1;
    let mut w = test_world(config, 1, 1, 3);
    run_to_go(&mut w);
    complete_lap(&mut w, 0);
    assert!(w.karts[0].finished);
    assert_eq!(w.phase(), RacePhase::DelayFinish);

    run_ticks(&mut w, 10);
    assert_eq!(w.phase(), RacePhase::Finish);
    let ai = &w.karts[1];
    assert!(ai.finished);
    assert_eq!(ai.race_position, 2);
    assert!(ai.finish_time > w.karts[0].finish_time);
}

#[test]
fn test_pause_freezes_world() {
    let mut w = world(1, 1);
    run_to_go(&mut w);
    let tick = w.tick();
    w.pause();
    run_ticks(&mut w, 10);
    assert_eq!(w.tick(), tick);
    assert_eq!(w.phase(), RacePhase::Limbo);
    w.unpause();
    assert!(w.phase().is_racing());
    w.update(DT);
    assert_eq!(w.tick(), tick + 1);
}

#[test]
fn test_history_positions_replay() {
    let mut original = world(0, 3);
    original.start_recording(0);
    run_ticks(&mut original, 240);
    let history = original.history().unwrap();
    assert_eq!(history.frames.len(), 240);

    let mut replay = world(0, 3);
    replay
        .start_playback(HistoryPlayback::new(history, ReplayMode::Positions))
        .unwrap();
    run_ticks(&mut replay, 240);
    for (a, b) in original.karts().iter().zip(replay.karts()) {
        assert_eq!(a.position, b.position);
    }
    assert!(replay.playback().unwrap().is_finished());
}

#[test]
fn test_history_controls_replay_is_exact() {
    let mut original = world(0, 2);
    original.start_recording(0);
    run_ticks(&mut original, 200);
    let text = original.history().unwrap().to_text();

    let history = crate::history::History::parse(&text).unwrap();
    let mut replay = world(0, 2);
    replay
        .start_playback(HistoryPlayback::new(history, ReplayMode::Controls))
        .unwrap();
    run_ticks(&mut replay, 200);
    for (a, b) in original.karts().iter().zip(replay.karts()) {
        assert_eq!(a.position, b.position);
        assert_eq!(a.controller.label(), "ai");
        assert_eq!(b.controller.label(), "ghost");
    }
}

#[test]
fn test_playback_rejects_wrong_kart_count() {
    let mut original = world(0, 2);
    original.start_recording(0);
    run_ticks(&mut original, 5);
    let history = original.history().unwrap();
    let mut other = world(0, 3);
    assert!(matches!(
        other.start_playback(HistoryPlayback::new(history, ReplayMode::Controls)),
        Err(SetupError::HistoryMismatch(_))
    ));
}
