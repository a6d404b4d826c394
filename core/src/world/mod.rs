//! The race world: one simulation context updated once per tick.
//!
//! [`World::update`] runs the tick in a fixed order:
//!
//! 1. Replace `dt` with the recorded delta when replaying a history.
//! 2. Advance the phase clock; the `SETUP` tick runs with `dt = 0`.
//! 3. Sample controllers and hand drive requests to physics.
//! 4. Step physics once, then resolve kart-kart contacts (bomb passing).
//! 5. Update every non-eliminated kart: animation or read-back, attachment,
//!    skidding, track progress, rescue, powerup use.
//! 6. Update projectiles, explosions and track pickups.
//! 7. Recompute race positions.
//! 8. Detect finished karts and move to `DELAY_FINISH` / `FINISH`.
//! 9. Record the tick into the history ring buffer, if recording.

mod finish;
mod leader;
mod ranking;

#[cfg(test)]
mod tests;

pub use finish::estimate_finish_time;
pub use leader::{LEADER_FINAL_KARTS, LeaderCountdown, LeaderEntry, pick_victim};
pub use ranking::{RankEntry, compute_positions};

use glam::Vec3;
use racekit_shared::{KartControl, KartId};
use smallvec::SmallVec;

use crate::clock::{PhaseTimings, PhaseTransition, RaceClock, RacePhase};
use crate::config::{GameplayConfig, RaceMode};
use crate::error::SetupError;
use crate::history::{
    History, HistoryFrame, HistoryHeader, HistoryPlayback, HistoryRecorder, KartFrame, ReplayMode,
};
use crate::items::{Impact, ItemManager, KartTarget, PickupField, PickupKind, ProjectileKind};
use crate::kart::{
    AnimationKind, AttachmentType, BananaOutcome, Controller, DriverView, ExplosionAnimation,
    Kart, KartAnimation, PowerupType, RescueAnimation, SkidInput, SpeedSource, encode_add_info,
    pickup_count, roll_powerup,
};
use crate::physics::{BodyHandle, DriveInput, KartContact, PhysicsBackend};
use crate::random::{GameRandom, RandomEvent};
use crate::sync::{ItemEvent, KnownOutcomes, attachment_index};
use crate::track::{GroundQuery, Track};

/// Something that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldEvent {
    PhaseChanged(PhaseTransition),
    LapCompleted { kart: KartId, lap: i32 },
    KartFinished { kart: KartId, position: u32, time: f32 },
    KartEliminated { kart: KartId, position: u32 },
    PowerupUsed { kart: KartId, kind: PowerupType },
    HerringsCollected { kart: KartId, count: u32 },
    /// `from` is set when a kart passed its bomb on.
    AttachmentGiven {
        from: Option<KartId>,
        to: KartId,
        kind: AttachmentType,
    },
    ShieldAbsorbed { kart: KartId },
    SkidBonus { kart: KartId, tier: usize },
    Rescued { kart: KartId },
    /// Resolved random outcome; the server forwards these to clients.
    Item(ItemEvent),
}

pub struct World {
    config: GameplayConfig,
    clock: RaceClock,
    track: Track,
    physics: Box<dyn PhysicsBackend>,
    karts: Vec<Kart>,
    items: ItemManager,
    pickups: PickupField,
    random: GameRandom,
    known: KnownOutcomes,
    leader: Option<LeaderCountdown>,
    delay_finish_left: f32,
    /// Seconds since GO, independent of the countdown clock.
    elapsed: f32,
    tick: u32,
    recorder: Option<HistoryRecorder>,
    playback: Option<HistoryPlayback>,
    events: Vec<WorldEvent>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("track", &self.track.name())
            .field("phase", &self.clock.phase())
            .field("tick", &self.tick)
            .field("karts", &self.karts.len())
            .finish_non_exhaustive()
    }
}

impl World {
    /// Assemble a world from parts built in setup order. Karts must already
    /// own a body in `physics` and stand on their start positions.
    pub fn new(
        config: GameplayConfig,
        track: Track,
        physics: Box<dyn PhysicsBackend>,
        karts: Vec<Kart>,
        pickups: PickupField,
        seed: u64,
    ) -> Self {
        let clock = RaceClock::new(PhaseTimings {
            ready: config.race.ready_time,
            set: config.race.set_time,
            go: config.race.go_time,
        });
        let leader = (config.race.mode == RaceMode::FollowTheLeader)
            .then(|| LeaderCountdown::new(&config.race));
        Self {
            config,
            clock,
            track,
            physics,
            karts,
            items: ItemManager::new(),
            pickups,
            random: GameRandom::new(seed),
            known: KnownOutcomes::default(),
            leader,
            delay_finish_left: 0.0,
            elapsed: 0.0,
            tick: 0,
            recorder: None,
            playback: None,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &GameplayConfig {
        &self.config
    }

    pub fn clock(&self) -> &RaceClock {
        &self.clock
    }

    pub fn phase(&self) -> RacePhase {
        self.clock.phase()
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn karts(&self) -> &[Kart] {
        &self.karts
    }

    pub fn kart(&self, id: KartId) -> Option<&Kart> {
        self.karts.get(id.index())
    }

    pub fn kart_mut(&mut self, id: KartId) -> Option<&mut Kart> {
        self.karts.get_mut(id.index())
    }

    pub fn items(&self) -> &ItemManager {
        &self.items
    }

    pub fn pickups(&self) -> &PickupField {
        &self.pickups
    }

    pub fn pickups_mut(&mut self) -> &mut PickupField {
        &mut self.pickups
    }

    pub fn random(&self) -> &GameRandom {
        &self.random
    }

    pub fn physics(&self) -> &dyn PhysicsBackend {
        self.physics.as_ref()
    }

    pub fn physics_mut(&mut self) -> &mut dyn PhysicsBackend {
        self.physics.as_mut()
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn leader_countdown(&self) -> Option<&LeaderCountdown> {
        self.leader.as_ref()
    }

    /// Karts neither eliminated nor finished.
    pub fn racing_karts(&self) -> usize {
        self.karts.iter().filter(|k| k.is_racing()).count()
    }

    /// Karts not eliminated.
    pub fn live_karts(&self) -> usize {
        self.karts.iter().filter(|k| !k.eliminated).count()
    }

    /// Seconds since GO. Counts up even when the clock counts down.
    pub fn race_time(&self) -> f32 {
        if self.clock.is_countdown() {
            self.elapsed
        } else {
            self.clock.time()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.clock.phase() == RacePhase::Finish
    }

    /// Feed local or network input for `kart`'s next tick.
    pub fn set_input(&mut self, kart: KartId, control: KartControl) {
        if let Some(kart) = self.karts.get_mut(kart.index()) {
            kart.controller.set_input(control);
        }
    }

    /// Queue outcomes resolved by the server.
    pub fn apply_item_events(&mut self, events: impl IntoIterator<Item = ItemEvent>) {
        for event in events {
            self.known.push(event);
        }
    }

    /// Take the events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn unpause(&mut self) {
        self.clock.unpause();
    }

    /// Start recording every tick into a ring buffer of
    /// `race.max_history` frames.
    pub fn start_recording(&mut self, num_players: usize) {
        let header = HistoryHeader {
            num_players,
            seed: self.random.seed(),
            track: self.track.name().to_string(),
            karts: self.karts.iter().map(|k| k.name.clone()).collect(),
        };
        self.recorder = Some(HistoryRecorder::new(header, self.config.race.max_history));
    }

    pub fn history(&self) -> Option<History> {
        self.recorder.as_ref().map(HistoryRecorder::to_history)
    }

    /// Drive the world from a recorded history. Every kart becomes a ghost
    /// replaying its recorded controls.
    pub fn start_playback(&mut self, playback: HistoryPlayback) -> Result<(), SetupError> {
        let history = playback.history();
        if history.num_karts() != self.karts.len() {
            return Err(SetupError::HistoryMismatch(format!(
                "history has {} karts, race has {}",
                history.num_karts(),
                self.karts.len()
            )));
        }
        if history.header.seed != self.random.seed() {
            return Err(SetupError::HistoryMismatch(format!(
                "history seed {} differs from race seed {}",
                history.header.seed,
                self.random.seed()
            )));
        }
        for (k, kart) in self.karts.iter_mut().enumerate() {
            kart.controller = Controller::ghost(history.controls_for(k));
        }
        tracing::info!(
            ticks = history.frames.len(),
            mode = ?playback.mode(),
            "history playback started"
        );
        self.playback = Some(playback);
        Ok(())
    }

    pub fn playback(&self) -> Option<&HistoryPlayback> {
        self.playback.as_ref()
    }

    /// Advance the world by one tick.
    pub fn update(&mut self, dt: f32) {
        if self.clock.is_paused() {
            return;
        }

        let replay_frame = self
            .playback
            .as_mut()
            .and_then(|playback| playback.advance().cloned());
        let raw_dt = replay_frame.as_ref().map_or(dt, |frame| frame.dt);

        let clock_tick = self.clock.update(raw_dt);
        if let Some(transition) = clock_tick.transition {
            self.on_transition(transition);
        }
        let dt = clock_tick.dt;
        self.tick = self.tick.wrapping_add(1);
        if self.clock.phase().is_racing() {
            self.elapsed += dt;
        }
        if clock_tick.countdown_expired {
            self.eliminate_by_countdown();
        }

        self.drive_karts();
        self.physics.step(dt, &self.track);
        if let Some(frame) = &replay_frame
            && self.playback.as_ref().map(HistoryPlayback::mode) == Some(ReplayMode::Positions)
        {
            self.apply_replay_frame(frame);
        }
        self.handle_contacts();

        for i in 0..self.karts.len() {
            if !self.karts[i].eliminated {
                self.update_kart(i, dt);
            }
        }

        self.update_items(dt);
        self.update_positions();
        self.update_race_status(dt);
        self.record_history(raw_dt);
    }

    fn on_transition(&mut self, transition: PhaseTransition) {
        tracing::info!(from = ?transition.from, to = ?transition.to, "race phase changed");
        self.events.push(WorldEvent::PhaseChanged(transition));
        if transition.to == RacePhase::Go
            && let Some(leader) = &self.leader
        {
            let countdown = leader.current(self.live_karts());
            self.clock.set_countdown(countdown);
        }
    }

    fn enter_phase(&mut self, phase: RacePhase) {
        if let Some(transition) = self.clock.set_phase(phase) {
            self.on_transition(transition);
        }
    }

    fn drive_karts(&mut self) {
        let racing = self.clock.phase().is_racing();
        for kart in &mut self.karts {
            if kart.eliminated {
                continue;
            }
            let view = DriverView {
                track: &self.track,
                position: kart.position,
                yaw: kart.yaw(),
                distance: kart.distance,
                holding_powerup: !kart.powerup.is_empty(),
            };
            // Always sample so ghost cursors advance once per tick.
            let sampled = kart.controller.sample(&view);
            let control = if !racing || kart.is_animating() {
                KartControl::default()
            } else if kart.finished {
                KartControl {
                    fire: false,
                    ..Controller::Ai.sample(&view)
                }
            } else {
                sampled
            };
            kart.apply_control(control);

            let steer = kart.skidding.steering(control.steer, &self.config.skidding);
            let drive = DriveInput {
                throttle: control.accel,
                brake: control.brake,
                steer_angle: steer * self.config.kart.max_steer_angle,
                max_speed: kart.max_speed(&self.config),
                extra_force: kart.speed_modifiers.extra_force(),
                drag_multiplier: kart.drag_multiplier(&self.config),
                skid_factor: kart.skidding.skid_factor(),
            };
            if let Some(body) = self.physics.body_mut(kart.body) {
                body.mass = kart.mass(&self.config);
            }
            self.physics.set_drive(kart.body, drive);
        }
    }

    fn apply_replay_frame(&mut self, frame: &HistoryFrame) {
        for (kart, recorded) in self.karts.iter().zip(&frame.karts) {
            if let Some(body) = self.physics.body_mut(kart.body)
                && body.attached
            {
                body.position = recorded.position;
                body.yaw = recorded.rotation.y;
                body.velocity = recorded.velocity;
                body.angular_velocity = recorded.angular_velocity;
            }
        }
    }

    fn kart_for_body(&self, body: BodyHandle) -> Option<usize> {
        self.karts.iter().position(|k| k.body == body)
    }

    fn handle_contacts(&mut self) {
        let contacts: SmallVec<[KartContact; 8]> =
            self.physics.contacts().iter().copied().collect();
        for contact in contacts {
            if let (Some(a), Some(b)) = (self.kart_for_body(contact.a), self.kart_for_body(contact.b))
            {
                self.pass_bomb(a, b);
            }
        }
    }

    /// Bomb passing between two touching karts.
    fn pass_bomb(&mut self, a: usize, b: usize) {
        let (holder, other) = if self.karts[a].attachment.is(AttachmentType::Bomb) {
            (a, b)
        } else if self.karts[b].attachment.is(AttachmentType::Bomb) {
            (b, a)
        } else {
            return;
        };

        if self.karts[other].consume_shield() {
            self.events.push(WorldEvent::ShieldAbsorbed {
                kart: self.karts[other].id,
            });
            return;
        }
        if self.karts[other].attachment.is(AttachmentType::Bomb) {
            self.karts[holder].attachment.expire_now();
            self.karts[other].attachment.expire_now();
            return;
        }

        let holder_id = self.karts[holder].id;
        let other_id = self.karts[other].id;
        // The bomb does not go straight back to the kart that passed it,
        // unless there is nobody else to pass it to.
        if self.karts[holder].attachment.previous_owner() == Some(other_id) && self.karts.len() > 2 {
            return;
        }
        let time_left =
            self.karts[holder].attachment.time_left() + self.config.attachment.bomb_time_increase;
        self.karts[other].set_attachment(AttachmentType::Bomb, time_left, Some(holder_id));
        self.karts[holder].attachment.clear();
        tracing::debug!(from = %holder_id, to = %other_id, time_left, "bomb passed");
        self.events.push(WorldEvent::AttachmentGiven {
            from: Some(holder_id),
            to: other_id,
            kind: AttachmentType::Bomb,
        });
    }

    fn update_kart(&mut self, i: usize, dt: f32) {
        self.karts[i].update_timers(dt);

        let animation_done = {
            let kart = &mut self.karts[i];
            match kart.animation.as_mut() {
                Some(animation) => {
                    let done = animation.update(dt);
                    let (position, rotation) = animation.transform();
                    kart.position = position;
                    kart.rotation = rotation;
                    kart.speed = 0.0;
                    done
                }
                None => {
                    if let Some(body) = self.physics.body(kart.body) {
                        kart.position = body.position;
                        kart.rotation = Vec3::new(0.0, body.yaw, 0.0);
                        kart.speed = body.speed();
                        kart.on_ground = body.on_ground;
                    }
                    false
                }
            }
        };
        if animation_done {
            self.end_animation(i);
        }

        let expired = {
            let kart = &mut self.karts[i];
            kart.attachment
                .update(dt, kart.speed, &self.config.attachment)
        };
        if expired == Some(AttachmentType::Bomb) {
            self.explode_bomb(i);
        }

        if self.karts[i].is_animating() {
            return;
        }

        let bonus = {
            let kart = &mut self.karts[i];
            let input = SkidInput {
                skid: kart.control.skid,
                steer: kart.control.steer,
                speed: kart.speed,
                on_ground: kart.on_ground,
            };
            kart.skidding.update(dt, input, &self.config.skidding)
        };
        if let Some(bonus) = bonus {
            let kart = &mut self.karts[i];
            kart.speed_modifiers
                .increase(SpeedSource::Skidding, bonus.speed, bonus.force, bonus.time);
            if let Some(body) = self.physics.body_mut(kart.body) {
                body.velocity += body.forward() * bonus.speed;
            }
            self.events.push(WorldEvent::SkidBonus {
                kart: kart.id,
                tier: bonus.tier,
            });
        }

        self.update_progress(i);

        let kart = &self.karts[i];
        let fell = kart.position.y < self.track.lowest_point() - self.config.explosion.fall_rescue_depth;
        if kart.rescue_pressed() || fell {
            self.start_rescue(i);
            return;
        }

        if self.clock.phase().is_racing()
            && !kart.finished
            && kart.fire_pressed()
            && !kart.powerup.is_empty()
        {
            self.use_powerup(i);
        }
    }

    /// Distance down the track and lap counting.
    fn update_progress(&mut self, i: usize) {
        let racing = self.clock.phase().is_racing();
        let race_time = self.race_time();
        let num_laps = self.config.race.num_laps as i32;
        let counts_laps = self.config.race.mode != RaceMode::FollowTheLeader;

        let kart = &mut self.karts[i];
        let projection = self.track.project(kart.position);
        if kart.on_ground && projection.lateral.abs() <= self.track.half_width() {
            kart.last_valid_distance = projection.distance;
        }
        let delta = self.track.lap_delta(kart.distance, projection.distance);
        kart.distance = projection.distance;
        if !racing || delta == 0 {
            return;
        }
        kart.lap += delta;
        if delta < 0 || kart.finished {
            return;
        }
        let (id, lap) = (kart.id, kart.lap);
        self.events.push(WorldEvent::LapCompleted { kart: id, lap });
        if counts_laps && lap >= num_laps {
            self.finish_kart(i, race_time);
        }
    }

    fn finish_kart(&mut self, i: usize, time: f32) {
        let position = 1 + self
            .karts
            .iter()
            .filter(|k| k.finished && !k.eliminated)
            .count() as u32;
        let kart = &mut self.karts[i];
        kart.finished = true;
        kart.finish_time = time;
        kart.race_position = position;
        tracing::info!(kart = %kart.id, name = %kart.name, position, time, "kart finished");
        self.events.push(WorldEvent::KartFinished {
            kart: kart.id,
            position,
            time,
        });
    }

    fn end_animation(&mut self, i: usize) {
        let kart = &mut self.karts[i];
        let Some(animation) = kart.animation.take() else {
            return;
        };
        let (position, yaw) = animation.end_transform();
        if let Some(body) = self.physics.body_mut(kart.body) {
            body.position = position;
            body.yaw = yaw;
        }
        self.physics.attach(kart.body);
        kart.position = position;
        kart.rotation = Vec3::new(0.0, yaw, 0.0);
        kart.speed = 0.0;
        if animation.kind() == AnimationKind::Explosion {
            kart.invulnerable_time = self.config.explosion.invulnerability_time;
        }
    }

    /// Explosion hit on kart `i`.
    ///
    /// The tumble draw is consumed on every path, including the ones where
    /// nothing happens, so every peer's random stream advances alike.
    fn explode_kart(&mut self, i: usize, direct: bool) {
        let kart = &self.karts[i];
        let immune = kart.eliminated || kart.is_invulnerable() || kart.is_animating();
        let shielded = !immune && kart.is_shielded();
        let hit = !immune && !shielded;
        let (id, handle) = (kart.id, kart.body);

        let known = if hit { self.known.take_tumble(id) } else { None };
        let tumble = self
            .random
            .resolve(RandomEvent::ExplosionTumble, known, |draw| draw);

        if shielded {
            self.karts[i].consume_shield();
            self.events.push(WorldEvent::ShieldAbsorbed { kart: id });
            return;
        }
        if !hit {
            return;
        }
        let Some(body) = self.physics.body(handle).copied() else {
            return;
        };
        self.physics.detach(handle);

        let kart = &mut self.karts[i];
        kart.animation = Some(KartAnimation::Explosion(ExplosionAnimation::new(
            body.position,
            body.yaw,
            direct,
            tumble,
            &self.config.explosion,
            self.config.physics.gravity,
        )));
        kart.skidding.reset();
        kart.speed_modifiers.clear();
        kart.speed = 0.0;
        tracing::debug!(kart = %id, direct, "kart exploded");
        self.events.push(WorldEvent::Item(ItemEvent::Explosion {
            tick: self.tick,
            kart: id,
            direct,
            tumble,
        }));
    }

    fn explode_bomb(&mut self, i: usize) {
        let position = self.karts[i].position;
        self.items.add_explosion(position, &self.config.projectile);
        self.explode_kart(i, true);
    }

    fn start_rescue(&mut self, i: usize) {
        let kart = &self.karts[i];
        if kart.is_animating() {
            return;
        }
        let (target, target_yaw) = self.track.transform_at(kart.last_valid_distance, 0.0);
        let target = Vec3::new(
            target.x,
            self.track.ground_height(target).unwrap_or(target.y),
            target.z,
        );
        self.physics.detach(kart.body);

        let rescue_time = self.config.explosion.rescue_time;
        let kart = &mut self.karts[i];
        kart.animation = Some(KartAnimation::Rescue(RescueAnimation::new(
            kart.position,
            kart.yaw(),
            target,
            target_yaw,
            &self.config.explosion,
        )));
        // A held attachment wins over the shrink.
        if kart.attachment.is(AttachmentType::None) {
            kart.set_attachment(AttachmentType::Shrunk, rescue_time, None);
        }
        kart.skidding.reset();
        kart.speed = 0.0;
        tracing::debug!(kart = %kart.id, "kart rescued");
        self.events.push(WorldEvent::Rescued { kart: kart.id });
    }

    fn kart_targets(&self) -> Vec<KartTarget> {
        self.karts
            .iter()
            .map(|k| KartTarget {
                id: k.id,
                position: k.position,
                eliminated: k.eliminated,
                on_ground: k.on_ground,
                animating: k.is_animating(),
            })
            .collect()
    }

    fn use_powerup(&mut self, i: usize) {
        let Some(kind) = self.karts[i].powerup.use_one() else {
            return;
        };
        let id = self.karts[i].id;
        tracing::debug!(kart = %id, ?kind, "powerup used");
        self.events.push(WorldEvent::PowerupUsed { kart: id, kind });

        match kind {
            PowerupType::Bowling | PowerupType::Cake => {
                let projectile = if kind == PowerupType::Bowling {
                    ProjectileKind::Bowling
                } else {
                    ProjectileKind::Cake
                };
                let targets = self.kart_targets();
                let kart = &self.karts[i];
                self.items.fire(
                    projectile,
                    id,
                    kart.position,
                    kart.yaw(),
                    kart.speed,
                    &targets,
                    &self.config.projectile,
                );
            }
            PowerupType::Zipper => {
                let config = &self.config.powerup;
                let kart = &mut self.karts[i];
                kart.speed_modifiers.increase(
                    SpeedSource::Zipper,
                    config.zipper_max_speed_increase,
                    config.zipper_force,
                    config.zipper_time,
                );
                if let Some(body) = self.physics.body_mut(kart.body) {
                    body.velocity += body.forward() * config.zipper_speed_gain;
                }
            }
            PowerupType::Anvil => self.drop_anvil_on_leader(i),
            PowerupType::Parachute => self.parachute_karts_ahead(i),
            PowerupType::Shield => {
                let kart = &mut self.karts[i];
                kart.shield = kart.shield.saturating_add(self.config.powerup.shield_charges);
            }
            PowerupType::None => {}
        }
    }

    /// Anvil on the best placed other kart still racing.
    fn drop_anvil_on_leader(&mut self, owner: usize) {
        let Some(target) = self
            .karts
            .iter()
            .enumerate()
            .filter(|&(j, k)| j != owner && k.is_racing())
            .min_by_key(|&(j, k)| (k.race_position, j))
            .map(|(j, _)| j)
        else {
            return;
        };
        let config = &self.config.attachment;
        let kart = &mut self.karts[target];
        kart.set_attachment(AttachmentType::Anvil, config.anvil_time, None);
        if let Some(body) = self.physics.body_mut(kart.body) {
            body.velocity *= config.anvil_speed_factor * 0.5;
        }
        self.events.push(WorldEvent::AttachmentGiven {
            from: None,
            to: kart.id,
            kind: AttachmentType::Anvil,
        });
    }

    /// Parachute on every other kart ahead of the owner.
    fn parachute_karts_ahead(&mut self, owner: usize) {
        let owner_position = self.karts[owner].race_position;
        let duration = self.config.attachment.parachute_time_other;
        for j in 0..self.karts.len() {
            let kart = &mut self.karts[j];
            if j == owner || !kart.is_racing() || kart.race_position >= owner_position {
                continue;
            }
            if kart.consume_shield() {
                self.events.push(WorldEvent::ShieldAbsorbed { kart: kart.id });
                continue;
            }
            kart.set_attachment(AttachmentType::Parachute, duration, None);
            self.events.push(WorldEvent::AttachmentGiven {
                from: None,
                to: kart.id,
                kind: AttachmentType::Parachute,
            });
        }
    }

    fn update_items(&mut self, dt: f32) {
        let targets = self.kart_targets();
        let impacts = self
            .items
            .update(dt, &targets, &self.config.projectile, &self.track);
        for impact in impacts {
            self.handle_impact(impact);
        }

        self.pickups.update(dt);
        if self.clock.phase().is_racing() {
            self.collect_pickups();
        }
    }

    /// Direct hit plus splash within the explosion radius. The owner is only
    /// affected by a direct hit.
    fn handle_impact(&mut self, impact: Impact) {
        let direct = impact
            .direct
            .map(KartId::index)
            .filter(|&d| d < self.karts.len());
        if let Some(d) = direct {
            self.explode_kart(d, true);
        }
        let radius = self.config.projectile.explosion_radius;
        let splash: SmallVec<[usize; 8]> = self
            .karts
            .iter()
            .enumerate()
            .filter(|&(j, k)| {
                Some(j) != direct
                    && k.id != impact.owner
                    && !k.eliminated
                    && (k.position - impact.position).length() <= radius
            })
            .map(|(j, _)| j)
            .collect();
        for j in splash {
            self.explode_kart(j, false);
        }
    }

    fn collect_pickups(&mut self) {
        let respawn = self.config.race.item_respawn_time;
        for i in 0..self.karts.len() {
            let kart = &self.karts[i];
            if !kart.is_racing() || kart.is_animating() {
                continue;
            }
            let Some((item, kind)) = self.pickups.collect(kart.position, respawn) else {
                continue;
            };
            match kind {
                PickupKind::BonusBox => self.collect_bonus_box(i, item),
                PickupKind::Banana => self.hit_banana(i, item),
                PickupKind::SmallHerring | PickupKind::BigHerring => {
                    let kart = &mut self.karts[i];
                    kart.herrings += kind.herrings();
                    self.events.push(WorldEvent::HerringsCollected {
                        kart: kart.id,
                        count: kind.herrings(),
                    });
                }
            }
        }
    }

    fn collect_bonus_box(&mut self, i: usize, item: usize) {
        let kart = &self.karts[i];
        let id = kart.id;
        let position = kart.race_position;
        let count = pickup_count(kart.herrings, self.config.kart.max_herrings);
        let active = self.live_karts() as u32;
        let special = self.config.powerup.special_probability;

        let known = self.known.take_box(id);
        let (kind, count) = self.random.resolve(RandomEvent::BonusBox, known, |draw| {
            (roll_powerup(draw, position, active, special), count)
        });

        let config = &self.config.powerup;
        self.karts[i]
            .powerup
            .pickup(kind, count, config.same_powerup_mode, config.max_powerups);
        self.events.push(WorldEvent::Item(ItemEvent::BoxCollected {
            tick: self.tick,
            kart: id,
            item: item as u16,
            add_info: encode_add_info(kind, count),
        }));
    }

    fn hit_banana(&mut self, i: usize, item: usize) {
        let id = self.karts[i].id;
        let known = self.known.take_banana(id);
        let rolled = self
            .random
            .resolve(RandomEvent::Banana, known, AttachmentType::from_draw);

        let outcome = {
            let kart = &mut self.karts[i];
            kart.attachment.hit_banana(rolled, &self.config.attachment)
        };
        self.events.push(WorldEvent::Item(ItemEvent::BananaHit {
            tick: self.tick,
            kart: id,
            item: item as u16,
            attachment: attachment_index(rolled),
        }));

        let attached = match outcome {
            BananaOutcome::BombExploded { next } => {
                self.explode_bomb(i);
                let disable = self
                    .config
                    .race
                    .item_respawn_time
                    .max(self.config.explosion.explosion_time + 2.0);
                if let Some(banana) = self.pickups.get_mut(item) {
                    banana.disable(disable);
                }
                next
            }
            BananaOutcome::Attached(kind) => kind,
        };

        let kart = &mut self.karts[i];
        match attached {
            AttachmentType::Parachute => kart.attachment.set_initial_speed(kart.speed),
            AttachmentType::Anvil => {
                if let Some(body) = self.physics.body_mut(kart.body) {
                    body.velocity *= self.config.attachment.anvil_speed_factor;
                }
            }
            _ => {}
        }
        self.events.push(WorldEvent::AttachmentGiven {
            from: None,
            to: id,
            kind: attached,
        });
    }

    fn update_positions(&mut self) {
        let entries: SmallVec<[RankEntry; 20]> = self
            .karts
            .iter()
            .map(|k| RankEntry {
                eliminated: k.eliminated,
                finished: k.finished,
                lap: k.lap,
                distance: k.distance,
                grid: k.id.0 as u32,
            })
            .collect();
        for (kart, position) in self.karts.iter_mut().zip(compute_positions(&entries)) {
            if let Some(position) = position {
                kart.race_position = position;
            }
        }
    }

    fn eliminate_by_countdown(&mut self) {
        let live: SmallVec<[LeaderEntry; 20]> = self
            .karts
            .iter()
            .enumerate()
            .filter(|(_, k)| !k.eliminated)
            .map(|(index, k)| LeaderEntry {
                index,
                position: k.race_position,
            })
            .collect();
        let Some(victim) = pick_victim(&live) else {
            return;
        };
        self.eliminate_kart(victim, live.len() as u32);

        let remaining = live.len() - 1;
        if remaining <= LEADER_FINAL_KARTS {
            self.finish_leader_race();
        } else if let Some(leader) = self.leader.as_mut() {
            let countdown = leader.advance(remaining);
            self.clock.set_countdown(countdown);
        }
    }

    fn eliminate_kart(&mut self, i: usize, position: u32) {
        let kart = &mut self.karts[i];
        kart.eliminated = true;
        kart.race_position = position;
        kart.animation = None;
        kart.attachment.clear();
        self.physics.detach(kart.body);
        tracing::info!(kart = %kart.id, name = %kart.name, position, "kart eliminated");
        self.events.push(WorldEvent::KartEliminated {
            kart: kart.id,
            position,
        });
    }

    /// The leader takes first place, the survivors follow in race order.
    fn finish_leader_race(&mut self) {
        let mut order: SmallVec<[usize; 20]> = (0..self.karts.len())
            .filter(|&i| self.karts[i].is_racing())
            .collect();
        order.sort_by_key(|&i| (i != 0, self.karts[i].race_position, i));
        let time = self.race_time();
        for i in order {
            self.finish_kart(i, time);
        }
        self.enter_phase(RacePhase::Finish);
    }

    fn update_race_status(&mut self, dt: f32) {
        let phase = self.clock.phase();
        if self.config.race.mode == RaceMode::FollowTheLeader || !phase.is_racing() {
            return;
        }
        if self.karts.iter().all(|k| !k.is_racing()) {
            self.enter_phase(RacePhase::Finish);
            return;
        }
        match phase {
            RacePhase::Go | RacePhase::Race => {
                let mut players = self
                    .karts
                    .iter()
                    .filter(|k| !k.eliminated && k.controller.is_player())
                    .peekable();
                if players.peek().is_some() && players.all(|k| k.finished) {
                    self.delay_finish_left = self.config.race.delay_finish_time;
                    self.enter_phase(RacePhase::DelayFinish);
                }
            }
            RacePhase::DelayFinish => {
                self.delay_finish_left -= dt;
                if self.delay_finish_left <= 0.0 {
                    self.finish_remaining_by_estimate();
                    self.enter_phase(RacePhase::Finish);
                }
            }
            _ => {}
        }
    }

    fn finish_remaining_by_estimate(&mut self) {
        let race_time = self.race_time();
        let length = self.track.length();
        let num_laps = self.config.race.num_laps;
        let mut estimates: SmallVec<[(usize, f32); 20]> = self
            .karts
            .iter()
            .enumerate()
            .filter(|(_, k)| k.is_racing())
            .map(|(i, k)| (i, estimate_finish_time(k.lap, k.distance, race_time, length, num_laps)))
            .collect();
        estimates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        for (i, time) in estimates {
            self.finish_kart(i, time);
        }
    }

    fn record_history(&mut self, dt: f32) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        let karts = self
            .karts
            .iter()
            .map(|kart| {
                let body = self.physics.body(kart.body);
                KartFrame {
                    control: kart.control.pack(),
                    velocity: body.map_or(Vec3::ZERO, |b| b.velocity),
                    angular_velocity: body.map_or(Vec3::ZERO, |b| b.angular_velocity),
                    position: kart.position,
                    rotation: kart.rotation,
                }
            })
            .collect();
        recorder.record(HistoryFrame { dt, karts });
    }
}
