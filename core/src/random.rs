//! Deterministic gameplay randomness.
//!
//! Every random decision that can change race state goes through
//! [`GameRandom`]. Each [`RandomEvent`] costs exactly one 32-bit draw from a
//! PCG stream, on every code path, so peers that already know an outcome
//! (from a network message) stay aligned with peers that roll it.
//!
//! Values are derived from the raw draw arithmetically instead of through
//! `rand`'s range sampling, which may consume a variable number of words.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;

/// The enumerated set of call sites allowed to consume randomness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RandomEvent {
    /// Bonus box pickup: harmful roll plus which powerup.
    BonusBox,
    /// Banana pickup: which attachment is handed out.
    Banana,
    /// Tumble axes of an explosion animation.
    ExplosionTumble,
}

impl RandomEvent {
    pub const COUNT: usize = 3;

    pub const ALL: [RandomEvent; Self::COUNT] = [
        RandomEvent::BonusBox,
        RandomEvent::Banana,
        RandomEvent::ExplosionTumble,
    ];

    const fn index(self) -> usize {
        match self {
            RandomEvent::BonusBox => 0,
            RandomEvent::Banana => 1,
            RandomEvent::ExplosionTumble => 2,
        }
    }
}

/// Seeded random stream shared by all peers of a race.
#[derive(Debug, Clone)]
pub struct GameRandom {
    seed: u64,
    rng: Pcg32,
    draws: [u64; RandomEvent::COUNT],
}

impl GameRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            draws: [0; RandomEvent::COUNT],
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Consume one draw for `event`.
    pub fn draw(&mut self, event: RandomEvent) -> u32 {
        self.draws[event.index()] += 1;
        self.rng.next_u32()
    }

    /// Resolve an outcome that may already be known.
    ///
    /// The draw happens before `known` is looked at, so both branches leave
    /// the stream in the same state.
    pub fn resolve<T>(
        &mut self,
        event: RandomEvent,
        known: Option<T>,
        roll: impl FnOnce(u32) -> T,
    ) -> T {
        let value = self.draw(event);
        match known {
            Some(outcome) => outcome,
            None => roll(value),
        }
    }

    /// Number of draws consumed by `event` so far.
    pub fn draw_count(&self, event: RandomEvent) -> u64 {
        self.draws[event.index()]
    }

    pub fn total_draws(&self) -> u64 {
        self.draws.iter().sum()
    }
}

/// Map a draw to a float in `[-1, 1]` using ten bits starting at `shift`.
pub fn signed_unit(draw: u32, shift: u32) -> f32 {
    let bits = (draw >> shift) & 0x3FF;
    bits as f32 / 1023.0 * 2.0 - 1.0
}
