//! Follow-the-leader elimination.
//!
//! Kart 0 is the leader. When the countdown expires one kart is
//! eliminated: the last one if the leader is in front, otherwise whoever
//! is overtaking the leader.

use crate::config::RaceConfig;

/// Race is over once this many karts remain.
pub const LEADER_FINAL_KARTS: usize = 2;

/// Position snapshot of a kart that can still be eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderEntry {
    pub index: usize,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderCountdown {
    intervals: Vec<f32>,
    time_per_kart: f32,
}

impl LeaderCountdown {
    pub fn new(config: &RaceConfig) -> Self {
        Self {
            intervals: config.leader_intervals.clone(),
            time_per_kart: config.leader_time_per_kart,
        }
    }

    pub fn intervals(&self) -> &[f32] {
        &self.intervals
    }

    /// Countdown for the current interval with `remaining_karts` racing.
    pub fn current(&self, remaining_karts: usize) -> f32 {
        let base = self.intervals.first().copied().unwrap_or(0.0);
        base + self.time_per_kart * remaining_karts as f32
    }

    /// Move to the next interval once an elimination happened. The last
    /// interval repeats.
    pub fn advance(&mut self, remaining_karts: usize) -> f32 {
        if self.intervals.len() > 1 {
            self.intervals.remove(0);
        }
        self.current(remaining_karts)
    }
}

/// Which kart to eliminate. `karts` holds the live karts, leader included.
pub fn pick_victim(karts: &[LeaderEntry]) -> Option<usize> {
    let leader_first = karts
        .iter()
        .any(|k| k.index == 0 && k.position == 1);
    if leader_first {
        karts
            .iter()
            .filter(|k| k.index != 0)
            .max_by_key(|k| (k.position, k.index))
            .map(|k| k.index)
    } else {
        karts
            .iter()
            .filter(|k| k.index != 0)
            .min_by_key(|k| (k.position, k.index))
            .map(|k| k.index)
    }
}
