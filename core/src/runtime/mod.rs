//! Fixed timestep driver
//!
//! Runs the simulation in fixed ticks paid for by measured frame time. The
//! loop does not know about the world; callers pass the tick function.

use std::time::Duration;

mod config;
mod game_loop;


pub use config::RuntimeConfig;
pub use game_loop::run_ticks;

/// Fixed timestep driver
#[derive(Debug, Clone)]
pub struct GameLoop {
    config: RuntimeConfig,
    tick_duration: Duration,
    accumulator: Duration,
}

impl GameLoop {
    pub fn new(config: RuntimeConfig) -> Self {
        let tick_duration = config.tick_duration();
        Self {
            config,
            tick_duration,
            accumulator: Duration::ZERO,
        }
    }

    /// Get the current tick rate
    pub fn tick_rate(&self) -> u32 {
        self.config.tick_rate
    }

    /// Get the tick duration (time per tick, inverse of tick rate)
    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Fixed `dt` in seconds handed to every tick.
    pub fn tick_dt(&self) -> f32 {
        self.tick_duration.as_secs_f32()
    }

    /// Run the ticks an externally measured `elapsed` time pays for.
    ///
    /// Returns the number of ticks that were executed and the interpolation
    /// factor for rendering between the last two states.
    pub fn advance(&mut self, elapsed: Duration, tick: impl FnMut(f32)) -> (u32, f32) {
        run_ticks(
            &self.config,
            self.tick_duration,
            &mut self.accumulator,
            elapsed,
            1.0,
            tick,
        )
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
