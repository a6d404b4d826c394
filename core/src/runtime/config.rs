//! Runtime configuration

use std::time::Duration;

use racekit_shared::constants::DEFAULT_TICK_RATE;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Target tick rate in Hz
    pub tick_rate: u32,
    /// Maximum delta time clamp (prevents spiral of death)
    pub max_delta: Duration,
    /// CPU budget warning threshold per tick
    pub cpu_budget: Duration,
}

impl RuntimeConfig {
    pub fn with_tick_rate(tick_rate: u32) -> Self {
        Self {
            tick_rate: tick_rate.max(1),
            ..Self::default()
        }
    }

    /// Time per tick, the inverse of the tick rate.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            max_delta: Duration::from_millis(100),
            cpu_budget: Duration::from_micros(4000), // 4ms at 60fps
        }
    }
}
