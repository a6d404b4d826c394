//! Game loop execution with fixed timestep

use std::time::{Duration, Instant};

use super::RuntimeConfig;

/// Accumulate `delta` and run the ticks it pays for.
///
/// `delta` is clamped to `max_delta` before scaling so a long stall cannot
/// trigger an unbounded catch-up burst.
pub fn run_ticks(
    config: &RuntimeConfig,
    tick_duration: Duration,
    accumulator: &mut Duration,
    delta: Duration,
    time_scale: f32,
    mut tick: impl FnMut(f32),
) -> (u32, f32) {
    let delta = delta.min(config.max_delta);
    *accumulator += if time_scale == 1.0 {
        delta
    } else {
        delta.mul_f32(time_scale.max(0.0))
    };

    let dt = tick_duration.as_secs_f32();
    let mut ticks = 0u32;
    while *accumulator >= tick_duration {
        let tick_start = Instant::now();

        tick(dt);

        *accumulator -= tick_duration;
        ticks += 1;

        // Check CPU budget
        let tick_time = tick_start.elapsed();
        if tick_time > config.cpu_budget {
            tracing::warn!(
                "Tick took {:?}, exceeds budget of {:?}",
                tick_time,
                config.cpu_budget
            );
        }
    }

    // Calculate interpolation factor for rendering
    let alpha = accumulator.as_secs_f32() / dt;

    (ticks, alpha)
}
