//! Finishing karts that are still on track when the race ends.

/// Karts that have covered less than this are treated as having covered
/// this much, so a kart rescued behind the line still gets a finite time.
const MIN_COVERED: f32 = 1.0;

/// Estimated arrival time from the average speed so far.
///
/// Karts further ahead have a higher average speed, so estimates preserve
/// the current order.
pub fn estimate_finish_time(
    lap: i32,
    distance: f32,
    race_time: f32,
    track_length: f32,
    num_laps: u32,
) -> f32 {
    let covered = (lap as f32 * track_length + distance).max(MIN_COVERED);
    let full = num_laps as f32 * track_length;
    if race_time <= 0.0 {
        return f32::MAX;
    }
    let average_speed = covered / race_time;
    race_time + (full - covered).max(0.0) / average_speed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_way_doubles_time() {
        let t = estimate_finish_time(1, 50.0, 60.0, 100.0, 3);
        assert!((t - 120.0).abs() < 1e-3);
    }

    #[test]
    fn test_order_is_preserved() {
        let ahead = estimate_finish_time(2, 10.0, 90.0, 100.0, 3);
        let behind = estimate_finish_time(1, 90.0, 90.0, 100.0, 3);
        assert!(ahead < behind);
    }

    #[test]
    fn test_behind_start_line_is_finite() {
        let t = estimate_finish_time(0, -5.0, 10.0, 100.0, 1);
        assert!(t.is_finite());
        assert!(t > 10.0);
    }
}
