//! Race positions.

/// What ranking needs to know about one kart.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RankEntry {
    pub eliminated: bool,
    pub finished: bool,
    pub lap: i32,
    pub distance: f32,
    /// Start-grid slot, 0 at the front.
    pub grid: u32,
}

impl RankEntry {
    /// `self` is strictly ahead of `other`. At equal progress the kart that
    /// started further forward is ahead.
    pub fn is_ahead_of(&self, other: &RankEntry) -> bool {
        if self.finished {
            return true;
        }
        if self.lap != other.lap {
            return self.lap > other.lap;
        }
        self.distance > other.distance
            || (self.distance == other.distance && self.grid < other.grid)
    }
}

/// 1-based position of every kart still running, `None` for eliminated or
/// finished karts, which keep the position they already have.
///
/// A kart's position is one plus the number of other live karts strictly
/// ahead of it. Grid slots break ties, so running karts get distinct
/// positions.
pub fn compute_positions(entries: &[RankEntry]) -> Vec<Option<u32>> {
    entries
        .iter()
        .enumerate()
        .map(|(k, entry)| {
            if entry.eliminated || entry.finished {
                return None;
            }
            let ahead = entries
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != k && !other.eliminated && other.is_ahead_of(entry))
                .count();
            Some(1 + ahead as u32)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(lap: i32, distance: f32) -> RankEntry {
        RankEntry {
            lap,
            distance,
            ..Default::default()
        }
    }

    fn on_grid(entries: &mut [RankEntry]) {
        for (slot, entry) in entries.iter_mut().enumerate() {
            entry.grid = slot as u32;
        }
    }

    #[test]
    fn test_lap_beats_distance() {
        let positions = compute_positions(&[running(0, 90.0), running(1, 5.0), running(0, 10.0)]);
        assert_eq!(positions, vec![Some(2), Some(1), Some(3)]);
    }

    #[test]
    fn test_ties_broken_by_grid_slot() {
        let mut entries = [running(1, 50.0), running(1, 50.0), running(0, 10.0)];
        on_grid(&mut entries);
        let positions = compute_positions(&entries);
        assert_eq!(positions, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_tied_karts_keep_distinct_stable_positions() {
        let mut entries = [running(0, 0.0), running(0, 0.0), running(0, 0.0), running(0, 0.0)];
        on_grid(&mut entries);
        let first = compute_positions(&entries);
        for _ in 0..10 {
            for entry in &mut entries {
                entry.distance += 1.5;
            }
            assert_eq!(compute_positions(&entries), first);
        }
        let mut sorted: Vec<_> = first.iter().flatten().copied().collect();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_finished_karts_are_ahead_and_skipped() {
        let mut done = running(3, 0.0);
        done.finished = true;
        let positions = compute_positions(&[running(2, 80.0), done]);
        assert_eq!(positions, vec![Some(2), None]);
    }

    #[test]
    fn test_eliminated_karts_do_not_count() {
        let mut out = running(5, 0.0);
        out.eliminated = true;
        let positions = compute_positions(&[out, running(0, 1.0), running(0, 2.0)]);
        assert_eq!(positions, vec![None, Some(2), Some(1)]);
    }

    #[test]
    fn test_moving_ahead_never_raises_position() {
        let mut entries = vec![running(0, 10.0), running(0, 20.0), running(0, 30.0)];
        let mut last = compute_positions(&entries)[0].unwrap();
        for step in 0..40 {
            entries[0].distance = 10.0 + step as f32;
            let now = compute_positions(&entries)[0].unwrap();
            assert!(now <= last);
            last = now;
        }
        assert_eq!(last, 1);
    }
}
