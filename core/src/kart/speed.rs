//! Timed speed increases (zipper, skid bonus).

/// Who granted a speed increase. One slot per source; a new increase from
/// the same source replaces the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeedSource {
    Zipper,
    Skidding,
}

impl SpeedSource {
    const COUNT: usize = 2;

    fn index(self) -> usize {
        match self {
            SpeedSource::Zipper => 0,
            SpeedSource::Skidding => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Boost {
    remaining: f32,
    max_speed_increase: f32,
    force: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeedModifiers {
    boosts: [Option<Boost>; SpeedSource::COUNT],
}

impl SpeedModifiers {
    /// Raise the max speed by `max_speed_increase` and add `force` to the
    /// engine for `duration` seconds.
    pub fn increase(&mut self, source: SpeedSource, max_speed_increase: f32, force: f32, duration: f32) {
        if duration <= 0.0 {
            return;
        }
        self.boosts[source.index()] = Some(Boost {
            remaining: duration,
            max_speed_increase,
            force,
        });
    }

    pub fn update(&mut self, dt: f32) {
        for slot in &mut self.boosts {
            if let Some(boost) = slot {
                boost.remaining -= dt;
                if boost.remaining <= 0.0 {
                    *slot = None;
                }
            }
        }
    }

    pub fn is_active(&self, source: SpeedSource) -> bool {
        self.boosts[source.index()].is_some()
    }

    pub fn max_speed_bonus(&self) -> f32 {
        self.boosts.iter().flatten().map(|b| b.max_speed_increase).sum()
    }

    pub fn extra_force(&self) -> f32 {
        self.boosts.iter().flatten().map(|b| b.force).sum()
    }

    pub fn clear(&mut self) {
        self.boosts = Default::default();
    }
}
