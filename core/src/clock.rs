//! Race phase clock.
//!
//! Drives the start sequence `SETUP → READY → SET → GO → RACE` and owns the
//! race time. Finish phases are entered by the world; the clock only keeps
//! time for them. Follow-the-leader switches the clock to count down once
//! the race starts.

/// Race phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RacePhase {
    Setup,
    Ready,
    Set,
    Go,
    Race,
    /// All players finished; waiting for the remaining karts.
    DelayFinish,
    Finish,
    /// Paused.
    Limbo,
}

impl RacePhase {
    /// True while karts accept driving input.
    pub fn is_racing(self) -> bool {
        matches!(self, RacePhase::Go | RacePhase::Race | RacePhase::DelayFinish)
    }
}

/// Durations of the start sequence, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseTimings {
    pub ready: f32,
    pub set: f32,
    pub go: f32,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            ready: 1.0,
            set: 1.0,
            go: 1.0,
        }
    }
}

/// Phase change observed during one clock update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: RacePhase,
    pub to: RacePhase,
}

/// Result of advancing the clock by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockTick {
    /// Delta the rest of the tick must use. Zero for the setup tick.
    pub dt: f32,
    pub transition: Option<PhaseTransition>,
    /// The countdown reached zero during this tick.
    pub countdown_expired: bool,
}

#[derive(Debug, Clone)]
pub struct RaceClock {
    phase: RacePhase,
    paused_phase: Option<RacePhase>,
    timings: PhaseTimings,
    /// Race time: counts up, or down in countdown mode.
    time: f32,
    /// Time spent in the current start-sequence phase.
    phase_time: f32,
    countdown: bool,
}

impl RaceClock {
    pub fn new(timings: PhaseTimings) -> Self {
        Self {
            phase: RacePhase::Setup,
            paused_phase: None,
            timings,
            time: 0.0,
            phase_time: 0.0,
            countdown: false,
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_countdown(&self) -> bool {
        self.countdown
    }

    pub fn is_paused(&self) -> bool {
        self.phase == RacePhase::Limbo
    }

    /// Switch to countdown mode starting at `seconds`.
    pub fn set_countdown(&mut self, seconds: f32) {
        self.countdown = true;
        self.time = seconds.max(0.0);
    }

    /// Enter a finish phase. Ignored while paused.
    pub fn set_phase(&mut self, phase: RacePhase) -> Option<PhaseTransition> {
        if self.is_paused() || self.phase == phase {
            return None;
        }
        let transition = PhaseTransition {
            from: self.phase,
            to: phase,
        };
        self.phase = phase;
        self.phase_time = 0.0;
        Some(transition)
    }

    /// Pause, remembering the current phase.
    pub fn pause(&mut self) {
        if self.is_paused() {
            return;
        }
        self.paused_phase = Some(self.phase);
        self.phase = RacePhase::Limbo;
    }

    /// Restore the phase saved by [`pause`](Self::pause).
    pub fn unpause(&mut self) {
        if let Some(phase) = self.paused_phase.take() {
            self.phase = phase;
        }
    }

    /// Advance by `dt`.
    pub fn update(&mut self, dt: f32) -> ClockTick {
        let mut tick = ClockTick {
            dt,
            transition: None,
            countdown_expired: false,
        };

        let next = match self.phase {
            RacePhase::Limbo => {
                tick.dt = 0.0;
                return tick;
            }
            RacePhase::Setup => {
                // Absorbs the loading time that would otherwise arrive as
                // one huge first delta.
                tick.dt = 0.0;
                self.time = 0.0;
                Some(RacePhase::Ready)
            }
            RacePhase::Ready if self.phase_time > self.timings.ready => Some(RacePhase::Set),
            RacePhase::Set if self.phase_time > self.timings.set => {
                if !self.countdown {
                    self.time = 0.0;
                }
                Some(RacePhase::Go)
            }
            RacePhase::Go if self.phase_time > self.timings.go => Some(RacePhase::Race),
            _ => None,
        };

        if let Some(to) = next {
            tick.transition = Some(PhaseTransition {
                from: self.phase,
                to,
            });
            self.phase = to;
            self.phase_time = 0.0;
        }

        self.phase_time += tick.dt;

        if self.countdown && self.phase.is_racing() {
            if self.time > 0.0 {
                self.time -= tick.dt;
                if self.time <= 0.0 {
                    self.time = 0.0;
                    tick.countdown_expired = true;
                }
            }
        } else if !self.countdown {
            self.time += tick.dt;
        }

        tick
    }
}

impl Default for RaceClock {
    fn default() -> Self {
        Self::new(PhaseTimings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn run_until(clock: &mut RaceClock, phase: RacePhase, max_ticks: usize) -> usize {
        for i in 0..max_ticks {
            if clock.phase() == phase {
                return i;
            }
            clock.update(DT);
        }
        panic!("clock never reached {phase:?}, stuck in {:?}", clock.phase());
    }

    #[test]
    fn test_setup_tick_has_zero_dt() {
        let mut clock = RaceClock::default();
        let tick = clock.update(5.0);
        assert_eq!(tick.dt, 0.0);
        assert_eq!(clock.phase(), RacePhase::Ready);
        assert_eq!(clock.time(), 0.0);
        assert_eq!(
            tick.transition,
            Some(PhaseTransition {
                from: RacePhase::Setup,
                to: RacePhase::Ready
            })
        );
    }

    #[test]
    fn test_start_sequence_order() {
        let mut clock = RaceClock::default();
        let mut seen = vec![clock.phase()];
        for _ in 0..400 {
            if let Some(t) = clock.update(DT).transition {
                seen.push(t.to);
            }
        }
        assert_eq!(
            seen,
            vec![
                RacePhase::Setup,
                RacePhase::Ready,
                RacePhase::Set,
                RacePhase::Go,
                RacePhase::Race
            ]
        );
    }

    #[test]
    fn test_time_resets_at_go() {
        let mut clock = RaceClock::default();
        run_until(&mut clock, RacePhase::Set, 200);
        assert!(clock.time() > 0.9);
        run_until(&mut clock, RacePhase::Go, 200);
        assert!(clock.time() <= DT + f32::EPSILON);
    }

    #[test]
    fn test_pause_restores_previous_phase() {
        let mut clock = RaceClock::default();
        run_until(&mut clock, RacePhase::Race, 400);
        let before = clock.time();

        clock.pause();
        assert!(clock.is_paused());
        let tick = clock.update(1.0);
        assert_eq!(tick.dt, 0.0);
        assert_eq!(clock.time(), before);

        clock.unpause();
        assert_eq!(clock.phase(), RacePhase::Race);
    }

    #[test]
    fn test_pause_during_start_sequence() {
        let mut clock = RaceClock::default();
        run_until(&mut clock, RacePhase::Set, 200);
        clock.pause();
        clock.pause();
        clock.unpause();
        assert_eq!(clock.phase(), RacePhase::Set);
    }

    #[test]
    fn test_countdown_expires_once() {
        let mut clock = RaceClock::default();
        clock.set_countdown(0.05);
        run_until(&mut clock, RacePhase::Go, 200);

        let mut expired = 0;
        for _ in 0..20 {
            if clock.update(DT).countdown_expired {
                expired += 1;
            }
        }
        assert_eq!(expired, 1);
        assert_eq!(clock.time(), 0.0);

        clock.set_countdown(20.0);
        assert_eq!(clock.time(), 20.0);
        assert!(clock.is_countdown());
    }

    #[test]
    fn test_set_phase_reports_transition() {
        let mut clock = RaceClock::default();
        run_until(&mut clock, RacePhase::Race, 400);
        let t = clock.set_phase(RacePhase::DelayFinish).unwrap();
        assert_eq!(t.from, RacePhase::Race);
        assert!(clock.set_phase(RacePhase::DelayFinish).is_none());
        assert!(clock.phase().is_racing());
        clock.set_phase(RacePhase::Finish);
        assert!(!clock.phase().is_racing());
    }
}
