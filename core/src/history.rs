//! Race history: per-tick deltas, controls and kart transforms.
//!
//! The file is line based:
//!
//! ```text
//! Version: 1
//! numkarts: 2
//! numplayers: 1
//! seed: 42
//! track: oval
//! model 0: tux
//! model 1: gnu
//! size: 3
//! delta: 0.016666668
//! ...                      (one delta line per tick)
//! steer accel buttons  vx vy vz  wx wy wz  x y z  rx ry rz
//! ...                      (one line per tick per kart)
//! History file end.
//! ```
//!
//! Floats are written with Rust's shortest round-trip formatting, so a
//! loaded history reproduces the recorded deltas bit for bit.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::path::Path;

use glam::Vec3;
use racekit_shared::PackedControl;
use racekit_shared::constants::{HISTORY_VERSION, MAX_KARTS};

use crate::error::HistoryError;

const END_MARKER: &str = "History file end.";

/// Recorded state of one kart for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KartFrame {
    pub control: PackedControl,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub position: Vec3,
    /// Euler rotation (pitch, yaw, roll).
    pub rotation: Vec3,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryFrame {
    pub dt: f32,
    pub karts: Vec<KartFrame>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryHeader {
    pub num_players: usize,
    pub seed: u64,
    pub track: String,
    /// Kart model names, one per kart.
    pub karts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct History {
    pub header: HistoryHeader,
    pub frames: Vec<HistoryFrame>,
}

impl History {
    pub fn to_text(&self) -> String {
        let h = &self.header;
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(out, "Version: {HISTORY_VERSION}");
        let _ = writeln!(out, "numkarts: {}", h.karts.len());
        let _ = writeln!(out, "numplayers: {}", h.num_players);
        let _ = writeln!(out, "seed: {}", h.seed);
        let _ = writeln!(out, "track: {}", h.track);
        for (k, name) in h.karts.iter().enumerate() {
            let _ = writeln!(out, "model {k}: {name}");
        }
        let _ = writeln!(out, "size: {}", self.frames.len());
        for frame in &self.frames {
            let _ = writeln!(out, "delta: {}", frame.dt);
        }
        for frame in &self.frames {
            for kart in &frame.karts {
                let c = kart.control;
                let (v, w, p, r) = (
                    kart.velocity,
                    kart.angular_velocity,
                    kart.position,
                    kart.rotation,
                );
                let _ = writeln!(
                    out,
                    "{} {} {}  {} {} {}  {} {} {}  {} {} {}  {} {} {}",
                    c.steer, c.accel, c.buttons, v.x, v.y, v.z, w.x, w.y, w.z, p.x, p.y, p.z, r.x,
                    r.y, r.z
                );
            }
        }
        out.push_str(END_MARKER);
        out.push('\n');
        out
    }

    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        std::fs::write(path, self.to_text())?;
        tracing::info!(path = %path.display(), ticks = self.frames.len(), "history saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse a history document. A short or malformed file is an error.
    pub fn parse(text: &str) -> Result<Self, HistoryError> {
        let mut lines = Lines::new(text);

        let version: u32 = lines.field("Version:", "version header")?;
        if version != HISTORY_VERSION {
            return Err(HistoryError::Malformed {
                line: lines.number,
                reason: format!("unsupported version {version}, expected {HISTORY_VERSION}"),
            });
        }
        let num_karts: usize = lines.field("numkarts:", "kart count")?;
        if num_karts > MAX_KARTS {
            return Err(HistoryError::Malformed {
                line: lines.number,
                reason: format!("{num_karts} karts, at most {MAX_KARTS} are supported"),
            });
        }
        let num_players: usize = lines.field("numplayers:", "player count")?;
        let seed: u64 = lines.field("seed:", "seed")?;
        let track = lines.text_field("track:", "track name")?.to_string();

        let mut karts = Vec::with_capacity(num_karts);
        for k in 0..num_karts {
            let prefix = format!("model {k}:");
            karts.push(lines.text_field(&prefix, "kart model")?.to_string());
        }

        let size: usize = lines.field("size:", "record count")?;
        if size == 0 {
            return Err(HistoryError::Empty);
        }
        // Every record needs at least its delta line
        let left = lines.remaining();
        if size > left {
            return Err(HistoryError::Malformed {
                line: lines.number,
                reason: format!("{size} records announced, only {left} lines follow"),
            });
        }

        let mut frames = Vec::with_capacity(size);
        for _ in 0..size {
            let dt: f32 = lines.field("delta:", "delta")?;
            frames.push(HistoryFrame {
                dt,
                karts: Vec::with_capacity(num_karts),
            });
        }
        for frame in &mut frames {
            for _ in 0..num_karts {
                frame.karts.push(lines.kart_frame()?);
            }
        }

        let (line, last) = lines.next("end marker")?;
        if last.trim() != END_MARKER {
            return Err(HistoryError::Malformed {
                line,
                reason: format!("expected '{END_MARKER}'"),
            });
        }

        Ok(Self {
            header: HistoryHeader {
                num_players,
                seed,
                track,
                karts,
            },
            frames,
        })
    }

    pub fn num_karts(&self) -> usize {
        self.header.karts.len()
    }

    /// Every recorded control of `kart`, in tick order.
    pub fn controls_for(&self, kart: usize) -> Vec<PackedControl> {
        self.frames
            .iter()
            .filter_map(|frame| frame.karts.get(kart).map(|k| k.control))
            .collect()
    }
}

struct Lines<'a> {
    inner: std::str::Lines<'a>,
    number: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.lines(),
            number: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.inner.clone().count()
    }

    fn next(&mut self, expected: &'static str) -> Result<(usize, &'a str), HistoryError> {
        self.number += 1;
        self.inner
            .next()
            .map(|line| (self.number, line))
            .ok_or(HistoryError::UnexpectedEof {
                line: self.number,
                expected,
            })
    }

    fn text_field(&mut self, prefix: &str, expected: &'static str) -> Result<&'a str, HistoryError> {
        let (line, text) = self.next(expected)?;
        text.strip_prefix(prefix)
            .map(str::trim)
            .ok_or_else(|| HistoryError::Malformed {
                line,
                reason: format!("expected '{prefix}'"),
            })
    }

    fn field<T: std::str::FromStr>(
        &mut self,
        prefix: &str,
        expected: &'static str,
    ) -> Result<T, HistoryError> {
        let value = self.text_field(prefix, expected)?;
        value.parse().map_err(|_| HistoryError::Malformed {
            line: self.number,
            reason: format!("invalid {expected} '{value}'"),
        })
    }

    fn kart_frame(&mut self) -> Result<KartFrame, HistoryError> {
        let (line, text) = self.next("kart record")?;
        let malformed = |reason: String| HistoryError::Malformed { line, reason };
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() != 15 {
            return Err(malformed(format!("expected 15 values, got {}", tokens.len())));
        }
        let steer: i16 = tokens[0]
            .parse()
            .map_err(|_| malformed(format!("invalid steer '{}'", tokens[0])))?;
        let accel: u16 = tokens[1]
            .parse()
            .map_err(|_| malformed(format!("invalid accel '{}'", tokens[1])))?;
        let buttons: u8 = tokens[2]
            .parse()
            .map_err(|_| malformed(format!("invalid buttons '{}'", tokens[2])))?;
        let mut floats = [0.0f32; 12];
        for (slot, token) in floats.iter_mut().zip(&tokens[3..]) {
            *slot = token
                .parse()
                .map_err(|_| malformed(format!("invalid number '{token}'")))?;
        }
        let vec = |i: usize| Vec3::new(floats[i], floats[i + 1], floats[i + 2]);
        Ok(KartFrame {
            control: PackedControl {
                steer,
                accel,
                buttons,
                reserved: 0,
            },
            velocity: vec(0),
            angular_velocity: vec(3),
            position: vec(6),
            rotation: vec(9),
        })
    }
}

/// Ring buffer of the most recent frames.
#[derive(Debug, Clone)]
pub struct HistoryRecorder {
    header: HistoryHeader,
    capacity: usize,
    frames: VecDeque<HistoryFrame>,
}

impl HistoryRecorder {
    pub fn new(header: HistoryHeader, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            header,
            capacity,
            frames: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    pub fn record(&mut self, frame: HistoryFrame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames oldest first.
    pub fn to_history(&self) -> History {
        History {
            header: self.header.clone(),
            frames: self.frames.iter().cloned().collect(),
        }
    }
}

/// How a loaded history drives the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    /// Recorded transforms overwrite the simulated ones every tick.
    #[default]
    Positions,
    /// Recorded controls drive the karts through the simulation.
    Controls,
}

#[derive(Debug, Clone)]
pub struct HistoryPlayback {
    history: History,
    mode: ReplayMode,
    cursor: usize,
}

impl HistoryPlayback {
    pub fn new(history: History, mode: ReplayMode) -> Self {
        Self {
            history,
            mode,
            cursor: 0,
        }
    }

    pub fn mode(&self) -> ReplayMode {
        self.mode
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.history.frames.len()
    }

    pub fn remaining(&self) -> usize {
        self.history.frames.len().saturating_sub(self.cursor)
    }

    /// Frame for the next tick.
    pub fn advance(&mut self) -> Option<&HistoryFrame> {
        let frame = self.history.frames.get(self.cursor)?;
        self.cursor += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racekit_shared::KartControl;

    fn sample() -> History {
        let control = KartControl {
            steer: -0.25,
            accel: 1.0,
            fire: true,
            ..Default::default()
        }
        .pack();
        let frame = |dt: f32, x: f32| HistoryFrame {
            dt,
            karts: vec![
                KartFrame {
                    control,
                    velocity: Vec3::new(0.1, 0.0, 12.5),
                    angular_velocity: Vec3::new(0.0, -0.3, 0.0),
                    position: Vec3::new(x, 0.0, 3.0),
                    rotation: Vec3::new(0.0, 1.0 / 3.0, 0.0),
                },
                KartFrame::default(),
            ],
        };
        History {
            header: HistoryHeader {
                num_players: 1,
                seed: 42,
                track: "oval".into(),
                karts: vec!["tux".into(), "gnu".into()],
            },
            frames: vec![frame(1.0 / 60.0, 0.5), frame(0.0171, -2.75)],
        }
    }

    #[test]
    fn test_text_reloads_bit_exact() {
        let history = sample();
        let parsed = History::parse(&history.to_text()).unwrap();
        assert_eq!(parsed, history);
        assert_eq!(parsed.frames[0].dt.to_bits(), (1.0f32 / 60.0).to_bits());
    }

    #[test]
    fn test_header_layout() {
        let text = sample().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Version: 1");
        assert_eq!(lines[1], "numkarts: 2");
        assert_eq!(lines[5], "model 0: tux");
        assert_eq!(lines[7], "size: 2");
        assert!(lines[8].starts_with("delta: "));
        assert_eq!(*lines.last().unwrap(), END_MARKER);
    }

    #[test]
    fn test_truncated_file_is_error() {
        let text = sample().to_text();
        let cut: String = text.lines().take(12).map(|l| format!("{l}\n")).collect();
        assert!(matches!(
            History::parse(&cut),
            Err(HistoryError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_malformed_record_is_error() {
        let text = sample().to_text().replace("12.5", "twelve");
        assert!(matches!(
            History::parse(&text),
            Err(HistoryError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_end_marker_is_error() {
        let text = sample().to_text().replace(END_MARKER, "garbage");
        assert!(matches!(
            History::parse(&text),
            Err(HistoryError::Malformed { .. })
        ));
    }

    #[test]
    fn test_oversized_record_count_is_error() {
        let text = sample()
            .to_text()
            .replacen("size: 2", "size: 18446744073709551615", 1);
        assert!(matches!(
            History::parse(&text),
            Err(HistoryError::Malformed { line: 8, .. })
        ));
    }

    #[test]
    fn test_too_many_karts_is_error() {
        let text = sample().to_text().replacen("numkarts: 2", "numkarts: 4000000000", 1);
        assert!(matches!(
            History::parse(&text),
            Err(HistoryError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_wrong_version_is_error() {
        let text = sample().to_text().replacen("Version: 1", "Version: 9", 1);
        assert!(matches!(
            History::parse(&text),
            Err(HistoryError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn test_recorder_keeps_latest_frames() {
        let mut recorder = HistoryRecorder::new(HistoryHeader::default(), 3);
        for i in 0..5 {
            recorder.record(HistoryFrame {
                dt: i as f32,
                karts: vec![],
            });
        }
        let history = recorder.to_history();
        let deltas: Vec<f32> = history.frames.iter().map(|f| f.dt).collect();
        assert_eq!(deltas, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_playback_advances_once_per_tick() {
        let mut playback = HistoryPlayback::new(sample(), ReplayMode::Controls);
        assert_eq!(playback.remaining(), 2);
        assert_eq!(playback.advance().map(|f| f.dt), Some(1.0 / 60.0));
        assert_eq!(playback.advance().map(|f| f.dt), Some(0.0171));
        assert!(playback.advance().is_none());
        assert!(playback.is_finished());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.dat");
        let history = sample();
        history.save(&path).unwrap();
        assert_eq!(History::load(&path).unwrap(), history);
        assert_eq!(history.controls_for(0).len(), 2);
    }
}
