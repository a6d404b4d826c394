//! Persisted player progress.
//!
//! A fixed set of named counters plus per-track counters, stored as a TOML
//! document tagged with [`PROGRESS_VERSION`]:
//!
//! ```toml
//! version = 2
//!
//! [counters]
//! won-races = 4
//! powerup-used = 31
//!
//! [tracks.oval]
//! started = 5
//! finished = 4
//! ```
//!
//! Counter names are part of the format. Renaming or re-purposing one is a
//! compatibility break and must bump the version; documents from another
//! version are rejected instead of being reinterpreted.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use racekit_shared::KartId;
use serde::{Deserialize, Serialize};

use crate::config::RaceMode;
use crate::error::ProgressError;
use crate::sync::ItemEvent;
use crate::world::{World, WorldEvent};

pub const PROGRESS_VERSION: u32 = 2;

/// Player-wide counters.
///
/// `*1Race` and `*1Lap` counters hold the value of the race or lap in
/// progress; their `*Max` partner keeps the best value ever reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    WonRaces,
    WonNormalRaces,
    WonTimeTrialRaces,
    WonLeaderRaces,
    ConsecutiveWins,
    ConsecutiveWinsMax,
    NormalStarted,
    NormalFinished,
    TimeTrialStarted,
    TimeTrialFinished,
    LeaderStarted,
    LeaderFinished,
    PowerupUsed,
    PowerupUsed1Race,
    PowerupUsed1RaceMax,
    Banana,
    Banana1Race,
    Banana1RaceMax,
    Skidding,
    Skidding1Race,
    Skidding1RaceMax,
    Skidding1Lap,
    Skidding1LapMax,
    Explosions,
    Rescues,
}

impl Counter {
    pub const COUNT: usize = 25;

    pub const ALL: [Counter; Self::COUNT] = [
        Counter::WonRaces,
        Counter::WonNormalRaces,
        Counter::WonTimeTrialRaces,
        Counter::WonLeaderRaces,
        Counter::ConsecutiveWins,
        Counter::ConsecutiveWinsMax,
        Counter::NormalStarted,
        Counter::NormalFinished,
        Counter::TimeTrialStarted,
        Counter::TimeTrialFinished,
        Counter::LeaderStarted,
        Counter::LeaderFinished,
        Counter::PowerupUsed,
        Counter::PowerupUsed1Race,
        Counter::PowerupUsed1RaceMax,
        Counter::Banana,
        Counter::Banana1Race,
        Counter::Banana1RaceMax,
        Counter::Skidding,
        Counter::Skidding1Race,
        Counter::Skidding1RaceMax,
        Counter::Skidding1Lap,
        Counter::Skidding1LapMax,
        Counter::Explosions,
        Counter::Rescues,
    ];

    /// Name used in the progress document.
    pub fn key(self) -> &'static str {
        match self {
            Counter::WonRaces => "won-races",
            Counter::WonNormalRaces => "won-normal-races",
            Counter::WonTimeTrialRaces => "won-tt-races",
            Counter::WonLeaderRaces => "won-ftl-races",
            Counter::ConsecutiveWins => "cons-won-races",
            Counter::ConsecutiveWinsMax => "cons-won-races-max",
            Counter::NormalStarted => "normal-started",
            Counter::NormalFinished => "normal-finished",
            Counter::TimeTrialStarted => "tt-started",
            Counter::TimeTrialFinished => "tt-finished",
            Counter::LeaderStarted => "ftl-started",
            Counter::LeaderFinished => "ftl-finished",
            Counter::PowerupUsed => "powerup-used",
            Counter::PowerupUsed1Race => "powerup-used-1race",
            Counter::PowerupUsed1RaceMax => "powerup-used-1race-max",
            Counter::Banana => "banana",
            Counter::Banana1Race => "banana-1race",
            Counter::Banana1RaceMax => "banana-1race-max",
            Counter::Skidding => "skidding",
            Counter::Skidding1Race => "skidding-1race",
            Counter::Skidding1RaceMax => "skidding-1race-max",
            Counter::Skidding1Lap => "skidding-1lap",
            Counter::Skidding1LapMax => "skidding-1lap-max",
            Counter::Explosions => "explosions",
            Counter::Rescues => "rescues",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Per-track counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackCounter {
    Started,
    Finished,
    Won,
    FinishedAlone,
}

impl TrackCounter {
    pub const COUNT: usize = 4;

    pub const ALL: [TrackCounter; Self::COUNT] = [
        TrackCounter::Started,
        TrackCounter::Finished,
        TrackCounter::Won,
        TrackCounter::FinishedAlone,
    ];

    pub fn key(self) -> &'static str {
        match self {
            TrackCounter::Started => "started",
            TrackCounter::Finished => "finished",
            TrackCounter::Won => "won",
            TrackCounter::FinishedAlone => "finished-alone",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackStats([u32; TrackCounter::COUNT]);

impl TrackStats {
    pub fn get(&self, counter: TrackCounter) -> u32 {
        self.0[counter.index()]
    }
}

/// How a race ended for the tracked player.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceResult {
    pub track: String,
    pub mode: RaceMode,
    pub num_karts: usize,
    /// Final position, `None` when the player did not finish.
    pub position: Option<u32>,
    /// The race was quit or restarted before the end.
    pub aborted: bool,
}

impl RaceResult {
    /// Result of `player` in `world`. Unfinished karts count as aborted.
    pub fn from_world(world: &World, player: KartId) -> Option<Self> {
        let kart = world.kart(player)?;
        let finished = kart.finished && !kart.eliminated;
        Some(Self {
            track: world.track().name().to_string(),
            mode: world.config().race.mode,
            num_karts: world.karts().len(),
            position: finished.then_some(kart.race_position),
            aborted: !world.is_finished(),
        })
    }

    pub fn won(&self) -> bool {
        !self.aborted && self.position == Some(1)
    }
}

/// On-disk layout. Maps are ordered so saved files diff cleanly.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressDocument {
    version: u32,
    #[serde(default)]
    counters: BTreeMap<String, u32>,
    #[serde(default)]
    tracks: BTreeMap<String, BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    counters: [u32; Counter::COUNT],
    tracks: HashMap<String, TrackStats>,
    dirty: bool,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            counters: [0; Counter::COUNT],
            tracks: HashMap::new(),
            dirty: false,
        }
    }
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: Counter) -> u32 {
        self.counters[counter.index()]
    }

    pub fn increase(&mut self, counter: Counter, amount: u32) {
        let value = &mut self.counters[counter.index()];
        *value = value.saturating_add(amount);
        self.dirty = true;
    }

    pub fn reset(&mut self, counter: Counter) {
        self.counters[counter.index()] = 0;
        self.dirty = true;
    }

    pub fn track(&self, track: &str) -> Option<&TrackStats> {
        self.tracks.get(track)
    }

    /// Tracks with recorded stats, sorted by name.
    pub fn track_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tracks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn track_event(&mut self, track: &str, counter: TrackCounter) {
        let stats = self.tracks.entry(track.to_string()).or_default();
        let value = &mut stats.0[counter.index()];
        *value = value.saturating_add(1);
        self.dirty = true;
    }

    /// Unsaved changes since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn race_started(&mut self, track: &str, mode: RaceMode) {
        self.increase(started_counter(mode), 1);
        self.track_event(track, TrackCounter::Started);
    }

    /// Fold one world event into the counters of `player`.
    pub fn observe(&mut self, event: &WorldEvent, player: KartId) {
        match *event {
            WorldEvent::PowerupUsed { kart, .. } if kart == player => {
                self.increase(Counter::PowerupUsed, 1);
                self.increase(Counter::PowerupUsed1Race, 1);
            }
            WorldEvent::SkidBonus { kart, .. } if kart == player => {
                self.increase(Counter::Skidding, 1);
                self.increase(Counter::Skidding1Race, 1);
                self.increase(Counter::Skidding1Lap, 1);
            }
            WorldEvent::LapCompleted { kart, .. } if kart == player => self.lap_ended(),
            WorldEvent::Rescued { kart } if kart == player => self.increase(Counter::Rescues, 1),
            WorldEvent::Item(ItemEvent::BananaHit { kart, .. }) if kart == player => {
                self.increase(Counter::Banana, 1);
                self.increase(Counter::Banana1Race, 1);
            }
            WorldEvent::Item(ItemEvent::Explosion { kart, .. }) if kart == player => {
                self.increase(Counter::Explosions, 1);
            }
            _ => {}
        }
    }

    /// Close the per-lap counters.
    pub fn lap_ended(&mut self) {
        self.keep_max(Counter::Skidding1Lap, Counter::Skidding1LapMax);
        self.reset(Counter::Skidding1Lap);
    }

    /// Close the per-race counters and count the result.
    pub fn race_ended(&mut self, result: &RaceResult) {
        self.lap_ended();
        for (current, max) in [
            (Counter::PowerupUsed1Race, Counter::PowerupUsed1RaceMax),
            (Counter::Banana1Race, Counter::Banana1RaceMax),
            (Counter::Skidding1Race, Counter::Skidding1RaceMax),
        ] {
            self.keep_max(current, max);
            self.reset(current);
        }

        if result.aborted {
            // Restarting must not keep a winning streak alive.
            self.reset(Counter::ConsecutiveWins);
            return;
        }

        if result.position.is_some() {
            self.increase(finished_counter(result.mode), 1);
            self.track_event(&result.track, TrackCounter::Finished);
            if result.num_karts == 1 {
                self.track_event(&result.track, TrackCounter::FinishedAlone);
            }
        }

        if result.won() && result.num_karts > 1 {
            self.increase(Counter::WonRaces, 1);
            self.increase(won_counter(result.mode), 1);
            self.increase(Counter::ConsecutiveWins, 1);
            self.keep_max(Counter::ConsecutiveWins, Counter::ConsecutiveWinsMax);
            self.track_event(&result.track, TrackCounter::Won);
        } else if result.num_karts > 1 {
            self.reset(Counter::ConsecutiveWins);
        }
    }

    fn keep_max(&mut self, current: Counter, max: Counter) {
        let value = self.get(current);
        if value > self.get(max) {
            self.counters[max.index()] = value;
            self.dirty = true;
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ProgressError> {
        let document = ProgressDocument {
            version: PROGRESS_VERSION,
            counters: Counter::ALL
                .into_iter()
                .map(|c| (c.key().to_string(), self.get(c)))
                .collect(),
            tracks: self
                .tracks
                .iter()
                .map(|(name, stats)| {
                    let counters = TrackCounter::ALL
                        .into_iter()
                        .map(|c| (c.key().to_string(), stats.get(c)))
                        .collect();
                    (name.clone(), counters)
                })
                .collect(),
        };
        Ok(toml::to_string_pretty(&document)?)
    }

    /// Parse a progress document. Unknown counter names are dropped with a
    /// warning; missing ones start at zero.
    pub fn from_toml_str(content: &str) -> Result<Self, ProgressError> {
        let document: ProgressDocument = toml::from_str(content)?;
        if document.version < PROGRESS_VERSION {
            return Err(ProgressError::OutdatedVersion {
                found: document.version,
                expected: PROGRESS_VERSION,
            });
        }
        if document.version > PROGRESS_VERSION {
            return Err(ProgressError::UnsupportedVersion {
                found: document.version,
                expected: PROGRESS_VERSION,
            });
        }

        let mut progress = Self::new();
        for (key, value) in &document.counters {
            match Counter::from_key(key) {
                Some(counter) => progress.counters[counter.index()] = *value,
                None => tracing::warn!(counter = %key, "discarding unknown progress counter"),
            }
        }
        for (track, counters) in document.tracks {
            let mut stats = TrackStats::default();
            for (key, value) in &counters {
                match TrackCounter::from_key(key) {
                    Some(counter) => stats.0[counter.index()] = *value,
                    None => tracing::warn!(%track, counter = %key, "discarding unknown track counter"),
                }
            }
            progress.tracks.insert(track, stats);
        }
        Ok(progress)
    }

    /// Load `path`, or start fresh when it does not exist yet.
    pub fn load_or_new(path: &Path) -> Result<Self, ProgressError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no progress file, starting fresh");
                return Ok(Self::new());
            }
            Err(source) => return Err(io_error(path, source)),
        };
        Self::from_toml_str(&content)
    }

    /// Write the document to `path`, creating parent directories.
    pub fn save(&mut self, path: &Path) -> Result<(), ProgressError> {
        let content = self.to_toml_string()?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        fs::write(path, content).map_err(|source| io_error(path, source))?;
        self.dirty = false;
        tracing::debug!(path = %path.display(), "progress saved");
        Ok(())
    }
}

fn io_error(path: &Path, source: io::Error) -> ProgressError {
    ProgressError::Io {
        path: PathBuf::from(path),
        source,
    }
}

fn started_counter(mode: RaceMode) -> Counter {
    match mode {
        RaceMode::Normal => Counter::NormalStarted,
        RaceMode::TimeTrial => Counter::TimeTrialStarted,
        RaceMode::FollowTheLeader => Counter::LeaderStarted,
    }
}

fn finished_counter(mode: RaceMode) -> Counter {
    match mode {
        RaceMode::Normal => Counter::NormalFinished,
        RaceMode::TimeTrial => Counter::TimeTrialFinished,
        RaceMode::FollowTheLeader => Counter::LeaderFinished,
    }
}

fn won_counter(mode: RaceMode) -> Counter {
    match mode {
        RaceMode::Normal => Counter::WonNormalRaces,
        RaceMode::TimeTrial => Counter::WonTimeTrialRaces,
        RaceMode::FollowTheLeader => Counter::WonLeaderRaces,
    }
}
