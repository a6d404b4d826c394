//! Error types for race setup, configuration and persisted files.
//!
//! Anything that fails here is fatal to the session that hit it. Per-tick
//! anomalies (no ground under a kart, a missing homing target) are not
//! errors and never surface through these types.

use std::path::PathBuf;

/// Fatal errors raised while building a race.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("track '{track}' needs at least 3 centerline points, got {points}")]
    TrackTooShort { track: String, points: usize },

    #[error("track '{track}' has a degenerate centerline segment at point {index}")]
    DegenerateSegment { track: String, index: usize },

    #[error("race needs between 1 and {max} karts, got {got}")]
    KartCount { got: usize, max: usize },

    #[error("track provides {available} start positions for {karts} karts")]
    NotEnoughStartPositions { available: usize, karts: usize },

    #[error("no ground under start position {index} at ({x:.2}, {z:.2})")]
    NoGroundAtStart { index: usize, x: f32, z: f32 },

    #[error("invalid gameplay config: {0}")]
    Config(#[from] ConfigError),

    #[error("history does not match race: {0}")]
    HistoryMismatch(String),
}

/// Errors raised when loading or validating gameplay configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f32,
    },

    #[error("race.leader_intervals must contain at least one positive interval")]
    EmptyLeaderIntervals,

    #[error("skidding bonus tables must have equal length and increasing thresholds")]
    SkidBonusTable,
}

/// Errors raised while reading or writing a history file.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("history ended early at line {line}: expected {expected}")]
    UnexpectedEof { line: usize, expected: &'static str },

    #[error("malformed history line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("history is empty")]
    Empty,
}

/// Errors raised while loading or saving the progress document.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("progress I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse progress document: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize progress document: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("progress document version {found} is older than supported version {expected}")]
    OutdatedVersion { found: u32, expected: u32 },

    #[error("progress document version {found} is newer than supported version {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Errors raised while decoding a network sync payload.
#[derive(Debug, thiserror::Error)]
pub enum SyncDecodeError {
    #[error("malformed sync payload: {0}")]
    Malformed(#[from] bitcode::Error),

    #[error("sync payload references unknown kart {kart}")]
    UnknownKart { kart: racekit_shared::KartId },

    #[error("sync payload carries invalid item info {info:#04x}")]
    InvalidItemInfo { info: u8 },
}
