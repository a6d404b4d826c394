//! racekit core - race world simulation
//!
//! This crate owns everything that happens inside one race tick: the phase
//! clock, kart state machines, physics integration, items and projectiles,
//! ranking and the follow-the-leader mode. It has no GPU dependency; the
//! renderer reads kart and item state through the accessors on [`World`].
//!
//! # Architecture
//!
//! - [`RaceSession`] - Owns a [`World`] and drives it with a fixed timestep
//! - [`World`] - The simulation context passed to every subsystem
//! - [`GameRandom`] - The only source of gameplay randomness
//! - [`PhysicsBackend`] - Rigid-body integration behind a trait

pub mod clock;
pub mod config;
pub mod error;
pub mod history;
#[cfg(test)]
mod integration;
pub mod items;
pub mod kart;
pub mod physics;
pub mod progress;
pub mod random;
pub mod runtime;
pub mod session;
pub mod sync;
#[cfg(test)]
pub mod test_utils;
pub mod track;
pub mod world;

pub use clock::{RaceClock, RacePhase};
pub use config::{GameplayConfig, RaceMode};
pub use error::{ConfigError, HistoryError, ProgressError, SetupError, SyncDecodeError};
pub use kart::{Controller, Kart};
pub use physics::{ArcadePhysics, PhysicsBackend};
pub use random::{GameRandom, RandomEvent};
pub use runtime::RuntimeConfig;
pub use session::{KartSetup, RaceSession, RaceSetup};
pub use track::Track;
pub use world::{World, WorldEvent};
