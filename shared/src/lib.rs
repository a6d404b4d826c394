//! Shared types for racekit.
//!
//! Everything here crosses a crate or a network boundary: kart ids,
//! per-tick control input and the netplay handshake.

pub mod constants;
pub mod control;
pub mod ids;
pub mod netplay;

pub use control::{ButtonFlags, KartControl, PackedControl};
pub use ids::KartId;
pub use netplay::{NetplayMismatch, RaceHandshake};
