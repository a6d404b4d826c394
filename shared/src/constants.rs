//! Centralized constants for racekit.
//!
//! Single source of truth for limits shared by the simulation, the renderer
//! and the network layer.

/// Maximum number of karts in one race.
pub const MAX_KARTS: usize = 20;

/// Maximum number of a single powerup a kart can hold.
pub const MAX_POWERUPS: u8 = 5;

/// Number of cascaded shadow map splits.
pub const NUM_SHADOW_CASCADES: usize = 4;

/// Default simulation tick rate in Hz.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Version tag written into history files.
pub const HISTORY_VERSION: u32 = 1;

/// Version of the persisted progress document.
pub const PROGRESS_VERSION: u32 = 2;

/// Version of the netplay sync protocol.
pub const SYNC_PROTOCOL_VERSION: u16 = 1;
