//! Netplay handshake types.
//!
//! Before a networked race starts every peer exchanges a [`RaceHandshake`].
//! All of them must agree on the values that drive the simulation, otherwise
//! the shared random stream diverges on the first item pickup.

use bitcode::{Decode, Encode};

use crate::constants::{DEFAULT_TICK_RATE, SYNC_PROTOCOL_VERSION};

/// Simulation parameters that must match on every peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct RaceHandshake {
    /// Sync protocol version.
    pub protocol_version: u16,
    /// Fixed simulation tick rate in Hz.
    pub tick_rate: u32,
    /// Number of karts in the race, including AI.
    pub num_karts: u8,
    /// Seed for the shared gameplay random stream.
    pub seed: u64,
    /// Hash of the gameplay tuning values.
    pub config_hash: u64,
}

impl RaceHandshake {
    pub const fn new(num_karts: u8, seed: u64, config_hash: u64) -> Self {
        Self {
            protocol_version: SYNC_PROTOCOL_VERSION,
            tick_rate: DEFAULT_TICK_RATE,
            num_karts,
            seed,
            config_hash,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bitcode::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bitcode::Error> {
        bitcode::decode(bytes)
    }

    /// Check whether a race can be shared with the given peer.
    pub fn validate_compatibility(&self, peer: &RaceHandshake) -> Result<(), NetplayMismatch> {
        if self.protocol_version != peer.protocol_version {
            return Err(NetplayMismatch::ProtocolVersion {
                local: self.protocol_version,
                peer: peer.protocol_version,
            });
        }
        if self.config_hash != peer.config_hash {
            return Err(NetplayMismatch::ConfigHash {
                local: self.config_hash,
                peer: peer.config_hash,
            });
        }
        if self.tick_rate != peer.tick_rate {
            return Err(NetplayMismatch::TickRate {
                local: self.tick_rate,
                peer: peer.tick_rate,
            });
        }
        if self.num_karts != peer.num_karts {
            return Err(NetplayMismatch::KartCount {
                local: self.num_karts,
                peer: peer.num_karts,
            });
        }
        if self.seed != peer.seed {
            return Err(NetplayMismatch::Seed);
        }
        Ok(())
    }
}

/// Reasons why two peers cannot race together.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetplayMismatch {
    #[error("sync protocol mismatch: local v{local}, peer v{peer}")]
    ProtocolVersion { local: u16, peer: u16 },
    #[error("gameplay config mismatch: local {local:016x}, peer {peer:016x}")]
    ConfigHash { local: u64, peer: u64 },
    #[error("tick rate mismatch: local {local}Hz, peer {peer}Hz")]
    TickRate { local: u32, peer: u32 },
    #[error("kart count mismatch: local {local}, peer {peer}")]
    KartCount { local: u8, peer: u8 },
    #[error("random seed mismatch")]
    Seed,
}
