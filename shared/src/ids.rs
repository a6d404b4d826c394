//! Stable identifiers.

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// World kart id, stable for the lifetime of a race.
///
/// Karts are stored in a `Vec` indexed by this id; it never changes when a
/// kart is eliminated or finishes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Encode, Decode,
)]
pub struct KartId(pub u8);

impl KartId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Create an id from a kart index.
    ///
    /// Returns `None` if the index does not fit the wire representation.
    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index).ok().map(Self)
    }
}

impl std::fmt::Display for KartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kart#{}", self.0)
    }
}
