//! Items: pooled projectiles and effects, plus pickups lying on the track.

mod arena;
mod explosion;
mod manager;
mod pickups;
mod projectile;

pub use arena::{Arena, Handle};
pub use explosion::ExplosionEffect;
pub use manager::{Impact, Impacts, ItemManager, closest_kart};
pub use pickups::{PickupField, PickupKind, TrackItem};
pub use projectile::{KartTarget, Projectile, ProjectileHit, ProjectileKind};
