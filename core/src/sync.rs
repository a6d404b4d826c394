//! Network sync payloads.
//!
//! Clients send one [`ControlMessage`] per tick. The server resolves every
//! random item outcome and broadcasts it as an [`ItemEvent`]; clients queue
//! those in [`KnownOutcomes`] and still consume the matching random draw, so
//! their stream never drifts from the server's. Packet framing and transport
//! live outside this crate.

use std::collections::VecDeque;

use bitcode::{Decode, Encode};
use racekit_shared::{KartId, PackedControl};

use crate::error::SyncDecodeError;
use crate::kart::{AttachmentType, PowerupType, decode_add_info};

/// Per-tick kart control, client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct ControlMessage {
    pub tick: u32,
    pub kart: KartId,
    pub control: PackedControl,
}

/// Resolved random outcome, server to client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum ItemEvent {
    /// Bonus box collected. `add_info` packs powerup type and count.
    BoxCollected {
        tick: u32,
        kart: KartId,
        item: u16,
        add_info: u8,
    },
    /// Banana hit. `attachment` indexes parachute, bomb, anvil.
    BananaHit {
        tick: u32,
        kart: KartId,
        item: u16,
        attachment: u8,
    },
    /// Kart exploded with this tumble draw.
    Explosion {
        tick: u32,
        kart: KartId,
        direct: bool,
        tumble: u32,
    },
}

impl ItemEvent {
    pub fn tick(&self) -> u32 {
        match *self {
            ItemEvent::BoxCollected { tick, .. }
            | ItemEvent::BananaHit { tick, .. }
            | ItemEvent::Explosion { tick, .. } => tick,
        }
    }

    pub fn kart(&self) -> KartId {
        match *self {
            ItemEvent::BoxCollected { kart, .. }
            | ItemEvent::BananaHit { kart, .. }
            | ItemEvent::Explosion { kart, .. } => kart,
        }
    }
}

/// Wire index of a banana attachment; inverse of [`AttachmentType::from_draw`].
pub fn attachment_index(kind: AttachmentType) -> u8 {
    match kind {
        AttachmentType::Bomb => 1,
        AttachmentType::Anvil => 2,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum SyncMessage {
    Control(ControlMessage),
    Items(Vec<ItemEvent>),
}

impl SyncMessage {
    pub fn to_bytes(&self) -> Vec<u8> {
        bitcode::encode(self)
    }

    /// Decode and check every kart id against a race of `num_karts`.
    pub fn from_bytes(bytes: &[u8], num_karts: usize) -> Result<Self, SyncDecodeError> {
        let message: SyncMessage = bitcode::decode(bytes)?;
        let check = |kart: KartId| {
            if kart.index() < num_karts {
                Ok(())
            } else {
                Err(SyncDecodeError::UnknownKart { kart })
            }
        };
        match &message {
            SyncMessage::Control(control) => check(control.kart)?,
            SyncMessage::Items(events) => {
                for event in events {
                    check(event.kart())?;
                    if let ItemEvent::BoxCollected { add_info, .. } = *event
                        && decode_add_info(add_info).is_none()
                    {
                        return Err(SyncDecodeError::InvalidItemInfo { info: add_info });
                    }
                }
            }
        }
        Ok(message)
    }
}

/// Outcomes received from the server, waiting for the local simulation to
/// reach the matching event.
#[derive(Debug, Clone, Default)]
pub struct KnownOutcomes {
    boxes: VecDeque<(KartId, u8)>,
    bananas: VecDeque<(KartId, u8)>,
    tumbles: VecDeque<(KartId, u32)>,
}

impl KnownOutcomes {
    pub fn push(&mut self, event: ItemEvent) {
        match event {
            ItemEvent::BoxCollected { kart, add_info, .. } => self.boxes.push_back((kart, add_info)),
            ItemEvent::BananaHit {
                kart, attachment, ..
            } => self.bananas.push_back((kart, attachment)),
            ItemEvent::Explosion { kart, tumble, .. } => self.tumbles.push_back((kart, tumble)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.bananas.is_empty() && self.tumbles.is_empty()
    }

    pub fn take_box(&mut self, kart: KartId) -> Option<(PowerupType, u8)> {
        let info = take_for(&mut self.boxes, kart)?;
        decode_add_info(info)
    }

    pub fn take_banana(&mut self, kart: KartId) -> Option<AttachmentType> {
        take_for(&mut self.bananas, kart).map(|index| AttachmentType::from_draw(index as u32))
    }

    pub fn take_tumble(&mut self, kart: KartId) -> Option<u32> {
        take_for(&mut self.tumbles, kart)
    }
}

fn take_for<T: Copy>(queue: &mut VecDeque<(KartId, T)>, kart: KartId) -> Option<T> {
    match queue.front() {
        Some(&(front, value)) if front == kart => {
            queue.pop_front();
            Some(value)
        }
        Some(&(front, _)) => {
            tracing::warn!(%kart, expected = %front, "known outcome queued for another kart");
            None
        }
        None => None,
    }
}
