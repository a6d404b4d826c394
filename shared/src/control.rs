//! Per-tick kart control input.
//!
//! `KartControl` is what controllers (local player, AI, network, ghost)
//! produce each tick. `PackedControl` is the 6-byte form that goes on the
//! wire and into input history.

use bitcode::{Decode, Encode};
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

bitflags! {
    /// Digital control buttons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ButtonFlags: u8 {
        const BRAKE = 1 << 0;
        const SKID = 1 << 1;
        const RESCUE = 1 << 2;
        const FIRE = 1 << 3;
        const LOOK_BACK = 1 << 4;
    }
}

/// Control state for one kart for one tick.
///
/// Steering is in `[-1, 1]` where negative turns left and positive turns
/// right. Acceleration is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KartControl {
    pub steer: f32,
    pub accel: f32,
    pub brake: bool,
    pub skid: bool,
    pub rescue: bool,
    pub fire: bool,
    pub look_back: bool,
}

impl KartControl {
    /// Returns a copy with analog axes clamped to their valid ranges.
    ///
    /// NaN inputs collapse to zero.
    pub fn clamped(self) -> Self {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        Self {
            steer: finite(self.steer).clamp(-1.0, 1.0),
            accel: finite(self.accel).clamp(0.0, 1.0),
            ..self
        }
    }

    pub fn buttons(&self) -> ButtonFlags {
        let mut flags = ButtonFlags::empty();
        flags.set(ButtonFlags::BRAKE, self.brake);
        flags.set(ButtonFlags::SKID, self.skid);
        flags.set(ButtonFlags::RESCUE, self.rescue);
        flags.set(ButtonFlags::FIRE, self.fire);
        flags.set(ButtonFlags::LOOK_BACK, self.look_back);
        flags
    }

    /// Quantize into the wire representation.
    pub fn pack(&self) -> PackedControl {
        let c = self.clamped();
        PackedControl {
            steer: (c.steer * i16::MAX as f32).round() as i16,
            accel: (c.accel * u16::MAX as f32).round() as u16,
            buttons: c.buttons().bits(),
            reserved: 0,
        }
    }
}

/// Wire form of [`KartControl`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable, Encode, Decode)]
pub struct PackedControl {
    pub steer: i16,
    pub accel: u16,
    pub buttons: u8,
    pub reserved: u8,
}

impl PackedControl {
    pub fn unpack(&self) -> KartControl {
        // Unknown bits are dropped so a newer peer cannot smuggle state in.
        let buttons = ButtonFlags::from_bits_truncate(self.buttons);
        KartControl {
            steer: (self.steer as f32 / i16::MAX as f32).clamp(-1.0, 1.0),
            accel: self.accel as f32 / u16::MAX as f32,
            brake: buttons.contains(ButtonFlags::BRAKE),
            skid: buttons.contains(ButtonFlags::SKID),
            rescue: buttons.contains(ButtonFlags::RESCUE),
            fire: buttons.contains(ButtonFlags::FIRE),
            look_back: buttons.contains(ButtonFlags::LOOK_BACK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_control_is_six_bytes() {
        assert_eq!(std::mem::size_of::<PackedControl>(), 6);
    }

    #[test]
    fn test_pack_extremes() {
        let control = KartControl {
            steer: -1.0,
            accel: 1.0,
            fire: true,
            skid: true,
            ..Default::default()
        };
        let packed = control.pack();
        assert_eq!(packed.steer, -i16::MAX);
        assert_eq!(packed.accel, u16::MAX);
        assert_eq!(
            ButtonFlags::from_bits_truncate(packed.buttons),
            ButtonFlags::FIRE | ButtonFlags::SKID
        );

        let unpacked = packed.unpack();
        assert_eq!(unpacked.steer, -1.0);
        assert_eq!(unpacked.accel, 1.0);
        assert!(unpacked.fire);
        assert!(unpacked.skid);
        assert!(!unpacked.brake);
    }

    #[test]
    fn test_pack_clamps_out_of_range() {
        let control = KartControl {
            steer: 4.0,
            accel: -3.0,
            ..Default::default()
        };
        let packed = control.pack();
        assert_eq!(packed.steer, i16::MAX);
        assert_eq!(packed.accel, 0);
    }

    #[test]
    fn test_nan_steer_becomes_zero() {
        let control = KartControl {
            steer: f32::NAN,
            ..Default::default()
        };
        assert_eq!(control.clamped().steer, 0.0);
    }

    #[test]
    fn test_unknown_button_bits_ignored() {
        let packed = PackedControl {
            buttons: 0b1110_0000,
            ..Default::default()
        };
        assert_eq!(packed.unpack(), KartControl::default());
    }

    #[test]
    fn test_pod_cast() {
        let packed = KartControl {
            steer: 0.5,
            brake: true,
            ..Default::default()
        }
        .pack();
        let bytes: &[u8] = bytemuck::bytes_of(&packed);
        let back: PackedControl = *bytemuck::from_bytes(bytes);
        assert_eq!(back, packed);
    }
}
