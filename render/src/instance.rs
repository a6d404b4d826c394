//! GPU-side instance records and indirect draw commands.
//!
//! All records are `Pod` so a filled `Vec` is uploaded with
//! `bytemuck::cast_slice` and no per-field copy.

use bytemuck::{Pod, Zeroable};
use glam::{EulerRot, Mat4, Vec2};

use crate::scene::MeshPart;

/// Layout of `wgpu::util::DrawIndexedIndirectArgs`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirect {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl DrawIndexedIndirect {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Which instance buffer a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    ThreeTex,
    FourTex,
    Shadow,
    Rsm,
    Glow,
}

impl InstanceKind {
    pub const ALL: [InstanceKind; 5] = [
        InstanceKind::ThreeTex,
        InstanceKind::FourTex,
        InstanceKind::Shadow,
        InstanceKind::Rsm,
        InstanceKind::Glow,
    ];
}

/// Per-instance inputs gathered during traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceSettings {
    /// Absolute transform.
    pub transform: Mat4,
    pub texture_transform: Vec2,
    /// Hue and colorization factor.
    pub colorization: Vec2,
    /// Index of the node's first joint matrix, 0 when not skinned.
    pub skinning_offset: i32,
    pub glow_color: [u8; 4],
}

impl InstanceSettings {
    pub fn new(transform: Mat4) -> Self {
        Self {
            transform,
            texture_transform: Vec2::ZERO,
            colorization: Vec2::ZERO,
            skinning_offset: 0,
            glow_color: [0; 4],
        }
    }
}

/// Origin, orientation (degrees) and scale of a transform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Placement {
    pub origin: [f32; 3],
    pub orientation: [f32; 3],
    pub scale: [f32; 3],
}

impl Placement {
    pub fn from_transform(transform: &Mat4) -> Self {
        let (scale, rotation, origin) = transform.to_scale_rotation_translation();
        let (x, y, z) = rotation.to_euler(EulerRot::XYZ);
        Self {
            origin: origin.to_array(),
            orientation: [x.to_degrees(), y.to_degrees(), z.to_degrees()],
            scale: scale.to_array(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceSingleTex {
    pub placement: Placement,
    pub texture: u32,
    pub skinning_offset: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceThreeTex {
    pub placement: Placement,
    pub misc: [f32; 4],
    pub textures: [u32; 3],
    pub skinning_offset: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceFourTex {
    pub placement: Placement,
    pub misc: [f32; 4],
    pub textures: [u32; 4],
    pub skinning_offset: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceGlow {
    pub placement: Placement,
    /// RGBA8, little endian.
    pub color: u32,
}

/// Builds one instance record from a mesh part and its settings.
pub trait InstanceData: Pod + Send {
    fn fill(part: &MeshPart, settings: &InstanceSettings) -> Self;
}

fn misc(settings: &InstanceSettings) -> [f32; 4] {
    [
        settings.texture_transform.x,
        settings.texture_transform.y,
        settings.colorization.x,
        settings.colorization.y,
    ]
}

impl InstanceData for InstanceSingleTex {
    fn fill(part: &MeshPart, settings: &InstanceSettings) -> Self {
        Self {
            placement: Placement::from_transform(&settings.transform),
            texture: part.textures[0],
            skinning_offset: settings.skinning_offset,
        }
    }
}

impl InstanceData for InstanceThreeTex {
    fn fill(part: &MeshPart, settings: &InstanceSettings) -> Self {
        Self {
            placement: Placement::from_transform(&settings.transform),
            misc: misc(settings),
            textures: [part.textures[0], part.textures[1], part.textures[2]],
            skinning_offset: settings.skinning_offset,
        }
    }
}

impl InstanceData for InstanceFourTex {
    fn fill(part: &MeshPart, settings: &InstanceSettings) -> Self {
        Self {
            placement: Placement::from_transform(&settings.transform),
            misc: misc(settings),
            textures: part.textures,
            skinning_offset: settings.skinning_offset,
        }
    }
}

impl InstanceData for InstanceGlow {
    fn fill(_part: &MeshPart, settings: &InstanceSettings) -> Self {
        Self {
            placement: Placement::from_transform(&settings.transform),
            color: u32::from_le_bytes(settings.glow_color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialType;
    use crate::scene::MeshId;
    use glam::{Quat, Vec3};

    #[test]
    fn test_indirect_layout_matches_wgpu() {
        assert_eq!(
            DrawIndexedIndirect::SIZE as usize,
            std::mem::size_of::<wgpu::util::DrawIndexedIndirectArgs>()
        );
    }

    #[test]
    fn test_placement_from_transform() {
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 2.0, 2.0),
            Quat::from_rotation_y(90f32.to_radians()),
            Vec3::new(1.0, 2.0, 3.0),
        );
        let placement = Placement::from_transform(&transform);
        assert_eq!(placement.origin, [1.0, 2.0, 3.0]);
        assert!((placement.orientation[1] - 90.0).abs() < 1e-3);
        for s in placement.scale {
            assert!((s - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_four_tex_keeps_every_texture() {
        let part = MeshPart::solid(MeshId(0), MaterialType::NormalMap, 3).with_textures([1, 2, 3, 4]);
        let mut settings = InstanceSettings::new(Mat4::IDENTITY);
        settings.colorization = Vec2::new(0.25, 0.5);
        settings.skinning_offset = 7;
        let record = InstanceFourTex::fill(&part, &settings);
        assert_eq!(record.textures, [1, 2, 3, 4]);
        assert_eq!(record.misc, [0.0, 0.0, 0.25, 0.5]);
        assert_eq!(record.skinning_offset, 7);
    }

    #[test]
    fn test_glow_color_packing() {
        let part = MeshPart::solid(MeshId(0), MaterialType::Solid, 3);
        let mut settings = InstanceSettings::new(Mat4::IDENTITY);
        settings.glow_color = [0x11, 0x22, 0x33, 0xff];
        let record = InstanceGlow::fill(&part, &settings);
        assert_eq!(record.color, 0xff33_2211);
        assert_eq!(bytemuck::bytes_of(&record).len(), std::mem::size_of::<InstanceGlow>());
    }
}
