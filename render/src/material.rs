//! Material shader types and their per-pass draw orders.

use serde::{Deserialize, Serialize};

/// Solid material shaders. Each one owns a slot in every command buffer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaterialType {
    Solid = 0,
    AlphaTest,
    SolidUnlit,
    SphereMap,
    DetailMap,
    NormalMap,
    Vegetation,
    /// Terrain splatting. Drawn directly in the solid pass, instanced in
    /// shadows.
    Splatting,
    SkinnedSolid,
    SkinnedAlphaTest,
    SkinnedUnlit,
    SkinnedNormalMap,
}

impl MaterialType {
    pub const COUNT: usize = 12;

    pub const ALL: [MaterialType; Self::COUNT] = [
        MaterialType::Solid,
        MaterialType::AlphaTest,
        MaterialType::SolidUnlit,
        MaterialType::SphereMap,
        MaterialType::DetailMap,
        MaterialType::NormalMap,
        MaterialType::Vegetation,
        MaterialType::Splatting,
        MaterialType::SkinnedSolid,
        MaterialType::SkinnedAlphaTest,
        MaterialType::SkinnedUnlit,
        MaterialType::SkinnedNormalMap,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_skinned(self) -> bool {
        matches!(
            self,
            MaterialType::SkinnedSolid
                | MaterialType::SkinnedAlphaTest
                | MaterialType::SkinnedUnlit
                | MaterialType::SkinnedNormalMap
        )
    }

    /// Normal and detail maps need a fourth texture in their instance data.
    pub fn uses_four_textures(self) -> bool {
        matches!(
            self,
            MaterialType::DetailMap | MaterialType::NormalMap | MaterialType::SkinnedNormalMap
        )
    }

    /// Materials rendered into the reflective shadow map.
    pub fn casts_rsm(self) -> bool {
        matches!(
            self,
            MaterialType::Solid
                | MaterialType::AlphaTest
                | MaterialType::SolidUnlit
                | MaterialType::DetailMap
                | MaterialType::NormalMap
        )
    }
}

/// Order of the solid first pass (depth and normals).
pub const SOLID_FIRST_PASS_ORDER: [MaterialType; 11] = [
    MaterialType::Solid,
    MaterialType::AlphaTest,
    MaterialType::SolidUnlit,
    MaterialType::SphereMap,
    MaterialType::Vegetation,
    MaterialType::DetailMap,
    MaterialType::NormalMap,
    MaterialType::SkinnedSolid,
    MaterialType::SkinnedAlphaTest,
    MaterialType::SkinnedUnlit,
    MaterialType::SkinnedNormalMap,
];

/// The second pass applies lighting in the same order.
pub const SOLID_SECOND_PASS_ORDER: [MaterialType; 11] = SOLID_FIRST_PASS_ORDER;

pub const SHADOW_PASS_ORDER: [MaterialType; 12] = [
    MaterialType::Solid,
    MaterialType::DetailMap,
    MaterialType::AlphaTest,
    MaterialType::SolidUnlit,
    MaterialType::Vegetation,
    MaterialType::NormalMap,
    MaterialType::Splatting,
    MaterialType::SphereMap,
    MaterialType::SkinnedSolid,
    MaterialType::SkinnedAlphaTest,
    MaterialType::SkinnedUnlit,
    MaterialType::SkinnedNormalMap,
];

pub const RSM_PASS_ORDER: [MaterialType; 5] = [
    MaterialType::Solid,
    MaterialType::AlphaTest,
    MaterialType::SolidUnlit,
    MaterialType::NormalMap,
    MaterialType::DetailMap,
];

/// Blended materials, sorted back to front by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransparentKind {
    Blend,
    Additive,
    Translucent,
    Displacement,
}

/// Where a mesh part is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshPass {
    Solid(MaterialType),
    Transparent(TransparentKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_match_all_table() {
        for (i, material) in MaterialType::ALL.iter().enumerate() {
            assert_eq!(material.index(), i);
        }
    }

    #[test]
    fn test_rsm_order_matches_casters() {
        for material in MaterialType::ALL {
            assert_eq!(material.casts_rsm(), RSM_PASS_ORDER.contains(&material));
        }
    }

    #[test]
    fn test_shadow_order_covers_every_material() {
        for material in MaterialType::ALL {
            assert!(SHADOW_PASS_ORDER.contains(&material));
        }
    }

    #[test]
    fn test_splatting_not_instanced_in_solid_pass() {
        assert!(!SOLID_FIRST_PASS_ORDER.contains(&MaterialType::Splatting));
        assert!(!MaterialType::Splatting.casts_rsm());
    }
}
