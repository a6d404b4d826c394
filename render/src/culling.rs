//! Bounding boxes, frustums and per-camera visibility.
//!
//! A node is culled for a camera when all eight corners of its world-space
//! box lie outside one of the frustum planes. This is conservative: some
//! boxes straddling a frustum corner survive, none that are visible get
//! dropped.

use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};

pub const SHADOW_CASCADES: usize = 4;

/// Axis-aligned box in object space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Corners moved into world space. The box itself may no longer be
    /// axis aligned, so the corners are kept rather than re-boxed.
    pub fn world_corners(&self, transform: &Mat4) -> [Vec3; 8] {
        self.corners().map(|c| transform.transform_point3(c))
    }
}

/// Six inward-facing planes extracted from a view-projection matrix with a
/// `[0, 1]` depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(normalize_plane);
        Self { planes }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| signed_distance(*p, point) >= 0.0)
    }

    pub fn is_culled(&self, corners: &[Vec3; 8]) -> bool {
        self.planes
            .iter()
            .any(|plane| corners.iter().all(|c| signed_distance(*plane, *c) < 0.0))
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.truncate().length();
    if length > f32::EPSILON {
        plane / length
    } else {
        plane
    }
}

fn signed_distance(plane: Vec4, point: Vec3) -> f32 {
    plane.truncate().dot(point) + plane.w
}

bitflags! {
    /// Cameras a node is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CameraMask: u8 {
        const MAIN = 1 << 0;
        const RSM = 1 << 1;
        const CASCADE_0 = 1 << 2;
        const CASCADE_1 = 1 << 3;
        const CASCADE_2 = 1 << 4;
        const CASCADE_3 = 1 << 5;
        const REFLECTION = 1 << 6;
    }
}

impl CameraMask {
    pub const CASCADES: CameraMask = CameraMask::CASCADE_0
        .union(CameraMask::CASCADE_1)
        .union(CameraMask::CASCADE_2)
        .union(CameraMask::CASCADE_3);

    pub fn cascade(index: usize) -> CameraMask {
        debug_assert!(index < SHADOW_CASCADES);
        CameraMask::from_bits_truncate(CameraMask::CASCADE_0.bits() << index)
    }
}

/// Every camera the frame renders from. Optional cameras are absent when
/// their pass is off.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSet {
    pub main: Frustum,
    pub shadow_cascades: Option<[Frustum; SHADOW_CASCADES]>,
    pub rsm: Option<Frustum>,
    pub reflection: Option<Frustum>,
}

impl CameraSet {
    pub fn main_only(view_proj: &Mat4) -> Self {
        Self {
            main: Frustum::from_view_projection(view_proj),
            shadow_cascades: None,
            rsm: None,
            reflection: None,
        }
    }

    /// Test one node against every camera present.
    pub fn visibility(&self, corners: &[Vec3; 8]) -> CameraMask {
        let mut mask = CameraMask::empty();
        if !self.main.is_culled(corners) {
            mask |= CameraMask::MAIN;
        }
        if let Some(rsm) = &self.rsm
            && !rsm.is_culled(corners)
        {
            mask |= CameraMask::RSM;
        }
        if let Some(cascades) = &self.shadow_cascades {
            for (i, frustum) in cascades.iter().enumerate() {
                if !frustum.is_culled(corners) {
                    mask |= CameraMask::cascade(i);
                }
            }
        }
        if let Some(reflection) = &self.reflection
            && !reflection.is_culled(corners)
        {
            mask |= CameraMask::REFLECTION;
        }
        mask
    }
}
