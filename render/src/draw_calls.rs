//! Scene traversal into per-pass mesh buckets.
//!
//! One walk per frame classifies every visible mesh part into the solid,
//! glow, shadow-cascade and reflective-shadow-map buckets, grouped by mesh
//! so each group becomes one instanced draw. Skinned nodes reserve joint
//! matrices from a fixed budget; a node that does not fit is skipped for
//! the whole frame.

use glam::Mat4;
use hashbrown::HashMap;

use crate::culling::{CameraMask, CameraSet, SHADOW_CASCADES};
use crate::instance::InstanceSettings;
use crate::material::{MaterialType, MeshPass};
use crate::scene::{MeshId, MeshNode, MeshPart, NodeId, Renderable, Scene, SceneNode};

/// Groups instances of the same mesh range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartKey {
    pub mesh: MeshId,
    pub first_index: u32,
}

impl PartKey {
    pub fn of(part: &MeshPart) -> Self {
        Self {
            mesh: part.mesh,
            first_index: part.first_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceList {
    pub part: MeshPart,
    pub instances: Vec<InstanceSettings>,
}

pub type MeshBucket = HashMap<PartKey, InstanceList>;

/// Index of a shadow bucket.
pub fn shadow_slot(cascade: usize, material: MaterialType) -> usize {
    cascade * MaterialType::COUNT + material.index()
}

/// Which optional passes are collected this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSettings {
    pub shadows: bool,
    pub global_illumination: bool,
    /// The reflective shadow map is already rendered for this track.
    pub rsm_available: bool,
    pub hardware_skinning: bool,
    pub max_skinning_bones: u32,
}

impl PassSettings {
    fn allowed_cameras(&self) -> CameraMask {
        let mut mask = CameraMask::MAIN | CameraMask::REFLECTION;
        if self.shadows {
            mask |= CameraMask::CASCADES;
        }
        if self.global_illumination && !self.rsm_available {
            mask |= CameraMask::RSM;
        }
        mask
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransparentDraw {
    pub node: NodeId,
    pub part: MeshPart,
    pub transform: Mat4,
}

/// Joint range reserved for a skinned node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinnedSlot {
    pub node: NodeId,
    pub offset: u32,
    pub joints: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TraversalStats {
    pub visited: u32,
    /// Mesh nodes culled for the main camera.
    pub culled: u32,
    pub skipped_skinned: u32,
}

#[derive(Debug)]
pub struct DrawCalls {
    solid: Vec<MeshBucket>,
    shadow: Vec<MeshBucket>,
    rsm: Vec<MeshBucket>,
    glow: MeshBucket,
    splatting: Vec<(MeshPart, InstanceSettings)>,
    transparent: Vec<TransparentDraw>,
    immediate: Vec<NodeId>,
    particles: Vec<NodeId>,
    billboards: Vec<NodeId>,
    skinned: Vec<SkinnedSlot>,
    joints_used: u32,
    stats: TraversalStats,
}

impl Default for DrawCalls {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawCalls {
    pub fn new() -> Self {
        Self {
            solid: vec![MeshBucket::new(); MaterialType::COUNT],
            shadow: vec![MeshBucket::new(); SHADOW_CASCADES * MaterialType::COUNT],
            rsm: vec![MeshBucket::new(); MaterialType::COUNT],
            glow: MeshBucket::new(),
            splatting: Vec::new(),
            transparent: Vec::new(),
            immediate: Vec::new(),
            particles: Vec::new(),
            billboards: Vec::new(),
            skinned: Vec::new(),
            joints_used: 0,
            stats: TraversalStats::default(),
        }
    }

    pub fn clear(&mut self) {
        for bucket in self.solid.iter_mut().chain(&mut self.shadow).chain(&mut self.rsm) {
            bucket.clear();
        }
        self.glow.clear();
        self.splatting.clear();
        self.transparent.clear();
        self.immediate.clear();
        self.particles.clear();
        self.billboards.clear();
        self.skinned.clear();
        self.joints_used = 0;
        self.stats = TraversalStats::default();
    }

    /// Rebuild every bucket from the scene.
    pub fn prepare(&mut self, scene: &Scene, cameras: &CameraSet, settings: &PassSettings) {
        self.clear();
        let mut walk = Walk {
            cameras,
            settings,
            allowed: settings.allowed_cameras(),
        };
        walk.nodes(self, scene.roots(), &Mat4::IDENTITY);
        tracing::trace!(
            visited = self.stats.visited,
            culled = self.stats.culled,
            joints = self.joints_used,
            "scene traversed"
        );
    }

    pub fn solid_buckets(&self) -> &[MeshBucket] {
        &self.solid
    }

    pub fn solid_bucket(&self, material: MaterialType) -> &MeshBucket {
        &self.solid[material.index()]
    }

    pub fn shadow_buckets(&self) -> &[MeshBucket] {
        &self.shadow
    }

    pub fn shadow_bucket(&self, cascade: usize, material: MaterialType) -> &MeshBucket {
        &self.shadow[shadow_slot(cascade, material)]
    }

    pub fn rsm_buckets(&self) -> &[MeshBucket] {
        &self.rsm
    }

    pub fn glow_bucket(&self) -> &MeshBucket {
        &self.glow
    }

    /// Splatted terrain, drawn one by one in the solid passes.
    pub fn splatting(&self) -> &[(MeshPart, InstanceSettings)] {
        &self.splatting
    }

    pub fn transparent(&self) -> &[TransparentDraw] {
        &self.transparent
    }

    pub fn immediate(&self) -> &[NodeId] {
        &self.immediate
    }

    pub fn particles(&self) -> &[NodeId] {
        &self.particles
    }

    pub fn billboards(&self) -> &[NodeId] {
        &self.billboards
    }

    pub fn skinned(&self) -> &[SkinnedSlot] {
        &self.skinned
    }

    /// Joint matrices reserved this frame, excluding the identity slot.
    pub fn joints_used(&self) -> u32 {
        self.joints_used
    }

    pub fn stats(&self) -> TraversalStats {
        self.stats
    }
}

struct Walk<'a> {
    cameras: &'a CameraSet,
    settings: &'a PassSettings,
    allowed: CameraMask,
}

impl Walk<'_> {
    fn nodes(&mut self, out: &mut DrawCalls, nodes: &[SceneNode], parent: &Mat4) {
        for node in nodes {
            if !node.visible {
                continue;
            }
            out.stats.visited += 1;
            let absolute = *parent * node.transform;

            match &node.renderable {
                Renderable::Particles => {
                    if self.visibility(node, &absolute).contains(CameraMask::MAIN) {
                        out.particles.push(node.id);
                    }
                    continue;
                }
                Renderable::Billboard => {
                    if self.visibility(node, &absolute).contains(CameraMask::MAIN) {
                        out.billboards.push(node.id);
                    }
                    continue;
                }
                Renderable::Group => {}
                Renderable::Mesh(mesh) => self.mesh(out, node, &absolute, mesh, None),
                Renderable::Skinned { mesh, joints } => {
                    self.mesh(out, node, &absolute, mesh, Some(*joints))
                }
            }

            self.nodes(out, &node.children, &absolute);
        }
    }

    fn visibility(&self, node: &SceneNode, absolute: &Mat4) -> CameraMask {
        let mask = if node.automatic_culling {
            self.cameras.visibility(&node.bounds.world_corners(absolute))
        } else {
            CameraMask::all()
        };
        mask & self.allowed
    }

    fn mesh(
        &mut self,
        out: &mut DrawCalls,
        node: &SceneNode,
        absolute: &Mat4,
        mesh: &MeshNode,
        joints: Option<u32>,
    ) {
        let mask = self.visibility(node, absolute);
        let main = mask.contains(CameraMask::MAIN);

        if mesh.immediate {
            if main {
                out.immediate.push(node.id);
            }
            return;
        }
        if !main {
            out.stats.culled += 1;
        }

        let mut skinning_offset = 0;
        if let Some(joints) = joints
            && self.settings.hardware_skinning
            && !mask.is_empty()
        {
            // Slot 0 is the reserved identity matrix.
            let offset = out.joints_used + 1;
            if offset + joints > self.settings.max_skinning_bones {
                tracing::error!(
                    node = %node.name,
                    joints,
                    max_bones = self.settings.max_skinning_bones,
                    "not enough joint matrices left for skinned mesh"
                );
                out.stats.skipped_skinned += 1;
                return;
            }
            out.joints_used += joints;
            out.skinned.push(SkinnedSlot {
                node: node.id,
                offset,
                joints,
            });
            skinning_offset = offset as i32;
        }

        if main {
            for part in &mesh.parts {
                if let MeshPass::Transparent(_) = part.pass {
                    out.transparent.push(TransparentDraw {
                        node: node.id,
                        part: *part,
                        transform: *absolute,
                    });
                }
            }
        }

        let base = {
            let mut settings = InstanceSettings::new(*absolute);
            settings.skinning_offset = skinning_offset;
            settings
        };

        for part in &mesh.parts {
            let MeshPass::Solid(material) = part.pass else {
                continue;
            };

            if main {
                if let Some(color) = mesh.glow {
                    let mut glow = base;
                    glow.glow_color = color;
                    push(&mut out.glow, part, glow);
                }
                let mut solid = base;
                solid.texture_transform = part.texture_transform;
                solid.colorization = glam::Vec2::new(part.hue, part.colorization);
                if material == MaterialType::Splatting {
                    out.splatting.push((*part, solid));
                } else {
                    push(&mut out.solid[material.index()], part, solid);
                }
            }

            for cascade in 0..SHADOW_CASCADES {
                if mask.contains(CameraMask::cascade(cascade)) {
                    push(&mut out.shadow[shadow_slot(cascade, material)], part, base);
                }
            }

            if mask.contains(CameraMask::RSM) && material.casts_rsm() {
                push(&mut out.rsm[material.index()], part, base);
            }
        }
    }
}

fn push(bucket: &mut MeshBucket, part: &MeshPart, settings: InstanceSettings) {
    bucket
        .entry(PartKey::of(part))
        .or_insert_with(|| InstanceList {
            part: *part,
            instances: Vec::new(),
        })
        .instances
        .push(settings);
}
