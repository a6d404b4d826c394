//! Render targets and framebuffers.
//!
//! [`RenderTargets`] is the only owner of target handles. Everything else
//! names a target by [`RenderTargetId`] or a framebuffer by
//! [`FramebufferId`] and resolves it here each frame. A resize destroys
//! every target and builds the set again; the generation counter lets
//! holders of per-frame state notice that happened.

use hashbrown::HashMap;
use smallvec::{SmallVec, smallvec};

use crate::config::RenderConfig;
use crate::culling::SHADOW_CASCADES;
use crate::device::{RenderDevice, TargetHandle};
use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderTargetId {
    Tmp1,
    Tmp2,
    Tmp4,
    LinearDepth,
    NormalAndDepth,
    Color,
    Ssao,
    Displace,
    Diffuse,
    Specular,
    Half1,
    Half2,
    Quarter1,
    Quarter2,
    Eighth1,
    Eighth2,
    /// Bloom chain, level 0 is the shadow map size, each level halves.
    Bloom(u8),
    DepthStencil,
    ShadowColor,
    ShadowDepth,
    RsmColor,
    RsmNormal,
    RsmDepth,
}

const BLOOM_LEVELS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Rgba16Float,
    Rg11b10Float,
    R16Float,
    R32Float,
    Rgba8,
    R8,
    Depth24Stencil8,
}

impl TargetFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TargetFormat::Depth24Stencil8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDesc {
    pub id: RenderTargetId,
    pub width: u32,
    pub height: u32,
    /// Array layers; more than one only for shadow cascades.
    pub layers: u32,
    pub format: TargetFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferId {
    NormalAndDepth,
    CombinedDiffuseSpecular,
    Colors,
    Displace,
    /// Glow is rendered into the first scratch target with the scene depth.
    Glow,
    Half1,
    Quarter1,
    Eighth1,
    Shadow,
    Rsm,
}

/// Resolved attachments of a framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pub color: SmallVec<[TargetHandle; 4]>,
    pub depth: Option<TargetHandle>,
    pub width: u32,
    pub height: u32,
}

fn attachments(id: FramebufferId) -> (SmallVec<[RenderTargetId; 4]>, Option<RenderTargetId>) {
    use RenderTargetId as T;
    match id {
        FramebufferId::NormalAndDepth => (smallvec![T::NormalAndDepth], Some(T::DepthStencil)),
        FramebufferId::CombinedDiffuseSpecular => {
            (smallvec![T::Diffuse, T::Specular], Some(T::DepthStencil))
        }
        FramebufferId::Colors => (smallvec![T::Color], Some(T::DepthStencil)),
        FramebufferId::Displace => (smallvec![T::Displace], Some(T::DepthStencil)),
        FramebufferId::Glow => (smallvec![T::Tmp1], Some(T::DepthStencil)),
        FramebufferId::Half1 => (smallvec![T::Half1], None),
        FramebufferId::Quarter1 => (smallvec![T::Quarter1], None),
        FramebufferId::Eighth1 => (smallvec![T::Eighth1], None),
        FramebufferId::Shadow => (smallvec![T::ShadowColor], Some(T::ShadowDepth)),
        FramebufferId::Rsm => (smallvec![T::RsmColor, T::RsmNormal], Some(T::RsmDepth)),
    }
}

/// Targets for one resolution and feature set.
pub fn target_descs(width: u32, height: u32, config: &RenderConfig) -> Vec<TargetDesc> {
    use RenderTargetId as T;
    use TargetFormat as F;

    let target = |id, (w, h): (u32, u32), format| TargetDesc {
        id,
        width: w.max(1),
        height: h.max(1),
        layers: 1,
        format,
    };
    let full = (width, height);
    let half = (width / 2, height / 2);
    let quarter = (width / 4, height / 4);
    let eighth = (width / 8, height / 8);

    let mut descs = vec![
        target(T::DepthStencil, full, F::Depth24Stencil8),
        target(T::Tmp1, full, F::Rgba16Float),
        target(T::Tmp2, full, F::Rgba16Float),
        target(T::Tmp4, full, F::R16Float),
        target(T::LinearDepth, full, F::R32Float),
        target(T::NormalAndDepth, full, F::Rgba16Float),
        target(T::Color, full, F::Rgba16Float),
        target(T::Ssao, full, F::R16Float),
        target(T::Displace, full, F::Rgba16Float),
        target(T::Diffuse, full, F::Rg11b10Float),
        target(T::Specular, full, F::Rg11b10Float),
        target(T::Half1, half, F::Rgba16Float),
        target(T::Half2, half, F::Rgba16Float),
        target(T::Quarter1, quarter, F::Rgba16Float),
        target(T::Quarter2, quarter, F::Rgba16Float),
        target(T::Eighth1, eighth, F::Rgba16Float),
        target(T::Eighth2, eighth, F::Rgba16Float),
    ];

    for level in 0..BLOOM_LEVELS {
        let side = config.shadow_map_size >> level;
        descs.push(target(T::Bloom(level), (side, side), F::Rgba16Float));
    }

    let shadow = (config.shadow_map_size, config.shadow_map_size);
    if config.shadows {
        for (id, format) in [(T::ShadowColor, F::R8), (T::ShadowDepth, F::Depth24Stencil8)] {
            descs.push(TargetDesc {
                layers: SHADOW_CASCADES as u32,
                ..target(id, shadow, format)
            });
        }
    }
    if config.global_illumination {
        descs.push(target(T::RsmColor, shadow, F::Rgba8));
        descs.push(target(T::RsmNormal, shadow, F::Rgba16Float));
        descs.push(target(T::RsmDepth, shadow, F::Depth24Stencil8));
    }
    descs
}

#[derive(Debug, Clone)]
struct Allocated {
    desc: TargetDesc,
    handle: TargetHandle,
}

#[derive(Debug)]
pub struct RenderTargets {
    config: RenderConfig,
    width: u32,
    height: u32,
    targets: HashMap<RenderTargetId, Allocated>,
    generation: u64,
}

impl RenderTargets {
    pub fn new(device: &mut impl RenderDevice, config: &RenderConfig) -> Result<Self, RenderError> {
        let mut targets = Self {
            config: config.clone(),
            width: config.width,
            height: config.height,
            targets: HashMap::new(),
            generation: 0,
        };
        targets.allocate(device)?;
        tracing::debug!(
            width = targets.width,
            height = targets.height,
            count = targets.targets.len(),
            "render targets allocated"
        );
        Ok(targets)
    }

    /// Tear down every target and build the set for the new size.
    pub fn resize(
        &mut self,
        device: &mut impl RenderDevice,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidConfig {
                field: if width == 0 { "width" } else { "height" },
                reason: "must be non-zero",
                value: 0,
            });
        }

        self.release(device);
        self.width = width;
        self.height = height;
        self.generation += 1;
        self.allocate(device)?;
        tracing::info!(
            width,
            height,
            generation = self.generation,
            "render targets rebuilt"
        );
        Ok(())
    }

    /// Destroy every target. Lookups fail until the next resize.
    pub fn release(&mut self, device: &mut impl RenderDevice) {
        for (_, allocated) in self.targets.drain() {
            device.destroy_target(allocated.handle);
        }
    }

    fn allocate(&mut self, device: &mut impl RenderDevice) -> Result<(), RenderError> {
        for desc in target_descs(self.width, self.height, &self.config) {
            match device.create_target(&desc) {
                Ok(handle) => {
                    self.targets.insert(desc.id, Allocated { desc, handle });
                }
                Err(err) => {
                    tracing::error!(id = ?desc.id, %err, "render target allocation failed");
                    self.release(device);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: RenderTargetId) -> Result<TargetHandle, RenderError> {
        self.targets
            .get(&id)
            .map(|a| a.handle)
            .ok_or(RenderError::MissingTarget(id))
    }

    pub fn desc(&self, id: RenderTargetId) -> Option<&TargetDesc> {
        self.targets.get(&id).map(|a| &a.desc)
    }

    pub fn framebuffer(&self, id: FramebufferId) -> Result<Framebuffer, RenderError> {
        let (color_ids, depth_id) = attachments(id);
        let first = color_ids[0];
        let color = color_ids
            .into_iter()
            .map(|id| self.get(id))
            .collect::<Result<SmallVec<_>, _>>()?;
        let depth = depth_id.map(|id| self.get(id)).transpose()?;
        let size = self
            .desc(first)
            .map(|d| (d.width, d.height))
            .ok_or(RenderError::MissingTarget(first))?;
        Ok(Framebuffer {
            color,
            depth,
            width: size.0,
            height: size.1,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bumped by every rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
