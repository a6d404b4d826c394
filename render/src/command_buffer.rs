//! Indirect command buffers filled from the traversal buckets.
//!
//! Each buffer turns its buckets into one `DrawIndexedIndirect` per mesh
//! plus a contiguous run of instance records, and remembers which command
//! range belongs to which material slot. The draw passes then walk those
//! ranges in material order. Buffers are rebuilt from scratch every frame.

use std::ops::Range;

use smallvec::SmallVec;

use crate::culling::SHADOW_CASCADES;
use crate::draw_calls::{MeshBucket, shadow_slot};
use crate::instance::{
    DrawIndexedIndirect, InstanceData, InstanceFourTex, InstanceGlow, InstanceKind,
    InstanceSingleTex, InstanceThreeTex,
};
use crate::material::MaterialType;
use crate::scene::MeshId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferKind {
    Solid,
    Shadow,
    Rsm,
    Glow,
}

impl CommandBufferKind {
    pub const ALL: [CommandBufferKind; 4] = [
        CommandBufferKind::Solid,
        CommandBufferKind::Shadow,
        CommandBufferKind::Rsm,
        CommandBufferKind::Glow,
    ];
}

/// Per-command state the indirect record cannot carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawBatch {
    pub mesh: MeshId,
    pub instances: InstanceKind,
    pub backface_culling: bool,
}

/// One indirect draw, ready for the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectDraw {
    /// Byte offset into the indirect buffer.
    pub offset: u64,
    pub batch: DrawBatch,
}

#[derive(Debug)]
pub struct CommandList {
    commands: Vec<DrawIndexedIndirect>,
    batches: Vec<DrawBatch>,
    ranges: Vec<Range<usize>>,
    poly_count: u32,
    dropped_instances: u32,
    max_commands: usize,
    max_instances: usize,
}

impl CommandList {
    fn new(slots: usize, max_commands: u32, max_instances: u32) -> Self {
        Self {
            commands: Vec::new(),
            batches: Vec::new(),
            ranges: vec![0..0; slots],
            poly_count: 0,
            dropped_instances: 0,
            max_commands: max_commands as usize,
            max_instances: max_instances as usize,
        }
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.batches.clear();
        self.ranges.iter_mut().for_each(|r| *r = 0..0);
        self.poly_count = 0;
        self.dropped_instances = 0;
    }

    /// Append one slot's meshes. Meshes that would overflow either buffer
    /// are dropped and counted.
    fn fill_slot<T: InstanceData>(
        &mut self,
        slot: usize,
        bucket: &MeshBucket,
        instances: &mut Vec<T>,
        kind: InstanceKind,
    ) {
        let start = self.commands.len();
        let mut lists: Vec<_> = bucket.iter().collect();
        // Stable command order from frame to frame.
        lists.sort_unstable_by_key(|(key, _)| **key);

        for (_, list) in lists {
            let count = list.instances.len();
            if self.commands.len() >= self.max_commands
                || instances.len() + count > self.max_instances
            {
                self.dropped_instances += count as u32;
                continue;
            }

            let first_instance = instances.len() as u32;
            instances.extend(list.instances.iter().map(|s| T::fill(&list.part, s)));

            self.commands.push(DrawIndexedIndirect {
                index_count: list.part.index_count,
                instance_count: count as u32,
                first_index: list.part.first_index,
                base_vertex: list.part.base_vertex,
                first_instance,
            });
            self.batches.push(DrawBatch {
                mesh: list.part.mesh,
                instances: kind,
                backface_culling: list.part.backface_culling,
            });
            self.poly_count += count as u32 * list.part.triangles();
        }

        self.ranges[slot] = start..self.commands.len();
    }

    /// Draws recorded for one material slot.
    pub fn draws(&self, slot: usize) -> impl Iterator<Item = IndirectDraw> + '_ {
        let range = self.ranges.get(slot).cloned().unwrap_or(0..0);
        range.map(move |i| IndirectDraw {
            offset: i as u64 * DrawIndexedIndirect::SIZE,
            batch: self.batches[i],
        })
    }

    pub fn commands(&self) -> &[DrawIndexedIndirect] {
        &self.commands
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.commands)
    }

    pub fn poly_count(&self) -> u32 {
        self.poly_count
    }

    pub fn dropped_instances(&self) -> u32 {
        self.dropped_instances
    }

    fn report_overflow(&self, kind: CommandBufferKind) {
        if self.dropped_instances > 0 {
            tracing::error!(
                buffer = ?kind,
                dropped = self.dropped_instances,
                max_instances = self.max_instances,
                max_commands = self.max_commands,
                "command buffer full, instances dropped"
            );
        }
    }
}

/// Common view used for uploads and stats.
pub trait CommandBuffer: Send {
    fn kind(&self) -> CommandBufferKind;

    fn list(&self) -> &CommandList;

    /// Instance bytes per GPU instance buffer.
    fn instance_uploads(&self) -> SmallVec<[(InstanceKind, &[u8]); 2]>;

    fn poly_count(&self) -> u32 {
        self.list().poly_count()
    }
}

/// Solid first and second pass. Materials with four textures use the
/// wider instance layout.
#[derive(Debug)]
pub struct SolidCommandBuffer {
    list: CommandList,
    three_tex: Vec<InstanceThreeTex>,
    four_tex: Vec<InstanceFourTex>,
}

impl SolidCommandBuffer {
    pub fn new(max_commands: u32, max_instances: u32) -> Self {
        Self {
            list: CommandList::new(MaterialType::COUNT, max_commands, max_instances),
            three_tex: Vec::new(),
            four_tex: Vec::new(),
        }
    }

    pub fn fill(&mut self, buckets: &[MeshBucket]) {
        self.list.clear();
        self.three_tex.clear();
        self.four_tex.clear();

        let instanced = MaterialType::ALL
            .into_iter()
            .filter(|m| *m != MaterialType::Splatting);
        for material in instanced.clone().filter(|m| !m.uses_four_textures()) {
            self.list.fill_slot(
                material.index(),
                &buckets[material.index()],
                &mut self.three_tex,
                InstanceKind::ThreeTex,
            );
        }
        for material in instanced.filter(|m| m.uses_four_textures()) {
            self.list.fill_slot(
                material.index(),
                &buckets[material.index()],
                &mut self.four_tex,
                InstanceKind::FourTex,
            );
        }
        self.list.report_overflow(CommandBufferKind::Solid);
    }

    pub fn draws(&self, material: MaterialType) -> impl Iterator<Item = IndirectDraw> + '_ {
        self.list.draws(material.index())
    }
}

impl CommandBuffer for SolidCommandBuffer {
    fn kind(&self) -> CommandBufferKind {
        CommandBufferKind::Solid
    }

    fn list(&self) -> &CommandList {
        &self.list
    }

    fn instance_uploads(&self) -> SmallVec<[(InstanceKind, &[u8]); 2]> {
        smallvec::smallvec![
            (InstanceKind::ThreeTex, bytemuck::cast_slice(&self.three_tex)),
            (InstanceKind::FourTex, bytemuck::cast_slice(&self.four_tex)),
        ]
    }
}

/// All four cascades in one buffer, slot `cascade * COUNT + material`.
#[derive(Debug)]
pub struct ShadowCommandBuffer {
    list: CommandList,
    instances: Vec<InstanceSingleTex>,
}

impl ShadowCommandBuffer {
    pub fn new(max_commands: u32, max_instances: u32) -> Self {
        Self {
            list: CommandList::new(
                SHADOW_CASCADES * MaterialType::COUNT,
                max_commands,
                max_instances,
            ),
            instances: Vec::new(),
        }
    }

    pub fn fill(&mut self, buckets: &[MeshBucket]) {
        self.list.clear();
        self.instances.clear();
        for cascade in 0..SHADOW_CASCADES {
            for material in MaterialType::ALL {
                let slot = shadow_slot(cascade, material);
                self.list
                    .fill_slot(slot, &buckets[slot], &mut self.instances, InstanceKind::Shadow);
            }
        }
        self.list.report_overflow(CommandBufferKind::Shadow);
    }

    pub fn draws(
        &self,
        cascade: usize,
        material: MaterialType,
    ) -> impl Iterator<Item = IndirectDraw> + '_ {
        self.list.draws(shadow_slot(cascade, material))
    }
}

impl CommandBuffer for ShadowCommandBuffer {
    fn kind(&self) -> CommandBufferKind {
        CommandBufferKind::Shadow
    }

    fn list(&self) -> &CommandList {
        &self.list
    }

    fn instance_uploads(&self) -> SmallVec<[(InstanceKind, &[u8]); 2]> {
        smallvec::smallvec![(InstanceKind::Shadow, bytemuck::cast_slice(&self.instances))]
    }
}

#[derive(Debug)]
pub struct RsmCommandBuffer {
    list: CommandList,
    instances: Vec<InstanceSingleTex>,
}

impl RsmCommandBuffer {
    pub fn new(max_commands: u32, max_instances: u32) -> Self {
        Self {
            list: CommandList::new(MaterialType::COUNT, max_commands, max_instances),
            instances: Vec::new(),
        }
    }

    pub fn fill(&mut self, buckets: &[MeshBucket]) {
        self.list.clear();
        self.instances.clear();
        for material in MaterialType::ALL.into_iter().filter(|m| m.casts_rsm()) {
            self.list.fill_slot(
                material.index(),
                &buckets[material.index()],
                &mut self.instances,
                InstanceKind::Rsm,
            );
        }
        self.list.report_overflow(CommandBufferKind::Rsm);
    }

    pub fn draws(&self, material: MaterialType) -> impl Iterator<Item = IndirectDraw> + '_ {
        self.list.draws(material.index())
    }
}

impl CommandBuffer for RsmCommandBuffer {
    fn kind(&self) -> CommandBufferKind {
        CommandBufferKind::Rsm
    }

    fn list(&self) -> &CommandList {
        &self.list
    }

    fn instance_uploads(&self) -> SmallVec<[(InstanceKind, &[u8]); 2]> {
        smallvec::smallvec![(InstanceKind::Rsm, bytemuck::cast_slice(&self.instances))]
    }
}

#[derive(Debug)]
pub struct GlowCommandBuffer {
    list: CommandList,
    instances: Vec<InstanceGlow>,
}

impl GlowCommandBuffer {
    pub fn new(max_commands: u32, max_instances: u32) -> Self {
        Self {
            list: CommandList::new(1, max_commands, max_instances),
            instances: Vec::new(),
        }
    }

    pub fn fill(&mut self, bucket: &MeshBucket) {
        self.list.clear();
        self.instances.clear();
        self.list
            .fill_slot(0, bucket, &mut self.instances, InstanceKind::Glow);
        self.list.report_overflow(CommandBufferKind::Glow);
    }

    pub fn draws(&self) -> impl Iterator<Item = IndirectDraw> + '_ {
        self.list.draws(0)
    }
}

impl CommandBuffer for GlowCommandBuffer {
    fn kind(&self) -> CommandBufferKind {
        CommandBufferKind::Glow
    }

    fn list(&self) -> &CommandList {
        &self.list
    }

    fn instance_uploads(&self) -> SmallVec<[(InstanceKind, &[u8]); 2]> {
        smallvec::smallvec![(InstanceKind::Glow, bytemuck::cast_slice(&self.instances))]
    }
}
