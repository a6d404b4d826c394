//! wgpu implementation of [`RenderDevice`].
//!
//! Passes are recorded while the renderer walks its command buffers and
//! encoded in one command encoder at submit, so the renderer never holds a
//! `wgpu::RenderPass` across calls. Draws whose pipeline has not been
//! registered are skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hashbrown::HashMap;
use smallvec::SmallVec;

use super::{BufferSlot, PassDesc, PipelineKey, RenderDevice, SubmissionId, TargetHandle};
use crate::command_buffer::{CommandBufferKind, IndirectDraw};
use crate::error::RenderError;
use crate::fence::FenceStatus;
use crate::rtt::{TargetDesc, TargetFormat};

/// Initial size of a per-frame buffer (64KB).
const INITIAL_BUFFER_SIZE: u64 = 64 * 1024;

const BUFFER_GROWTH_FACTOR: u64 = 2;

/// Buffer rewritten from scratch every frame.
///
/// Growth replaces the buffer without copying: nothing written in an
/// earlier frame is read again.
struct FrameBuffer {
    buffer: wgpu::Buffer,
    usage: wgpu::BufferUsages,
    capacity: u64,
    label: String,
}

impl FrameBuffer {
    fn new(device: &wgpu::Device, usage: wgpu::BufferUsages, label: String) -> Self {
        let buffer = create_buffer(device, usage, INITIAL_BUFFER_SIZE, &label);
        Self {
            buffer,
            usage,
            capacity: INITIAL_BUFFER_SIZE,
            label,
        }
    }

    fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[u8]) {
        // COPY_BUFFER_ALIGNMENT
        let required = (data.len() as u64 + 3) & !3;
        if required > self.capacity {
            let mut capacity = self.capacity * BUFFER_GROWTH_FACTOR;
            while capacity < required {
                capacity *= BUFFER_GROWTH_FACTOR;
            }
            tracing::debug!(
                label = %self.label,
                from = self.capacity,
                to = capacity,
                "growing frame buffer"
            );
            self.buffer = create_buffer(device, self.usage, capacity, &self.label);
            self.capacity = capacity;
        }

        if data.len() % 4 == 0 {
            queue.write_buffer(&self.buffer, 0, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(required as usize, 0);
            queue.write_buffer(&self.buffer, 0, &padded);
        }
    }
}

fn create_buffer(
    device: &wgpu::Device,
    usage: wgpu::BufferUsages,
    size: u64,
    label: &str,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Shared vertex and index pool that every `MeshId` ranges into.
pub struct GeometryUpload<'a> {
    pub vertices: &'a [u8],
    pub indices: &'a [u32],
}

struct Geometry {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
}

struct GpuTarget {
    _texture: wgpu::Texture,
    /// Whole texture, then one view per array layer for layered targets.
    views: SmallVec<[wgpu::TextureView; 1]>,
}

impl GpuTarget {
    fn view(&self, layer: Option<u32>) -> Option<&wgpu::TextureView> {
        match layer {
            Some(layer) if self.views.len() > 1 => self.views.get(layer as usize + 1),
            _ => self.views.first(),
        }
    }
}

struct RecordedDraw {
    pipeline: PipelineKey,
    buffer: CommandBufferKind,
    draw: IndirectDraw,
}

struct RecordedPass {
    desc: PassDesc,
    draws: Vec<RecordedDraw>,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    first_instance_supported: bool,
    targets: HashMap<TargetHandle, GpuTarget>,
    next_target: u32,
    buffers: HashMap<BufferSlot, FrameBuffer>,
    geometry: Option<Geometry>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    passes: Vec<RecordedPass>,
    open: Option<RecordedPass>,
    submissions: HashMap<SubmissionId, Arc<AtomicBool>>,
    next_submission: u64,
}

impl WgpuDevice {
    /// Open an adapter without a surface.
    pub async fn new() -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        tracing::info!("Using GPU adapter: {:?}", adapter.get_info().name);

        // Indirect draws start at a non-zero instance for every mesh after
        // the first in a buffer.
        let first_instance = wgpu::Features::INDIRECT_FIRST_INSTANCE;
        let first_instance_supported = adapter.features().contains(first_instance);
        if !first_instance_supported {
            tracing::warn!("adapter lacks INDIRECT_FIRST_INSTANCE, instanced draws will be wrong");
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("racekit device"),
                required_features: adapter.features() & first_instance,
                required_limits: wgpu::Limits::default(),
                experimental_features: Default::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self {
            device,
            queue,
            first_instance_supported,
            targets: HashMap::new(),
            next_target: 0,
            buffers: HashMap::new(),
            geometry: None,
            pipelines: HashMap::new(),
            passes: Vec::new(),
            open: None,
            submissions: HashMap::new(),
            next_submission: 0,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn supports_first_instance(&self) -> bool {
        self.first_instance_supported
    }

    /// Upload the shared vertex/index pool.
    pub fn set_geometry(&mut self, geometry: GeometryUpload<'_>) {
        use wgpu::util::DeviceExt;

        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh vertices"),
                contents: geometry.vertices,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let indices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh indices"),
                contents: bytemuck::cast_slice(geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.geometry = Some(Geometry { vertices, indices });
    }

    pub fn register_pipeline(&mut self, key: PipelineKey, pipeline: wgpu::RenderPipeline) {
        self.pipelines.insert(key, pipeline);
    }

    fn encode_pass(&self, encoder: &mut wgpu::CommandEncoder, pass: &RecordedPass) {
        let load_color = if pass.desc.clear_color {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };
        let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment<'_>>; 4]> = pass
            .desc
            .color
            .iter()
            .filter_map(|handle| self.targets.get(handle)?.view(pass.desc.layer))
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: load_color,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let depth_stencil_attachment = pass
            .desc
            .depth
            .and_then(|handle| self.targets.get(&handle)?.view(pass.desc.layer))
            .map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: if pass.desc.clear_depth {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: if pass.desc.clear_depth {
                        wgpu::LoadOp::Clear(0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
            });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.desc.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some(geometry) = &self.geometry else {
            if !pass.draws.is_empty() {
                tracing::warn!(pass = pass.desc.label, "no geometry uploaded, draws skipped");
            }
            return;
        };
        render_pass.set_vertex_buffer(0, geometry.vertices.slice(..));
        render_pass.set_index_buffer(geometry.indices.slice(..), wgpu::IndexFormat::Uint32);

        let mut skipped = 0u32;
        for recorded in &pass.draws {
            let indirect = self.buffers.get(&BufferSlot::Indirect(recorded.buffer));
            let instances = self
                .buffers
                .get(&BufferSlot::Instances(recorded.draw.batch.instances));
            let (Some(pipeline), Some(indirect), Some(instances)) =
                (self.pipelines.get(&recorded.pipeline), indirect, instances)
            else {
                skipped += 1;
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_vertex_buffer(1, instances.buffer.slice(..));
            render_pass.draw_indexed_indirect(&indirect.buffer, recorded.draw.offset);
        }
        if skipped > 0 {
            tracing::trace!(pass = pass.desc.label, skipped, "draws without pipeline skipped");
        }
    }
}

fn texture_format(format: TargetFormat) -> wgpu::TextureFormat {
    match format {
        TargetFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TargetFormat::Rg11b10Float => wgpu::TextureFormat::Rg11b10Ufloat,
        TargetFormat::R16Float => wgpu::TextureFormat::R16Float,
        TargetFormat::R32Float => wgpu::TextureFormat::R32Float,
        TargetFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TargetFormat::R8 => wgpu::TextureFormat::R8Unorm,
        TargetFormat::Depth24Stencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
    }
}

fn buffer_usage(slot: BufferSlot) -> wgpu::BufferUsages {
    match slot {
        BufferSlot::Indirect(_) => wgpu::BufferUsages::INDIRECT,
        BufferSlot::Instances(_) => wgpu::BufferUsages::VERTEX,
    }
}

impl RenderDevice for WgpuDevice {
    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle, RenderError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if desc.width > limit || desc.height > limit {
            return Err(RenderError::TargetCreation {
                id: desc.id,
                reason: format!("{}x{} exceeds device limit {limit}", desc.width, desc.height),
            });
        }

        let label = format!("{:?}", desc.id);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let mut views = SmallVec::new();
        views.push(texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&label),
            dimension: Some(if desc.layers > 1 {
                wgpu::TextureViewDimension::D2Array
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        }));
        if desc.layers > 1 {
            for layer in 0..desc.layers {
                views.push(texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&label),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                }));
            }
        }

        let handle = TargetHandle(self.next_target);
        self.next_target += 1;
        self.targets.insert(
            handle,
            GpuTarget {
                _texture: texture,
                views,
            },
        );
        Ok(handle)
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        // Passes already submitted keep their own references.
        self.targets.remove(&target);
    }

    fn write_buffer(&mut self, slot: BufferSlot, data: &[u8]) {
        let buffer = self
            .buffers
            .entry(slot)
            .or_insert_with(|| FrameBuffer::new(&self.device, buffer_usage(slot), format!("{slot:?}")));
        buffer.write(&self.device, &self.queue, data);
    }

    fn begin_pass(&mut self, pass: PassDesc) {
        if let Some(unclosed) = self.open.take() {
            tracing::warn!(pass = unclosed.desc.label, "pass not ended, closing");
            self.passes.push(unclosed);
        }
        self.open = Some(RecordedPass {
            desc: pass,
            draws: Vec::new(),
        });
    }

    fn draw_indexed_indirect(
        &mut self,
        pipeline: PipelineKey,
        buffer: CommandBufferKind,
        draw: &IndirectDraw,
    ) {
        match &mut self.open {
            Some(pass) => pass.draws.push(RecordedDraw {
                pipeline,
                buffer,
                draw: *draw,
            }),
            None => tracing::warn!(?pipeline, "draw outside a pass ignored"),
        }
    }

    fn end_pass(&mut self) {
        if let Some(pass) = self.open.take() {
            self.passes.push(pass);
        }
    }

    fn submit(&mut self) -> SubmissionId {
        self.end_pass();
        let passes = std::mem::take(&mut self.passes);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            });
        for pass in &passes {
            self.encode_pass(&mut encoder, pass);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        let id = SubmissionId(self.next_submission);
        self.next_submission += 1;
        let done = Arc::new(AtomicBool::new(false));
        let signal = Arc::clone(&done);
        self.queue
            .on_submitted_work_done(move || signal.store(true, Ordering::Release));
        self.submissions.insert(id, done);
        id
    }

    fn poll_fence(&mut self, submission: SubmissionId, timeout: Duration) -> FenceStatus {
        let Some(done) = self.submissions.get(&submission).cloned() else {
            // Already observed, or from before a rebuild.
            return FenceStatus::Signaled;
        };

        if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
            tracing::warn!(%err, "device poll failed");
            return FenceStatus::Failed;
        }
        if !done.load(Ordering::Acquire) && !timeout.is_zero() {
            std::thread::sleep(timeout);
            if let Err(err) = self.device.poll(wgpu::PollType::Poll) {
                tracing::warn!(%err, "device poll failed");
                return FenceStatus::Failed;
            }
        }

        if done.load(Ordering::Acquire) {
            self.submissions.remove(&submission);
            FenceStatus::Signaled
        } else {
            FenceStatus::Pending
        }
    }
}
