//! GPU device seam.
//!
//! The frame renderer only talks to [`RenderDevice`]: it allocates render
//! targets, uploads the per-frame buffers, records passes of indirect draws
//! and polls submission fences. [`WgpuDevice`] drives a real adapter;
//! [`HeadlessDevice`] records every call so passes can be checked without
//! a GPU.

mod headless;
mod wgpu_device;

use std::time::Duration;

use smallvec::SmallVec;

pub use headless::{FenceBehavior, HeadlessDevice, Recorded};
pub use wgpu_device::{GeometryUpload, WgpuDevice};

use crate::command_buffer::{CommandBufferKind, IndirectDraw};
use crate::error::RenderError;
use crate::fence::FenceStatus;
use crate::instance::InstanceKind;
use crate::material::MaterialType;
use crate::rtt::TargetDesc;

/// Device-side render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub u32);

/// One `submit` call; fences are polled per submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

/// Per-frame GPU buffers the renderer rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    Indirect(CommandBufferKind),
    Instances(InstanceKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    SolidFirst,
    SolidSecond,
    Shadow,
    Rsm,
    Glow,
}

/// Selects the pipeline for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub pass: PassKind,
    /// `None` for passes with a single shader (glow).
    pub material: Option<MaterialType>,
    pub backface_culling: bool,
}

/// Attachments and load behaviour of one render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDesc {
    pub label: &'static str,
    pub color: SmallVec<[TargetHandle; 4]>,
    pub depth: Option<TargetHandle>,
    pub clear_color: bool,
    pub clear_depth: bool,
    /// Array layer for layered targets (shadow cascades).
    pub layer: Option<u32>,
}

pub trait RenderDevice {
    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle, RenderError>;

    fn destroy_target(&mut self, target: TargetHandle);

    /// Replace the contents of a per-frame buffer, growing it if needed.
    fn write_buffer(&mut self, slot: BufferSlot, data: &[u8]);

    fn begin_pass(&mut self, pass: PassDesc);

    /// Issue one indirect draw from `buffer` inside the open pass.
    fn draw_indexed_indirect(
        &mut self,
        pipeline: PipelineKey,
        buffer: CommandBufferKind,
        draw: &IndirectDraw,
    );

    fn end_pass(&mut self);

    fn submit(&mut self) -> SubmissionId;

    /// Check a submission, blocking for at most `timeout`.
    fn poll_fence(&mut self, submission: SubmissionId, timeout: Duration) -> FenceStatus;
}
