//! Recording device for tests and `--render headless` runs.

use std::time::Duration;

use hashbrown::HashMap;

use super::{BufferSlot, PassDesc, PipelineKey, RenderDevice, SubmissionId, TargetHandle};
use crate::command_buffer::{CommandBufferKind, IndirectDraw};
use crate::error::RenderError;
use crate::fence::FenceStatus;
use crate::rtt::TargetDesc;

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    CreateTarget(TargetHandle, TargetDesc),
    DestroyTarget(TargetHandle),
    WriteBuffer { slot: BufferSlot, len: usize },
    BeginPass(PassDesc),
    Draw {
        pipeline: PipelineKey,
        buffer: CommandBufferKind,
        draw: IndirectDraw,
    },
    EndPass,
    Submit(SubmissionId),
}

/// How submissions signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceBehavior {
    /// Signal once polled this many times.
    SignalAfter(u32),
    Never,
    Fail,
}

#[derive(Debug)]
pub struct HeadlessDevice {
    log: Vec<Recorded>,
    buffers: HashMap<BufferSlot, Vec<u8>>,
    live_targets: HashMap<TargetHandle, TargetDesc>,
    next_target: u32,
    next_submission: u64,
    fence: FenceBehavior,
    polls: HashMap<SubmissionId, u32>,
    /// Fail `create_target` from this many creations on.
    fail_after: Option<usize>,
    in_pass: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            buffers: HashMap::new(),
            live_targets: HashMap::new(),
            next_target: 0,
            next_submission: 0,
            fence: FenceBehavior::SignalAfter(0),
            polls: HashMap::new(),
            fail_after: None,
            in_pass: false,
        }
    }

    pub fn with_fence(mut self, fence: FenceBehavior) -> Self {
        self.fence = fence;
        self
    }

    pub fn fail_targets_after(mut self, created: usize) -> Self {
        self.fail_after = Some(created);
        self
    }

    pub fn log(&self) -> &[Recorded] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Last bytes written to a buffer slot.
    pub fn buffer(&self, slot: BufferSlot) -> Option<&[u8]> {
        self.buffers.get(&slot).map(Vec::as_slice)
    }

    pub fn live_targets(&self) -> usize {
        self.live_targets.len()
    }

    pub fn draws(&self) -> impl Iterator<Item = (&PipelineKey, &CommandBufferKind, &IndirectDraw)> {
        self.log.iter().filter_map(|r| match r {
            Recorded::Draw {
                pipeline,
                buffer,
                draw,
            } => Some((pipeline, buffer, draw)),
            _ => None,
        })
    }

    pub fn passes(&self) -> impl Iterator<Item = &PassDesc> {
        self.log.iter().filter_map(|r| match r {
            Recorded::BeginPass(pass) => Some(pass),
            _ => None,
        })
    }

    /// Total polls seen across all submissions.
    pub fn fence_polls(&self) -> u32 {
        self.polls.values().sum()
    }
}

impl RenderDevice for HeadlessDevice {
    fn create_target(&mut self, desc: &TargetDesc) -> Result<TargetHandle, RenderError> {
        if let Some(limit) = self.fail_after
            && self.next_target as usize >= limit
        {
            return Err(RenderError::TargetCreation {
                id: desc.id,
                reason: "headless allocation limit".into(),
            });
        }
        let handle = TargetHandle(self.next_target);
        self.next_target += 1;
        self.live_targets.insert(handle, desc.clone());
        self.log.push(Recorded::CreateTarget(handle, desc.clone()));
        Ok(handle)
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        if self.live_targets.remove(&target).is_none() {
            tracing::warn!(?target, "destroying unknown render target");
        }
        self.log.push(Recorded::DestroyTarget(target));
    }

    fn write_buffer(&mut self, slot: BufferSlot, data: &[u8]) {
        let buffer = self.buffers.entry(slot).or_default();
        buffer.clear();
        buffer.extend_from_slice(data);
        self.log.push(Recorded::WriteBuffer {
            slot,
            len: data.len(),
        });
    }

    fn begin_pass(&mut self, pass: PassDesc) {
        debug_assert!(!self.in_pass, "pass {} opened inside another", pass.label);
        self.in_pass = true;
        self.log.push(Recorded::BeginPass(pass));
    }

    fn draw_indexed_indirect(
        &mut self,
        pipeline: PipelineKey,
        buffer: CommandBufferKind,
        draw: &IndirectDraw,
    ) {
        debug_assert!(self.in_pass, "draw outside a pass");
        self.log.push(Recorded::Draw {
            pipeline,
            buffer,
            draw: *draw,
        });
    }

    fn end_pass(&mut self) {
        self.in_pass = false;
        self.log.push(Recorded::EndPass);
    }

    fn submit(&mut self) -> SubmissionId {
        let id = SubmissionId(self.next_submission);
        self.next_submission += 1;
        self.log.push(Recorded::Submit(id));
        id
    }

    fn poll_fence(&mut self, submission: SubmissionId, _timeout: Duration) -> FenceStatus {
        let polls = self.polls.entry(submission).or_default();
        *polls += 1;
        match self.fence {
            FenceBehavior::SignalAfter(n) if *polls > n => FenceStatus::Signaled,
            FenceBehavior::SignalAfter(_) | FenceBehavior::Never => FenceStatus::Pending,
            FenceBehavior::Fail => FenceStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtt::{RenderTargetId, TargetFormat};

    fn desc() -> TargetDesc {
        TargetDesc {
            id: RenderTargetId::Color,
            width: 4,
            height: 4,
            layers: 1,
            format: TargetFormat::Rgba16Float,
        }
    }

    #[test]
    fn test_signal_after_counts_polls() {
        let mut device = HeadlessDevice::new().with_fence(FenceBehavior::SignalAfter(2));
        let id = device.submit();
        assert_eq!(device.poll_fence(id, Duration::ZERO), FenceStatus::Pending);
        assert_eq!(device.poll_fence(id, Duration::ZERO), FenceStatus::Pending);
        assert_eq!(device.poll_fence(id, Duration::ZERO), FenceStatus::Signaled);
        assert_eq!(device.fence_polls(), 3);
    }

    #[test]
    fn test_targets_tracked_until_destroyed() {
        let mut device = HeadlessDevice::new();
        let a = device.create_target(&desc()).unwrap();
        let b = device.create_target(&desc()).unwrap();
        assert_ne!(a, b);
        device.destroy_target(a);
        assert_eq!(device.live_targets(), 1);
    }

    #[test]
    fn test_allocation_limit() {
        let mut device = HeadlessDevice::new().fail_targets_after(1);
        assert!(device.create_target(&desc()).is_ok());
        assert!(matches!(
            device.create_target(&desc()),
            Err(RenderError::TargetCreation { .. })
        ));
    }

    #[test]
    fn test_write_replaces_contents() {
        let mut device = HeadlessDevice::new();
        let slot = BufferSlot::Indirect(CommandBufferKind::Solid);
        device.write_buffer(slot, &[1, 2, 3]);
        device.write_buffer(slot, &[4]);
        assert_eq!(device.buffer(slot), Some(&[4u8][..]));
    }
}
