//! Render error types.
//!
//! Only setup and configuration failures surface here. A slow or lost GPU
//! fence is not an error: the frame carries on as if it had signaled.

use std::path::PathBuf;

use crate::rtt::RenderTargetId;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to read render config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse render config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("render config {field} {reason}, got {value}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
        value: u64,
    },

    #[error("shadow cascade {cascade} out of range (0..{count})")]
    InvalidCascade { cascade: usize, count: usize },

    #[error("render target {0:?} is not allocated")]
    MissingTarget(RenderTargetId),

    #[error("device could not create render target {id:?}: {reason}")]
    TargetCreation { id: RenderTargetId, reason: String },

    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}
