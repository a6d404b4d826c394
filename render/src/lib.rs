//! racekit render - frame scheduling
//!
//! Turns a scene graph into batched GPU work: per-camera culling, instanced
//! indirect command buffers per material and pass, render targets, and the
//! fence that keeps buffer fills from racing the previous frame.
//!
//! # Architecture
//!
//! - [`FrameRenderer`] - Owns the command buffers and drives one frame
//! - [`DrawCalls`] - Scene traversal into per-material buckets
//! - [`RenderTargets`] - Sole owner of render targets and framebuffers
//! - [`RenderDevice`] - GPU seam, with [`WgpuDevice`] and [`HeadlessDevice`]

pub mod command_buffer;
pub mod config;
pub mod culling;
pub mod device;
pub mod draw_calls;
pub mod error;
pub mod fence;
pub mod instance;
pub mod material;
pub mod renderer;
pub mod rtt;
pub mod scene;

pub use config::{FenceConfig, RenderConfig};
pub use culling::{Aabb, CameraMask, CameraSet, Frustum, SHADOW_CASCADES};
pub use device::{HeadlessDevice, RenderDevice, WgpuDevice};
pub use draw_calls::{DrawCalls, PassSettings};
pub use error::RenderError;
pub use fence::{FenceOutcome, FenceStatus, FenceWaitPolicy};
pub use material::{MaterialType, MeshPass, TransparentKind};
pub use renderer::{FrameRenderer, FrameStats};
pub use rtt::{RenderTargetId, RenderTargets};
pub use scene::{MeshId, MeshNode, MeshPart, NodeId, Renderable, Scene, SceneNode};
