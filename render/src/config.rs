//! Render configuration (render.toml)
//!
//! Missing keys fall back to defaults. The document is validated after
//! parsing so a bad resolution or a zero-sized buffer never reaches the
//! device.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::fence::FenceWaitPolicy;

/// Shadow maps shrink by half per bloom level, so the side must stay
/// divisible by 8.
const MIN_SHADOW_MAP_SIZE: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Four cascaded shadow maps.
    pub shadows: bool,
    /// Reflective shadow map for global illumination.
    pub global_illumination: bool,
    pub glow: bool,
    /// Skinned materials are dropped from every pass when this is off.
    pub hardware_skinning: bool,
    /// Joint matrices available to all skinned meshes in one frame,
    /// including the reserved identity matrix.
    pub max_skinning_bones: u32,
    /// Per-buffer instance capacity.
    pub max_instances: u32,
    /// Per-buffer indirect command capacity.
    pub max_commands: u32,
    pub shadow_map_size: u32,
    pub fence: FenceConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            shadows: true,
            global_illumination: false,
            glow: true,
            hardware_skinning: true,
            max_skinning_bones: 1024,
            max_instances: 10_000,
            max_commands: 10_000,
            shadow_map_size: 1024,
            fence: FenceConfig::default(),
        }
    }
}

/// Previous-frame fence wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FenceConfig {
    /// Timeout handed to each poll.
    pub poll_interval_us: u64,
    /// Total wait before the fence is assumed signaled.
    pub max_wait_ms: u64,
}

impl Default for FenceConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: 1000,
            max_wait_ms: 100,
        }
    }
}

impl FenceConfig {
    pub fn policy(&self) -> FenceWaitPolicy {
        FenceWaitPolicy::new(
            Duration::from_micros(self.poll_interval_us),
            Duration::from_millis(self.max_wait_ms),
        )
    }
}

impl RenderConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, RenderError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let content = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        non_zero("width", self.width.into())?;
        non_zero("height", self.height.into())?;
        non_zero("max_instances", self.max_instances.into())?;
        non_zero("max_commands", self.max_commands.into())?;
        // One slot is the reserved identity matrix.
        if self.max_skinning_bones < 2 {
            return Err(RenderError::InvalidConfig {
                field: "max_skinning_bones",
                reason: "must be at least 2",
                value: self.max_skinning_bones.into(),
            });
        }
        if self.shadow_map_size < MIN_SHADOW_MAP_SIZE || !self.shadow_map_size.is_power_of_two() {
            return Err(RenderError::InvalidConfig {
                field: "shadow_map_size",
                reason: "must be a power of two of at least 64",
                value: self.shadow_map_size.into(),
            });
        }
        non_zero("fence.poll_interval_us", self.fence.poll_interval_us)?;
        if self.fence.max_wait_ms.saturating_mul(1000) < self.fence.poll_interval_us {
            return Err(RenderError::InvalidConfig {
                field: "fence.max_wait_ms",
                reason: "must cover at least one poll interval",
                value: self.fence.max_wait_ms,
            });
        }
        Ok(())
    }
}

fn non_zero(field: &'static str, value: u64) -> Result<(), RenderError> {
    if value == 0 {
        return Err(RenderError::InvalidConfig {
            field,
            reason: "must be greater than zero",
            value,
        });
    }
    Ok(())
}
