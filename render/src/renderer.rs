//! Frame orchestration.
//!
//! One frame is:
//!
//! 1. [`FrameRenderer::prepare_draw_calls`] traverses the scene, waits for
//!    the previous frame's fence, fills the four command buffers in
//!    parallel and uploads them.
//! 2. The `draw_indirect_*` entry points issue the batched draws of one
//!    pass into whatever pass is open on the device.
//! 3. [`FrameRenderer::end_frame`] submits and keeps the fence for the next
//!    frame.
//!
//! [`FrameRenderer::render_frame`] runs steps 2 and 3 with the standard
//! framebuffer bindings.

use crate::command_buffer::{
    CommandBuffer, CommandBufferKind, GlowCommandBuffer, IndirectDraw, RsmCommandBuffer,
    ShadowCommandBuffer, SolidCommandBuffer,
};
use crate::config::RenderConfig;
use crate::culling::{CameraSet, SHADOW_CASCADES};
use crate::device::{BufferSlot, PassDesc, PassKind, PipelineKey, RenderDevice, SubmissionId};
use crate::draw_calls::{DrawCalls, PassSettings, TraversalStats};
use crate::error::RenderError;
use crate::fence::{FenceOutcome, FenceWaitPolicy};
use crate::material::{
    MaterialType, RSM_PASS_ORDER, SHADOW_PASS_ORDER, SOLID_FIRST_PASS_ORDER,
    SOLID_SECOND_PASS_ORDER,
};
use crate::rtt::{Framebuffer, FramebufferId, RenderTargets};
use crate::scene::Scene;

/// Counters for the last prepared frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub traversal: TraversalStats,
    pub solid_polys: u32,
    pub shadow_polys: u32,
    pub rsm_polys: u32,
    pub glow_polys: u32,
    pub dropped_instances: u32,
    pub joints_used: u32,
    /// `None` when there was no fence to wait on.
    pub fence: Option<FenceOutcome>,
}

#[derive(Debug, Clone, Copy)]
struct PendingFence {
    submission: SubmissionId,
    generation: u64,
}

pub struct FrameRenderer<D: RenderDevice> {
    device: D,
    config: RenderConfig,
    targets: RenderTargets,
    fence_policy: FenceWaitPolicy,
    draw_calls: DrawCalls,
    solid: SolidCommandBuffer,
    shadow: ShadowCommandBuffer,
    rsm: RsmCommandBuffer,
    glow: GlowCommandBuffer,
    pending: Option<PendingFence>,
    rsm_available: bool,
    stats: FrameStats,
}

impl<D: RenderDevice> FrameRenderer<D> {
    pub fn new(mut device: D, config: RenderConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let targets = RenderTargets::new(&mut device, &config)?;
        let (commands, instances) = (config.max_commands, config.max_instances);
        tracing::info!(
            width = config.width,
            height = config.height,
            shadows = config.shadows,
            gi = config.global_illumination,
            glow = config.glow,
            "frame renderer ready"
        );
        Ok(Self {
            device,
            fence_policy: config.fence.policy(),
            targets,
            draw_calls: DrawCalls::new(),
            solid: SolidCommandBuffer::new(commands, instances),
            shadow: ShadowCommandBuffer::new(commands, instances),
            rsm: RsmCommandBuffer::new(commands, instances),
            glow: GlowCommandBuffer::new(commands, instances),
            pending: None,
            rsm_available: false,
            stats: FrameStats::default(),
            config,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn draw_calls(&self) -> &DrawCalls {
        &self.draw_calls
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn rsm_available(&self) -> bool {
        self.rsm_available
    }

    /// The reflective shadow map is rendered again on the next frame
    /// (track change).
    pub fn invalidate_rsm(&mut self) {
        self.rsm_available = false;
    }

    fn pass_settings(&self) -> PassSettings {
        PassSettings {
            shadows: self.config.shadows,
            global_illumination: self.config.global_illumination,
            rsm_available: self.rsm_available,
            hardware_skinning: self.config.hardware_skinning,
            max_skinning_bones: self.config.max_skinning_bones,
        }
    }

    /// Traverse, fill and upload this frame's command buffers.
    pub fn prepare_draw_calls(&mut self, scene: &Scene, cameras: &CameraSet) {
        let settings = self.pass_settings();
        self.draw_calls.prepare(scene, cameras, &settings);

        let fence = self.wait_for_previous_frame();

        let Self {
            draw_calls,
            solid,
            shadow,
            rsm,
            glow,
            ..
        } = self;
        let calls = &*draw_calls;
        rayon::join(
            || {
                rayon::join(
                    || solid.fill(calls.solid_buckets()),
                    || glow.fill(calls.glow_bucket()),
                )
            },
            || {
                rayon::join(
                    || shadow.fill(calls.shadow_buckets()),
                    || rsm.fill(calls.rsm_buckets()),
                )
            },
        );

        let buffers: [&dyn CommandBuffer; 4] = [&self.solid, &self.shadow, &self.rsm, &self.glow];
        for buffer in buffers {
            self.device.write_buffer(
                BufferSlot::Indirect(buffer.kind()),
                buffer.list().bytes(),
            );
            for (kind, bytes) in buffer.instance_uploads() {
                self.device.write_buffer(BufferSlot::Instances(kind), bytes);
            }
        }

        self.stats = FrameStats {
            traversal: self.draw_calls.stats(),
            solid_polys: self.solid.poly_count(),
            shadow_polys: self.shadow.poly_count(),
            rsm_polys: self.rsm.poly_count(),
            glow_polys: self.glow.poly_count(),
            dropped_instances: buffers
                .iter()
                .map(|b| b.list().dropped_instances())
                .sum(),
            joints_used: self.draw_calls.joints_used(),
            fence,
        };
    }

    fn wait_for_previous_frame(&mut self) -> Option<FenceOutcome> {
        let pending = self.pending.take()?;
        if pending.generation != self.targets.generation() {
            tracing::debug!(
                submission = pending.submission.0,
                "fence from before render target rebuild dropped"
            );
            return None;
        }
        let device = &mut self.device;
        let outcome = self
            .fence_policy
            .wait(|timeout| device.poll_fence(pending.submission, timeout));
        if outcome.stalled() {
            tracing::trace!(?outcome, "waited on previous frame");
        }
        Some(outcome)
    }

    fn issue(
        &mut self,
        pass: PassKind,
        material: Option<MaterialType>,
        buffer: CommandBufferKind,
        draw: IndirectDraw,
    ) {
        let pipeline = PipelineKey {
            pass,
            material,
            backface_culling: draw.batch.backface_culling,
        };
        self.device.draw_indexed_indirect(pipeline, buffer, &draw);
    }

    fn skip_material(&self, material: MaterialType) -> bool {
        material.is_skinned() && !self.config.hardware_skinning
    }

    fn draw_solid(&mut self, pass: PassKind, order: &[MaterialType]) {
        for &material in order {
            if self.skip_material(material) {
                continue;
            }
            let draws: Vec<_> = self.solid.draws(material).collect();
            for draw in draws {
                self.issue(pass, Some(material), CommandBufferKind::Solid, draw);
            }
        }
    }

    /// Depth, normals and material ids for the lighting passes.
    pub fn draw_indirect_solid_first_pass(&mut self) {
        self.draw_solid(PassKind::SolidFirst, &SOLID_FIRST_PASS_ORDER);
    }

    /// Shaded colour with the lighting results.
    pub fn draw_indirect_solid_second_pass(&mut self) {
        self.draw_solid(PassKind::SolidSecond, &SOLID_SECOND_PASS_ORDER);
    }

    pub fn draw_indirect_shadows(&mut self, cascade: usize) -> Result<(), RenderError> {
        if cascade >= SHADOW_CASCADES {
            return Err(RenderError::InvalidCascade {
                cascade,
                count: SHADOW_CASCADES,
            });
        }
        if !self.config.shadows {
            return Ok(());
        }
        for material in SHADOW_PASS_ORDER {
            if self.skip_material(material) {
                continue;
            }
            let draws: Vec<_> = self.shadow.draws(cascade, material).collect();
            for draw in draws {
                self.issue(PassKind::Shadow, Some(material), CommandBufferKind::Shadow, draw);
            }
        }
        Ok(())
    }

    /// Render the reflective shadow map. Runs once per track; later calls
    /// do nothing until [`FrameRenderer::invalidate_rsm`].
    pub fn draw_indirect_reflective_shadow_maps(&mut self) {
        if !self.config.global_illumination || self.rsm_available {
            return;
        }
        for material in RSM_PASS_ORDER {
            let draws: Vec<_> = self.rsm.draws(material).collect();
            for draw in draws {
                self.issue(PassKind::Rsm, Some(material), CommandBufferKind::Rsm, draw);
            }
        }
        self.rsm_available = true;
        tracing::debug!("reflective shadow map rendered");
    }

    pub fn draw_indirect_glow(&mut self) {
        if !self.config.glow {
            return;
        }
        let draws: Vec<_> = self.glow.draws().collect();
        for draw in draws {
            self.issue(PassKind::Glow, None, CommandBufferKind::Glow, draw);
        }
    }

    /// Submit recorded passes; the next prepare waits on this submission.
    pub fn end_frame(&mut self) -> SubmissionId {
        let submission = self.device.submit();
        self.pending = Some(PendingFence {
            submission,
            generation: self.targets.generation(),
        });
        submission
    }

    fn begin(
        &mut self,
        label: &'static str,
        id: FramebufferId,
        clear_color: bool,
        clear_depth: bool,
        layer: Option<u32>,
    ) -> Result<(), RenderError> {
        let Framebuffer { color, depth, .. } = self.targets.framebuffer(id)?;
        self.device.begin_pass(PassDesc {
            label,
            color,
            depth,
            clear_color,
            clear_depth,
            layer,
        });
        Ok(())
    }

    /// Every pass of a prepared frame with its framebuffer bound, then
    /// submit.
    pub fn render_frame(&mut self) -> Result<SubmissionId, RenderError> {
        if self.config.shadows {
            for cascade in 0..SHADOW_CASCADES {
                self.begin("shadow", FramebufferId::Shadow, true, true, Some(cascade as u32))?;
                self.draw_indirect_shadows(cascade)?;
                self.device.end_pass();
            }
        }

        if self.config.global_illumination && !self.rsm_available {
            self.begin("rsm", FramebufferId::Rsm, true, true, None)?;
            self.draw_indirect_reflective_shadow_maps();
            self.device.end_pass();
        }

        self.begin("solid first pass", FramebufferId::NormalAndDepth, true, true, None)?;
        self.draw_indirect_solid_first_pass();
        self.device.end_pass();

        self.begin("solid second pass", FramebufferId::Colors, true, false, None)?;
        self.draw_indirect_solid_second_pass();
        self.device.end_pass();

        if self.config.glow {
            self.begin("glow", FramebufferId::Glow, true, false, None)?;
            self.draw_indirect_glow();
            self.device.end_pass();
        }

        Ok(self.end_frame())
    }

    /// Rebuild every render target. The in-flight fence is dropped and the
    /// reflective shadow map is redrawn.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.targets.resize(&mut self.device, width, height)?;
        self.config.width = width;
        self.config.height = height;
        self.pending = None;
        self.rsm_available = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FenceConfig;
    use crate::culling::{Aabb, Frustum};
    use crate::device::{FenceBehavior, HeadlessDevice, Recorded};
    use crate::scene::{MeshId, MeshNode, MeshPart, Renderable, SceneNode};
    use glam::{Mat4, Vec3};

    fn config() -> RenderConfig {
        RenderConfig {
            width: 320,
            height: 240,
            shadows: true,
            global_illumination: true,
            ..RenderConfig::default()
        }
    }

    fn cameras() -> CameraSet {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let main = Frustum::from_view_projection(&(proj * view));
        CameraSet {
            main,
            shadow_cascades: Some([main; SHADOW_CASCADES]),
            rsm: Some(main),
            reflection: None,
        }
    }

    fn scene() -> Scene {
        let bounds = Aabb::from_center_extents(Vec3::ZERO, Vec3::ONE);
        let track = MeshNode::new(vec![
            MeshPart::solid(MeshId(1), MaterialType::Solid, 36),
            MeshPart::solid(MeshId(2), MaterialType::NormalMap, 12),
        ]);
        let kart = MeshNode::new(vec![MeshPart::solid(MeshId(3), MaterialType::SkinnedSolid, 24)])
            .glowing([255, 0, 0, 255]);

        let mut scene = Scene::new();
        scene.add(SceneNode::new("track", Renderable::Mesh(track), bounds));
        scene.add(SceneNode::new(
            "kart",
            Renderable::Skinned {
                mesh: kart,
                joints: 4,
            },
            bounds,
        ));
        scene
    }

    fn renderer(config: RenderConfig) -> FrameRenderer<HeadlessDevice> {
        FrameRenderer::new(HeadlessDevice::new(), config).unwrap()
    }

    fn drawn(renderer: &FrameRenderer<HeadlessDevice>, pass: PassKind) -> Vec<Option<MaterialType>> {
        renderer
            .device()
            .draws()
            .filter(|(key, _, _)| key.pass == pass)
            .map(|(key, _, _)| key.material)
            .collect()
    }

    #[test]
    fn test_prepare_uploads_every_buffer() {
        let mut renderer = renderer(config());
        renderer.prepare_draw_calls(&scene(), &cameras());

        for kind in CommandBufferKind::ALL {
            assert!(
                renderer
                    .device()
                    .log()
                    .contains(&Recorded::WriteBuffer {
                        slot: BufferSlot::Indirect(kind),
                        len: renderer.device().buffer(BufferSlot::Indirect(kind)).unwrap().len(),
                    }),
                "{kind:?} not uploaded"
            );
        }
        let stats = renderer.stats();
        assert_eq!(stats.solid_polys, 12 + 4 + 8);
        assert_eq!(stats.glow_polys, 8);
        assert_eq!(stats.joints_used, 4);
        assert_eq!(stats.fence, None);
    }

    #[test]
    fn test_solid_passes_follow_material_order() {
        let mut renderer = renderer(config());
        renderer.prepare_draw_calls(&scene(), &cameras());
        renderer.device_mut().clear_log();

        renderer.draw_indirect_solid_first_pass();
        renderer.draw_indirect_solid_second_pass();
        let expected = vec![
            Some(MaterialType::Solid),
            Some(MaterialType::NormalMap),
            Some(MaterialType::SkinnedSolid),
        ];
        assert_eq!(drawn(&renderer, PassKind::SolidFirst), expected);
        assert_eq!(drawn(&renderer, PassKind::SolidSecond), expected);
    }

    #[test]
    fn test_skinned_materials_skipped_without_hardware_skinning() {
        let mut renderer = renderer(RenderConfig {
            hardware_skinning: false,
            ..config()
        });
        renderer.prepare_draw_calls(&scene(), &cameras());
        renderer.draw_indirect_solid_first_pass();
        assert!(!drawn(&renderer, PassKind::SolidFirst).contains(&Some(MaterialType::SkinnedSolid)));
        assert_eq!(renderer.stats().joints_used, 0);
    }

    #[test]
    fn test_shadow_cascade_bounds() {
        let mut renderer = renderer(config());
        renderer.prepare_draw_calls(&scene(), &cameras());
        assert!(renderer.draw_indirect_shadows(3).is_ok());
        assert!(matches!(
            renderer.draw_indirect_shadows(4),
            Err(RenderError::InvalidCascade { cascade: 4, count: 4 })
        ));
    }

    #[test]
    fn test_render_frame_binds_each_pass() {
        let mut renderer = renderer(config());
        renderer.prepare_draw_calls(&scene(), &cameras());
        renderer.device_mut().clear_log();
        renderer.render_frame().unwrap();

        let passes: Vec<_> = renderer.device().passes().map(|p| (p.label, p.layer)).collect();
        assert_eq!(
            passes,
            vec![
                ("shadow", Some(0)),
                ("shadow", Some(1)),
                ("shadow", Some(2)),
                ("shadow", Some(3)),
                ("rsm", None),
                ("solid first pass", None),
                ("solid second pass", None),
                ("glow", None),
            ]
        );
        assert_eq!(drawn(&renderer, PassKind::Glow), vec![None]);
        assert!(matches!(renderer.device().log().last(), Some(Recorded::Submit(_))));
    }

    #[test]
    fn test_rsm_rendered_once_per_track() {
        let mut renderer = renderer(config());
        renderer.prepare_draw_calls(&scene(), &cameras());
        renderer.render_frame().unwrap();
        assert!(renderer.rsm_available());
        assert_eq!(drawn(&renderer, PassKind::Rsm).len(), 2);

        renderer.device_mut().clear_log();
        renderer.prepare_draw_calls(&scene(), &cameras());
        assert_eq!(renderer.stats().rsm_polys, 0);
        renderer.render_frame().unwrap();
        assert!(renderer.device().passes().all(|p| p.label != "rsm"));

        renderer.invalidate_rsm();
        renderer.prepare_draw_calls(&scene(), &cameras());
        assert!(renderer.stats().rsm_polys > 0);
    }

    #[test]
    fn test_waits_on_previous_frame() {
        let mut renderer = renderer(config());
        renderer.prepare_draw_calls(&scene(), &cameras());
        renderer.render_frame().unwrap();
        renderer.prepare_draw_calls(&scene(), &cameras());
        assert_eq!(renderer.stats().fence, Some(FenceOutcome::AlreadySignaled));
    }

    #[test]
    fn test_lost_fence_times_out_and_frame_proceeds() {
        let config = RenderConfig {
            fence: FenceConfig {
                poll_interval_us: 10,
                max_wait_ms: 1,
            },
            ..config()
        };
        let device = HeadlessDevice::new().with_fence(FenceBehavior::Never);
        let mut renderer = FrameRenderer::new(device, config).unwrap();
        renderer.prepare_draw_calls(&scene(), &cameras());
        renderer.render_frame().unwrap();
        renderer.prepare_draw_calls(&scene(), &cameras());

        assert_eq!(renderer.stats().fence, Some(FenceOutcome::TimedOut { polls: 100 }));
        assert!(renderer.stats().solid_polys > 0);
    }

    #[test]
    fn test_resize_invalidates_fence() {
        let device = HeadlessDevice::new().with_fence(FenceBehavior::Never);
        let mut renderer = FrameRenderer::new(device, config()).unwrap();
        renderer.prepare_draw_calls(&scene(), &cameras());
        renderer.render_frame().unwrap();

        renderer.resize(640, 480).unwrap();
        assert_eq!(renderer.targets().generation(), 1);
        assert!(!renderer.rsm_available());

        renderer.prepare_draw_calls(&scene(), &cameras());
        assert_eq!(renderer.stats().fence, None);
        assert_eq!(renderer.device().fence_polls(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RenderConfig {
            max_instances: 0,
            ..config()
        };
        assert!(FrameRenderer::new(HeadlessDevice::new(), config).is_err());
    }
}
