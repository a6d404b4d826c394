//! Scene and cameras built from world state for `--render`.
//!
//! There are no assets in a headless run: every kart shares one mesh
//! range, the track is one splatted slab, projectiles share another mesh.
//! The point is to feed the render scheduler realistic node counts and
//! transforms.

use glam::{Mat4, Quat, Vec3};
use racekit_core::World;
use racekit_render::{
    Aabb, CameraSet, Frustum, MaterialType, MeshId, MeshNode, MeshPart, Renderable, Scene,
    SceneNode, SHADOW_CASCADES,
};

const TRACK_MESH: MeshId = MeshId(0);
const KART_MESH: MeshId = MeshId(1);
const PROJECTILE_MESH: MeshId = MeshId(2);

const KART_JOINTS: u32 = 16;
const SHIELD_GLOW: [u8; 4] = [80, 160, 255, 255];

pub fn build_scene(world: &World) -> Scene {
    let mut scene = Scene::new();

    let (center, extents) = track_box(world);
    let track = MeshNode::new(vec![
        MeshPart::solid(TRACK_MESH, MaterialType::Solid, 6),
        MeshPart::solid(TRACK_MESH, MaterialType::Splatting, 6).with_range(6, 4),
    ]);
    scene.add(SceneNode::new(
        "track",
        Renderable::Mesh(track),
        Aabb::from_center_extents(center, extents),
    ));

    let kart_bounds = Aabb::from_center_extents(Vec3::new(0.0, 0.5, 0.0), Vec3::new(0.8, 0.5, 1.2));
    for kart in world.karts() {
        if kart.eliminated {
            continue;
        }
        let mut mesh = MeshNode::new(vec![
            MeshPart::solid(KART_MESH, MaterialType::SkinnedSolid, 36).with_hue(
                kart.id.index() as f32 / world.karts().len() as f32,
                1.0,
            ),
        ]);
        if kart.is_shielded() {
            mesh = mesh.glowing(SHIELD_GLOW);
        }
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::splat(kart.visual_scale()),
            Quat::from_rotation_y(kart.yaw()),
            kart.position,
        );
        scene.add(
            SceneNode::new(
                kart.name.clone(),
                Renderable::Skinned {
                    mesh,
                    joints: KART_JOINTS,
                },
                kart_bounds,
            )
            .with_transform(transform),
        );
    }

    let projectile_bounds = Aabb::from_center_extents(Vec3::ZERO, Vec3::splat(0.3));
    for (_, projectile) in world.items().projectiles() {
        let mesh = MeshNode::new(vec![MeshPart::solid(PROJECTILE_MESH, MaterialType::Solid, 24)]);
        scene.add(
            SceneNode::new("projectile", Renderable::Mesh(mesh), projectile_bounds)
                .with_transform(Mat4::from_translation(projectile.position)),
        );
    }

    let explosion_bounds = Aabb::from_center_extents(Vec3::ZERO, Vec3::splat(2.0));
    for (_, explosion) in world.items().explosions() {
        scene.add(
            SceneNode::new("explosion", Renderable::Particles, explosion_bounds)
                .with_transform(Mat4::from_translation(explosion.position)),
        );
    }

    scene
}

/// Overhead main camera with four nested sun cascades and the RSM on the
/// widest one.
pub fn cameras(world: &World, aspect: f32) -> CameraSet {
    let (center, extents) = track_box(world);
    let radius = extents.x.max(extents.z);

    let proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.5, 4.0 * radius + 100.0);
    let eye = center + Vec3::new(0.0, 1.5 * radius + 20.0, -0.5 * radius);
    let main = Frustum::from_view_projection(&(proj * Mat4::look_at_rh(eye, center, Vec3::Y)));

    let sun = Vec3::new(-0.4, -1.0, 0.3).normalize();
    let sun_view = Mat4::look_at_rh(center - sun * 2.0 * radius, center, Vec3::Y);
    let cascades: [Frustum; SHADOW_CASCADES] = std::array::from_fn(|i| {
        let half = radius * 0.25 * (1 << i) as f32;
        let proj = Mat4::orthographic_rh(-half, half, -half, half, 0.1, 4.0 * radius);
        Frustum::from_view_projection(&(proj * sun_view))
    });

    CameraSet {
        main,
        shadow_cascades: Some(cascades),
        rsm: Some(cascades[SHADOW_CASCADES - 1]),
        reflection: None,
    }
}

/// Center and half extents of the area karts race in.
fn track_box(world: &World) -> (Vec3, Vec3) {
    let (mut min, mut max) = (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN));
    let step = (world.track().length() / 64.0).max(1.0);
    let mut distance = 0.0;
    while distance < world.track().length() {
        let (point, _) = world.track().transform_at(distance, 0.0);
        min = min.min(point);
        max = max.max(point);
        distance += step;
    }
    let margin = Vec3::new(world.track().half_width(), 2.0, world.track().half_width());
    ((min + max) * 0.5, (max - min) * 0.5 + margin)
}
