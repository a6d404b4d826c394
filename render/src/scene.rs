//! Scene graph consumed by traversal.
//!
//! What a node draws is fixed when the node is built: the [`Renderable`]
//! variant decides how traversal treats it, so there are no type probes
//! per frame.

use glam::{Mat4, Vec2};

use crate::culling::Aabb;
use crate::material::{MaterialType, MeshPass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Geometry range inside the shared vertex/index pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// One material slice of a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshPart {
    pub mesh: MeshId,
    pub pass: MeshPass,
    pub index_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub textures: [u32; 4],
    pub backface_culling: bool,
    pub texture_transform: Vec2,
    pub hue: f32,
    pub colorization: f32,
}

impl MeshPart {
    pub fn solid(mesh: MeshId, material: MaterialType, index_count: u32) -> Self {
        Self::new(mesh, MeshPass::Solid(material), index_count)
    }

    pub fn new(mesh: MeshId, pass: MeshPass, index_count: u32) -> Self {
        Self {
            mesh,
            pass,
            index_count,
            first_index: 0,
            base_vertex: 0,
            textures: [0; 4],
            backface_culling: true,
            texture_transform: Vec2::ZERO,
            hue: 0.0,
            colorization: 0.0,
        }
    }

    pub fn with_range(mut self, first_index: u32, base_vertex: i32) -> Self {
        self.first_index = first_index;
        self.base_vertex = base_vertex;
        self
    }

    pub fn with_textures(mut self, textures: [u32; 4]) -> Self {
        self.textures = textures;
        self
    }

    pub fn double_sided(mut self) -> Self {
        self.backface_culling = false;
        self
    }

    pub fn with_hue(mut self, hue: f32, colorization: f32) -> Self {
        self.hue = hue;
        self.colorization = colorization;
        self
    }

    pub fn triangles(&self) -> u32 {
        self.index_count / 3
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshNode {
    pub parts: Vec<MeshPart>,
    /// RGBA glow colour. Glowing meshes also go to the glow pass.
    pub glow: Option<[u8; 4]>,
    /// Drawn outside the batched passes (debug geometry, overlays).
    pub immediate: bool,
}

impl MeshNode {
    pub fn new(parts: Vec<MeshPart>) -> Self {
        Self {
            parts,
            ..Default::default()
        }
    }

    pub fn glowing(mut self, color: [u8; 4]) -> Self {
        self.glow = Some(color);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    /// Transform-only node.
    Group,
    Mesh(MeshNode),
    /// Mesh animated on the GPU; needs `joints` matrices this frame.
    Skinned { mesh: MeshNode, joints: u32 },
    Particles,
    Billboard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: NodeId,
    pub name: String,
    /// Relative to the parent.
    pub transform: Mat4,
    pub bounds: Aabb,
    pub visible: bool,
    /// Nodes with culling off are always treated as visible.
    pub automatic_culling: bool,
    pub renderable: Renderable,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, renderable: Renderable, bounds: Aabb) -> Self {
        Self {
            id: NodeId(0),
            name: name.into(),
            transform: Mat4::IDENTITY,
            bounds,
            visible: true,
            automatic_culling: true,
            renderable,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn without_culling(mut self) -> Self {
        self.automatic_culling = false;
        self
    }

    fn find_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    fn assign_ids(&mut self, next: &mut u32) {
        self.id = NodeId(*next);
        *next += 1;
        for child in &mut self.children {
            child.assign_ids(next);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    roots: Vec<SceneNode>,
    next_id: u32,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subtree. Ids are assigned depth first; the subtree root's id
    /// is returned.
    pub fn add(&mut self, mut node: SceneNode) -> NodeId {
        node.assign_ids(&mut self.next_id);
        let id = node.id;
        self.roots.push(node);
        id
    }

    pub fn roots(&self) -> &[SceneNode] {
        &self.roots
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.roots.iter_mut().find_map(|n| n.find_mut(id))
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Mat4) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.next_id as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_id == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn group(name: &str) -> SceneNode {
        SceneNode::new(name, Renderable::Group, Aabb::new(Vec3::ZERO, Vec3::ONE))
    }

    #[test]
    fn test_ids_assigned_depth_first() {
        let mut scene = Scene::new();
        let a = scene.add(group("a").with_child(group("a1")).with_child(group("a2")));
        let b = scene.add(group("b"));
        assert_eq!(a, NodeId(0));
        assert_eq!(b, NodeId(3));
        assert_eq!(scene.len(), 4);
        assert_eq!(scene.node_mut(NodeId(2)).unwrap().name, "a2");
    }

    #[test]
    fn test_set_transform() {
        let mut scene = Scene::new();
        let id = scene.add(group("kart"));
        let moved = Mat4::from_translation(Vec3::X);
        assert!(scene.set_transform(id, moved));
        assert_eq!(scene.roots()[0].transform, moved);
        assert!(!scene.set_transform(NodeId(42), moved));
    }

    #[test]
    fn test_part_triangles() {
        let part = MeshPart::solid(MeshId(1), MaterialType::Solid, 36);
        assert_eq!(part.triangles(), 12);
        assert!(part.backface_culling);
        assert!(!part.double_sided().backface_culling);
    }
}
