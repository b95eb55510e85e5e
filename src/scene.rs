// src/scene.rs
// Render-side scene graph: a node pool with parent/child links.
// Nodes hold plain descriptions (mesh kind, material, light); the renderer turns them into GPU
// work each frame. Slots are recycled through a free list and guarded by a generation counter so
// a stale NodeId never aliases a newer node.

use std::collections::VecDeque;

use glam::{Mat4, Quat, Vec3};

/// Node id (slot index + generation)
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Local transform of a node relative to its parent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Linear RGB colour.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color(pub [f32; 3]);

impl Color {
    pub const WHITE: Color = Color([1.0, 1.0, 1.0]);
    pub const LIGHT_GREY: Color = Color([0.827, 0.827, 0.827]);

    /// `0xRRGGBB`
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xff) as f32 / 255.0;
        let g = ((hex >> 8) & 0xff) as f32 / 255.0;
        let b = (hex & 0xff) as f32 / 255.0;
        Color([r, g, b])
    }
}

/// Geometry a mesh node draws. Box and sphere are unit-sized (the sphere has diameter 1) and
/// take their size from the node scale.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MeshKind {
    Box,
    Sphere,
    /// Flat quad in the local XY plane.
    Quad { width: f32, height: f32 },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Material {
    pub color: Color,
    pub roughness: f32,
    pub metalness: f32,
    pub opacity: f32,
    /// Draw the placement hotspot pattern instead of a flat colour.
    pub hotspot: bool,
    /// Lit by scene lights; unlit materials show `color` as-is.
    pub lit: bool,
}

impl Material {
    pub fn standard(color: Color, roughness: f32, metalness: f32) -> Self {
        Self { color, roughness, metalness, opacity: 1.0, hotspot: false, lit: true }
    }

    pub fn hotspot() -> Self {
        Self {
            color: Color::WHITE,
            roughness: 1.0,
            metalness: 0.0,
            opacity: 1.0,
            hotspot: true,
            lit: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Light {
    Ambient { color: Color, intensity: f32 },
    /// Shines from the node position towards the parent origin.
    Directional { color: Color, intensity: f32, cast_shadow: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh { mesh: MeshKind, material: Material, receive_shadow: bool },
    Light(Light),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// One mesh ready to draw, in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub mesh: MeshKind,
    pub material: Material,
    pub world: Mat4,
}

/// One light in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WorldLight {
    pub light: Light,
    pub world: Mat4,
    /// World-space origin of the node's parent; directional lights aim here.
    pub target: Vec3,
}

impl WorldLight {
    pub fn position(&self) -> Vec3 {
        self.world.transform_point3(Vec3::ZERO)
    }

    /// Unit vector the light travels along. Zero when position and target coincide.
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position()).normalize_or_zero()
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Scene container
pub struct Scene {
    slots: Vec<Slot>,
    free_list: VecDeque<u32>,
    root: NodeId,
    live: usize,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let root_node = Node {
            name: "scene".to_string(),
            kind: NodeKind::Group,
            transform: Transform::IDENTITY,
            visible: true,
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![Slot { generation: 0, node: Some(root_node) }],
            free_list: VecDeque::new(),
            root: NodeId { index: 0, generation: 0 },
            live: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Adds a node under `parent`. Returns `None` when `parent` is not live.
    pub fn add(&mut self, parent: NodeId, name: impl Into<String>, kind: NodeKind, transform: Transform) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        let node = Node {
            name: name.into(),
            kind,
            transform,
            visible: true,
            parent: Some(parent),
            children: Vec::new(),
        };

        let id = match self.free_list.pop_front() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.node = Some(node);
                NodeId { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(node) });
                NodeId { index: (self.slots.len() - 1) as u32, generation: 0 }
            }
        };

        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        self.live += 1;
        Some(id)
    }

    /// Detaches `id` from its parent and removes it together with its subtree. The root cannot be
    /// removed. Returns `false` for stale ids.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.get(id).and_then(|n| n.parent) {
            if let Some(p) = self.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }

        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let slot = &mut self.slots[cur.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                self.free_list.push_back(cur.index);
                self.live -= 1;
            }
        }
        true
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    pub fn transform(&self, id: NodeId) -> Option<Transform> {
        self.get(id).map(|n| n.transform)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> bool {
        match self.get_mut(id) {
            Some(n) => {
                n.transform = transform;
                true
            }
            None => false,
        }
    }

    /// Overwrites translation and rotation, leaving scale alone.
    pub fn set_pose(&mut self, id: NodeId, translation: Vec3, rotation: Quat) -> bool {
        match self.get_mut(id) {
            Some(n) => {
                n.transform.translation = translation;
                n.transform.rotation = rotation;
                true
            }
            None => false,
        }
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> bool {
        match self.get_mut(id) {
            Some(n) => {
                n.visible = visible;
                true
            }
            None => false,
        }
    }

    /// World matrix of a node (product of its ancestors' local matrices).
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.get(id)?;
        let mut world = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = self.get(parent)?;
            world = node.transform.matrix() * world;
        }
        Some(world)
    }

    /// Visible meshes and lights in world space, walking the hierarchy from the root.
    /// Hidden nodes hide their whole subtree.
    pub fn collect(&self) -> (Vec<DrawItem>, Vec<WorldLight>) {
        let mut draws = Vec::new();
        let mut lights = Vec::new();
        let mut stack = vec![(self.root, Mat4::IDENTITY)];

        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform.matrix();
            match &node.kind {
                NodeKind::Group => {}
                NodeKind::Mesh { mesh, material, .. } => draws.push(DrawItem {
                    node: id,
                    mesh: *mesh,
                    material: *material,
                    world,
                }),
                NodeKind::Light(light) => lights.push(WorldLight {
                    light: *light,
                    world,
                    target: parent_world.transform_point3(Vec3::ZERO),
                }),
            }
            for child in &node.children {
                stack.push((*child, world));
            }
        }
        (draws, lights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> NodeKind {
        NodeKind::Mesh {
            mesh: MeshKind::Box,
            material: Material::standard(Color::WHITE, 0.4, 0.3),
            receive_shadow: false,
        }
    }

    #[test]
    fn add_and_remove_detaches_from_parent() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.add(root, "anchor", NodeKind::Group, Transform::IDENTITY).unwrap();
        let a = scene.add(group, "a", cube(), Transform::IDENTITY).unwrap();
        assert_eq!(scene.len(), 3);
        assert_eq!(scene.get(group).unwrap().children(), &[a]);

        assert!(scene.remove(a));
        assert!(!scene.contains(a));
        assert!(scene.get(group).unwrap().children().is_empty());
        assert!(!scene.remove(a));
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn removing_a_group_removes_its_subtree() {
        let mut scene = Scene::new();
        let group = scene.add(scene.root(), "lights", NodeKind::Group, Transform::IDENTITY).unwrap();
        let child = scene.add(group, "c", cube(), Transform::IDENTITY).unwrap();
        assert!(scene.remove(group));
        assert!(!scene.contains(child));
        assert_eq!(scene.len(), 1);
        assert!(!scene.remove(scene.root()));
    }

    #[test]
    fn stale_ids_do_not_alias_recycled_slots() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.add(root, "a", cube(), Transform::IDENTITY).unwrap();
        scene.remove(a);
        let b = scene.add(root, "b", cube(), Transform::IDENTITY).unwrap();
        assert_ne!(a, b);
        assert!(scene.get(a).is_none());
        assert_eq!(scene.get(b).unwrap().name, "b");
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let anchor = scene
            .add(scene.root(), "anchor", NodeKind::Group, Transform::from_translation(Vec3::new(0.0, 0.0, -7.0)))
            .unwrap();
        let body = scene
            .add(anchor, "box", cube(), Transform::from_translation(Vec3::new(1.0, 2.0, 0.0)))
            .unwrap();
        let world = scene.world_matrix(body).unwrap();
        let origin = world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 2.0, -7.0)).length() < 1e-6);
    }

    #[test]
    fn collect_skips_hidden_subtrees() {
        let mut scene = Scene::new();
        let group = scene.add(scene.root(), "g", NodeKind::Group, Transform::IDENTITY).unwrap();
        scene.add(group, "a", cube(), Transform::IDENTITY).unwrap();
        scene
            .add(scene.root(), "sun", NodeKind::Light(Light::Ambient { color: Color::WHITE, intensity: 1.0 }), Transform::IDENTITY)
            .unwrap();

        let (draws, lights) = scene.collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(lights.len(), 1);

        scene.set_visible(group, false);
        let (draws, _) = scene.collect();
        assert!(draws.is_empty());
    }

    #[test]
    fn directional_light_aims_at_parent_origin() {
        let mut scene = Scene::new();
        let anchor = scene
            .add(scene.root(), "anchor", NodeKind::Group, Transform::from_translation(Vec3::new(0.0, 0.0, -7.0)))
            .unwrap();
        let sun = Light::Directional { color: Color::WHITE, intensity: 0.9, cast_shadow: true };
        scene
            .add(anchor, "sun", NodeKind::Light(sun), Transform::from_translation(Vec3::new(0.0, 8.0, 0.0)))
            .unwrap();

        let (_, lights) = scene.collect();
        assert!((lights[0].target - Vec3::new(0.0, 0.0, -7.0)).length() < 1e-6);
        assert!((lights[0].direction() - Vec3::NEG_Y).length() < 1e-6);
    }

    #[test]
    fn hex_colors_unpack() {
        assert_eq!(Color::from_hex(0xff0000), Color([1.0, 0.0, 0.0]));
        assert_eq!(Color::from_hex(0x0000ff), Color([0.0, 0.0, 1.0]));
    }
}
