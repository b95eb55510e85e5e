// src/composition.rs
//! One-time static content and the factory for falling bodies.
//!
//! Everything placed hangs off the anchor group: the ground (a hotspot quad plus a static plane
//! body), the light group, and every spawned body. Physics runs in anchor-local space, so a
//! rigid body's pose can be written straight onto its node.

use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::body::{ShapeKind, SpawnedBody};
use crate::config::SpawnSettings;
use crate::context::OptionContext;
use crate::error::Result;
use crate::physics::{BodyDesc, BodyHandle, PhysicsWorld};
use crate::scene::{Color, Light, Material, MeshKind, NodeId, NodeKind, Scene, Transform};

/// Size of the visible placement floor.
pub const FLOOR_WIDTH: f32 = 3.3;
pub const FLOOR_DEPTH: f32 = 3.0;

/// Handles to the content built once at startup.
#[derive(Debug, Clone, Copy)]
pub struct StaticContent {
    pub anchor: NodeId,
    pub ground: NodeId,
    pub ground_body: BodyHandle,
    pub lights: NodeId,
}

/// Builds the anchor group, ground pair and lighting.
pub fn compose_static(scene: &mut Scene, physics: &mut PhysicsWorld) -> Result<StaticContent> {
    let root = scene.root();
    let anchor = scene
        .add(root, "anchor", NodeKind::Group, Transform::IDENTITY)
        .context("scene root missing")?;

    let ground_body = physics.add_body(BodyDesc::ground_plane());
    let ground = scene
        .add(
            anchor,
            "ground",
            NodeKind::Mesh {
                mesh: MeshKind::Quad { width: FLOOR_WIDTH, height: FLOOR_DEPTH },
                material: Material::hotspot(),
                receive_shadow: true,
            },
            Transform::IDENTITY.with_rotation(Quat::from_rotation_x(-FRAC_PI_2)),
        )
        .context("anchor group missing")?;

    let lights = scene
        .add(anchor, "lights", NodeKind::Group, Transform::IDENTITY)
        .context("anchor group missing")?;
    scene
        .add(
            lights,
            "ambient",
            NodeKind::Light(Light::Ambient { color: Color::LIGHT_GREY, intensity: 1.0 }),
            Transform::IDENTITY,
        )
        .context("light group missing")?;
    scene
        .add(
            lights,
            "sun",
            NodeKind::Light(Light::Directional { color: Color::WHITE, intensity: 0.9, cast_shadow: true }),
            Transform::from_translation(Vec3::new(0.0, 8.0, 5.0)),
        )
        .context("light group missing")?;

    log::debug!("Static content composed: {} scene nodes, {} bodies", scene.len(), physics.body_count());
    Ok(StaticContent { anchor, ground, ground_body, lights })
}

/// Everything that varies between spawned bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnParams {
    pub kind: ShapeKind,
    /// Node scale. Spheres are always uniform.
    pub scale: Vec3,
    pub position: Vec3,
    pub lifetime: f32,
    pub color: Color,
}

impl SpawnParams {
    /// Half-extents of the collision cube.
    pub fn half_extents(&self) -> Vec3 {
        match self.kind {
            ShapeKind::Box => self.scale * 0.5,
            ShapeKind::Sphere => Vec3::splat(self.scale.x * 0.5),
        }
    }
}

/// Random shape policy + the pairing of node and rigid body.
pub struct SpawnFactory<R: Rng = StdRng> {
    rng: R,
    settings: SpawnSettings,
}

impl SpawnFactory<StdRng> {
    /// Seeded when `seed` is given, from entropy otherwise.
    pub fn new(settings: SpawnSettings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(settings, rng)
    }
}

impl<R: Rng> SpawnFactory<R> {
    pub fn with_rng(settings: SpawnSettings, rng: R) -> Self {
        Self { rng, settings }
    }

    pub fn settings(&self) -> &SpawnSettings {
        &self.settings
    }

    fn random_scale(&mut self) -> f32 {
        (self.rng.gen::<f32>() + self.settings.scale_bias) * self.settings.scale_factor
    }

    /// Draws kind, scale, position and colour.
    pub fn random_params(&mut self) -> SpawnParams {
        let kind = if self.rng.gen_bool(0.5) { ShapeKind::Box } else { ShapeKind::Sphere };
        let scale = match kind {
            ShapeKind::Box => Vec3::new(self.random_scale(), self.random_scale(), self.random_scale()),
            ShapeKind::Sphere => Vec3::splat(self.random_scale()),
        };
        let position = Vec3::new(
            self.rng.gen::<f32>() + self.settings.x_offset,
            self.settings.drop_height,
            self.rng.gen::<f32>(),
        );
        let color = Color::from_hex(self.rng.gen_range(0..0x0100_0000));
        SpawnParams { kind, scale, position, lifetime: self.settings.lifetime, color }
    }

    /// Creates the node under `parent` and registers the matching rigid body.
    pub fn spawn(
        &self,
        params: SpawnParams,
        parent: NodeId,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        now: f64,
    ) -> Result<SpawnedBody> {
        let mesh = match params.kind {
            ShapeKind::Box => MeshKind::Box,
            ShapeKind::Sphere => MeshKind::Sphere,
        };
        let material = Material::standard(params.color, self.settings.roughness, self.settings.metalness);
        let node = scene
            .add(
                parent,
                format!("{:?}", params.kind).to_lowercase(),
                NodeKind::Mesh { mesh, material, receive_shadow: false },
                Transform::from_translation(params.position).with_scale(params.scale),
            )
            .context("spawn parent is not in the scene")?;

        let body = physics.add_body(BodyDesc::dynamic_box(params.half_extents(), self.settings.mass).at(params.position));
        Ok(SpawnedBody::new(params.kind, node, body, now, params.lifetime))
    }

    pub fn spawn_random(
        &mut self,
        parent: NodeId,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        now: f64,
    ) -> Result<SpawnedBody> {
        let params = self.random_params();
        self.spawn(params, parent, scene, physics, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsSettings;

    fn factory(seed: u64) -> SpawnFactory {
        SpawnFactory::new(SpawnSettings::default(), Some(seed))
    }

    #[test]
    fn static_content_hangs_off_anchor() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::new(&PhysicsSettings::default());
        let content = compose_static(&mut scene, &mut physics).unwrap();

        assert_eq!(physics.body_count(), 1);
        assert!(physics.contains(content.ground_body));
        assert_eq!(scene.get(content.ground).unwrap().parent(), Some(content.anchor));
        assert_eq!(scene.get(content.lights).unwrap().children().len(), 2);

        let (_, lights) = scene.collect();
        assert!(lights.iter().any(|l| matches!(l.light, Light::Directional { cast_shadow: true, .. })));
    }

    #[test]
    fn ground_quad_lies_flat() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::new(&PhysicsSettings::default());
        let content = compose_static(&mut scene, &mut physics).unwrap();
        let normal = scene.transform(content.ground).unwrap().rotation * Vec3::Z;
        assert!((normal - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn random_params_follow_policy() {
        let mut f = factory(42);
        let mut saw_box = false;
        let mut saw_sphere = false;
        for _ in 0..200 {
            let p = f.random_params();
            for s in p.scale.to_array() {
                assert!((0.1..0.6).contains(&s), "scale component {} out of range", s);
            }
            assert!((-0.2..0.8).contains(&p.position.x));
            assert_eq!(p.position.y, 5.0);
            assert!((0.0..1.0).contains(&p.position.z));
            assert_eq!(p.lifetime, 2.0);
            match p.kind {
                ShapeKind::Box => saw_box = true,
                ShapeKind::Sphere => {
                    saw_sphere = true;
                    assert_eq!(p.scale.x, p.scale.y);
                    assert_eq!(p.scale.x, p.scale.z);
                }
            }
        }
        assert!(saw_box && saw_sphere);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = factory(7);
        let mut b = factory(7);
        for _ in 0..10 {
            assert_eq!(a.random_params(), b.random_params());
        }
    }

    #[test]
    fn sphere_collides_as_cube_of_matching_half_extent() {
        let params = SpawnParams {
            kind: ShapeKind::Sphere,
            scale: Vec3::splat(0.4),
            position: Vec3::ZERO,
            lifetime: 2.0,
            color: Color::WHITE,
        };
        assert_eq!(params.half_extents(), Vec3::splat(0.2));
    }

    #[test]
    fn spawn_pairs_node_and_body() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::new(&PhysicsSettings::default());
        let content = compose_static(&mut scene, &mut physics).unwrap();
        let mut f = factory(1);

        let spawned = f.spawn_random(content.anchor, &mut scene, &mut physics, 0.5).unwrap();
        assert!(physics.contains(spawned.body()));
        let node = scene.get(spawned.node()).unwrap();
        assert_eq!(node.parent(), Some(content.anchor));
        assert!(matches!(node.kind, NodeKind::Mesh { .. }));
        assert_eq!(spawned.spawned_at(), 0.5);
        assert_eq!(physics.transform(spawned.body()).unwrap().0, node.transform.translation);
    }

    #[test]
    fn spawn_under_missing_parent_fails_cleanly() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::new(&PhysicsSettings::default());
        let content = compose_static(&mut scene, &mut physics).unwrap();
        scene.remove(content.anchor);

        let f = factory(3);
        let params = SpawnParams {
            kind: ShapeKind::Box,
            scale: Vec3::splat(0.3),
            position: Vec3::Y * 5.0,
            lifetime: 2.0,
            color: Color::WHITE,
        };
        assert!(f.spawn(params, content.anchor, &mut scene, &mut physics, 0.0).is_err());
        assert_eq!(physics.body_count(), 1);
    }
}
