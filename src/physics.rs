// src/physics.rs
//! Rapier 3D physics world for the drop demo.
//!
//! The world is an explicitly constructed context object: whoever owns the frame loop owns one of
//! these, and tests can build as many independent worlds as they like. Collision pairs are found
//! by rapier's sweep-and-prune broadphase, so cost grows with overlapping pairs rather than with
//! the square of the body count.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use crate::config::PhysicsSettings;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Handles & descriptors
// ---------------------------------------------------------------------------

/// Opaque handle to a registered rigid body. Minted fresh by every `add_body`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

/// Defines how a body reacts to physics forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    Dynamic, // Affected by gravity and collisions
    Static,  // Never moves, infinite mass
}

/// Collision shape of a body, in body-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeDesc {
    /// Infinite plane through the local origin with its normal along local +Z.
    Plane,
    Cuboid { half_extents: Vec3 },
}

/// Index into the world's material table. `MaterialId::DEFAULT` always exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u32);

impl MaterialId {
    pub const DEFAULT: MaterialId = MaterialId(0);
}

/// Friction/restitution applied when two materials touch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactRule {
    pub friction: f32,
    pub restitution: f32,
}

/// Everything needed to register a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub body_type: BodyType,
    pub shape: ShapeDesc,
    /// Ignored for static bodies.
    pub mass: f32,
    pub position: Vec3,
    pub rotation: Quat,
    pub material: MaterialId,
}

impl BodyDesc {
    pub fn dynamic_box(half_extents: Vec3, mass: f32) -> Self {
        Self {
            body_type: BodyType::Dynamic,
            shape: ShapeDesc::Cuboid { half_extents },
            mass,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            material: MaterialId::DEFAULT,
        }
    }

    /// Static ground plane at the origin, turned so its normal points up (+Y).
    pub fn ground_plane() -> Self {
        Self {
            body_type: BodyType::Static,
            shape: ShapeDesc::Plane,
            mass: 0.0,
            position: Vec3::ZERO,
            rotation: Quat::from_axis_angle(Vec3::NEG_X, std::f32::consts::FRAC_PI_2),
            material: MaterialId::DEFAULT,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = material;
        self
    }
}

// ---------------------------------------------------------------------------
// Contact materials
// ---------------------------------------------------------------------------

/// Named materials plus per-pair contact rules. Pairs without a rule use the default.
///
/// Colliders carry their material id in `user_data`; the solver-contact hook swaps in the pair
/// rule before impulses are computed.
#[derive(Debug, Clone)]
pub struct ContactMaterials {
    names: Vec<String>,
    default_rule: ContactRule,
    pairs: HashMap<(MaterialId, MaterialId), ContactRule>,
}

impl ContactMaterials {
    fn new(default_rule: ContactRule) -> Self {
        Self {
            names: vec!["default".to_string()],
            default_rule,
            pairs: HashMap::new(),
        }
    }

    fn key(a: MaterialId, b: MaterialId) -> (MaterialId, MaterialId) {
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Rule used when `a` touches `b` (order does not matter).
    pub fn rule_for(&self, a: MaterialId, b: MaterialId) -> ContactRule {
        self.pairs.get(&Self::key(a, b)).copied().unwrap_or(self.default_rule)
    }

    pub fn default_rule(&self) -> ContactRule {
        self.default_rule
    }

    pub fn name(&self, id: MaterialId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    fn material_of(collider: &Collider) -> MaterialId {
        MaterialId(collider.user_data as u32)
    }
}

impl PhysicsHooks for ContactMaterials {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        if self.pairs.is_empty() {
            return;
        }
        let a = Self::material_of(&context.colliders[context.collider1]);
        let b = Self::material_of(&context.colliders[context.collider2]);
        if let Some(rule) = self.pairs.get(&Self::key(a, b)) {
            for contact in context.solver_contacts.iter_mut() {
                contact.friction = rule.friction;
                contact.restitution = rule.restitution;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Physics world
// ---------------------------------------------------------------------------

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    allow_sleep: bool,
    integration_params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    materials: ContactMaterials,
    /// Simulated time not yet consumed by a fixed step.
    accumulator: f32,
    /// Total simulated seconds.
    elapsed: f64,
}

impl PhysicsWorld {
    pub fn new(settings: &PhysicsSettings) -> Self {
        let gravity = settings.gravity();
        Self {
            gravity: vector![gravity.x, gravity.y, gravity.z],
            allow_sleep: settings.allow_sleep,
            integration_params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            materials: ContactMaterials::new(ContactRule {
                friction: settings.default_friction,
                restitution: settings.default_restitution,
            }),
            accumulator: 0.0,
            elapsed: 0.0,
        }
    }

    // -------------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------------

    /// Advances the simulation by `actual_dt` using fixed internal steps of `nominal_dt`.
    ///
    /// At most `max_sub_steps` internal steps run; whatever time is left over beyond that is
    /// dropped rather than carried into the next call. Returns the number of internal steps taken,
    /// or `Error::Physics` when `nominal_dt` is not a positive finite number.
    pub fn step(&mut self, nominal_dt: f32, actual_dt: f32, max_sub_steps: u32) -> Result<u32> {
        if !(nominal_dt > 0.0 && nominal_dt.is_finite()) {
            return Err(Error::physics(format!("nominal step must be positive and finite, got {}", nominal_dt)));
        }

        self.accumulator += actual_dt.max(0.0);
        let mut sub_steps = 0;
        while self.accumulator >= nominal_dt && sub_steps < max_sub_steps {
            self.internal_step(nominal_dt);
            self.accumulator -= nominal_dt;
            sub_steps += 1;
        }
        self.accumulator %= nominal_dt;
        Ok(sub_steps)
    }

    fn internal_step(&mut self, dt: f32) {
        self.integration_params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &self.materials,
            &(),
        );
        self.elapsed += dt as f64;
    }

    // -------------------------------------------------------------------------
    // Body management
    // -------------------------------------------------------------------------

    /// Registers a body. It takes part in the simulation from the next step onward.
    pub fn add_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let builder = match desc.body_type {
            BodyType::Dynamic => RigidBodyBuilder::dynamic(),
            BodyType::Static => RigidBodyBuilder::fixed(),
        };
        let body = builder
            .position(to_isometry(desc.position, desc.rotation))
            .can_sleep(self.allow_sleep)
            .build();

        let rule = self.materials.default_rule();
        let mut collider = match desc.shape {
            ShapeDesc::Plane => ColliderBuilder::halfspace(Vector::z_axis()),
            ShapeDesc::Cuboid { half_extents: h } => ColliderBuilder::cuboid(h.x, h.y, h.z),
        }
        .friction(rule.friction)
        .restitution(rule.restitution)
        .user_data(desc.material.0 as u128)
        .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS);
        if desc.body_type == BodyType::Dynamic {
            collider = collider.mass(desc.mass);
        }

        let handle = self.bodies.insert(body);
        self.colliders.insert_with_parent(collider.build(), handle, &mut self.bodies);
        BodyHandle(handle)
    }

    /// Unregisters a body and its collider. Removing a body that is not registered is a no-op
    /// and returns `false`.
    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        let removed = self.bodies.remove(
            handle.0,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        if removed.is_none() {
            log::debug!("remove_body on unregistered handle {:?}", handle);
        }
        removed.is_some()
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Simulated position and orientation of a body.
    #[inline]
    pub fn transform(&self, handle: BodyHandle) -> Option<(Vec3, Quat)> {
        self.bodies.get(handle.0).map(|b| {
            let t = b.translation();
            let r = b.rotation();
            (Vec3::new(t.x, t.y, t.z), Quat::from_xyzw(r.i, r.j, r.k, r.w))
        })
    }

    pub fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle.0).map(|b| {
            let v = b.linvel();
            Vec3::new(v.x, v.y, v.z)
        })
    }

    pub fn is_sleeping(&self, handle: BodyHandle) -> bool {
        self.bodies.get(handle.0).map_or(false, |b| b.is_sleeping())
    }

    // -------------------------------------------------------------------------
    // Materials & globals
    // -------------------------------------------------------------------------

    /// Registers a named material. Bodies using it follow the default rule until a pair rule is
    /// added with `set_contact_rule`.
    pub fn add_material(&mut self, name: impl Into<String>) -> MaterialId {
        self.materials.names.push(name.into());
        MaterialId((self.materials.names.len() - 1) as u32)
    }

    /// Overrides the default contact rule for one material pair.
    pub fn set_contact_rule(&mut self, a: MaterialId, b: MaterialId, rule: ContactRule) {
        self.materials.pairs.insert(ContactMaterials::key(a, b), rule);
    }

    pub fn materials(&self) -> &ContactMaterials {
        &self.materials
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = vector![gravity.x, gravity.y, gravity.z];
    }

    pub fn gravity(&self) -> Vec3 {
        Vec3::new(self.gravity.x, self.gravity.y, self.gravity.z)
    }

    /// Total simulated seconds advanced so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

fn to_isometry(position: Vec3, rotation: Quat) -> Isometry3<Real> {
    let rotation = UnitQuaternion::new_normalize(Quaternion::new(rotation.w, rotation.x, rotation.y, rotation.z));
    Isometry3::from_parts(Translation3::new(position.x, position.y, position.z), rotation)
}
