// src/body.rs
//! Spawned bodies: one render node paired with one rigid body.
//!
//! The pairing is plain composition. The node's pose is a mirror of the rigid body's pose and is
//! only ever written by `sync`; nothing flows back into the simulation. Lifetime is purely
//! time-based and checked by the owning collection once per tick.

use crate::physics::{BodyHandle, PhysicsWorld};
use crate::scene::{NodeId, Scene};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Box,
    /// Drawn as a sphere, simulated as a cube of the same half-extent.
    Sphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Alive,
    Disposed,
}

#[derive(Debug, Clone)]
pub struct SpawnedBody {
    kind: ShapeKind,
    node: NodeId,
    body: BodyHandle,
    spawned_at: f64,
    lifetime: f32,
    state: Lifecycle,
}

impl SpawnedBody {
    pub fn new(kind: ShapeKind, node: NodeId, body: BodyHandle, spawned_at: f64, lifetime: f32) -> Self {
        Self { kind, node, body, spawned_at, lifetime, state: Lifecycle::Alive }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn spawned_at(&self) -> f64 {
        self.spawned_at
    }

    pub fn lifetime(&self) -> f32 {
        self.lifetime
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    /// True once `now` is at least `lifetime` seconds past the spawn time.
    #[inline]
    pub fn is_expired(&self, now: f64) -> bool {
        now - self.spawned_at >= self.lifetime as f64
    }

    /// Copies the rigid body's position and orientation onto the render node. Scale is untouched.
    #[inline]
    pub fn sync(&self, physics: &PhysicsWorld, scene: &mut Scene) -> bool {
        if self.state != Lifecycle::Alive {
            return false;
        }
        match physics.transform(self.body) {
            Some((translation, rotation)) => scene.set_pose(self.node, translation, rotation),
            None => false,
        }
    }

    /// `Alive -> Disposed`: unregisters the rigid body and detaches the node (dropping its
    /// geometry). Calling it again does nothing.
    pub fn dispose(&mut self, scene: &mut Scene, physics: &mut PhysicsWorld) {
        if self.state == Lifecycle::Disposed {
            return;
        }
        physics.remove_body(self.body);
        scene.remove(self.node);
        self.state = Lifecycle::Disposed;
    }
}

/// The live set of spawned bodies. Disposal only happens through `dispose_expired`, called inline
/// by the frame loop, so the physics registry and the scene graph are never seen half-updated.
#[derive(Debug, Default)]
pub struct SpawnedBodies {
    live: Vec<SpawnedBody>,
    created: u64,
    disposed: u64,
}

impl SpawnedBodies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, body: SpawnedBody) {
        log::debug!("Spawned {:?} at t={:.3}s", body.kind, body.spawned_at);
        self.live.push(body);
        self.created += 1;
    }

    /// Mirrors every live body's simulated pose onto its node. Returns how many were updated.
    pub fn sync_all(&self, physics: &PhysicsWorld, scene: &mut Scene) -> usize {
        self.live.iter().filter(|b| b.sync(physics, scene)).count()
    }

    /// Disposes every body whose lifetime has run out at `now`. Returns how many were disposed.
    pub fn dispose_expired(&mut self, now: f64, scene: &mut Scene, physics: &mut PhysicsWorld) -> usize {
        let before = self.live.len();
        self.live.retain_mut(|body| {
            if body.is_expired(now) {
                body.dispose(scene, physics);
                log::debug!("Disposed {:?} spawned at t={:.3}s", body.kind, body.spawned_at);
                false
            } else {
                true
            }
        });
        let disposed = before - self.live.len();
        self.disposed += disposed as u64;
        disposed
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpawnedBody> {
        self.live.iter()
    }

    /// Bodies spawned since startup, disposed ones included.
    pub fn total_created(&self) -> u64 {
        self.created
    }

    pub fn total_disposed(&self) -> u64 {
        self.disposed
    }
}
