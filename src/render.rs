// src/render.rs
//! The renderer seam. The frame loop hands over the scene and the camera once per tick.

use std::collections::VecDeque;

use crate::error::Result;
use crate::scene::{MeshKind, Scene};
use crate::tracker::CameraView;

pub trait Renderer {
    fn render(&mut self, scene: &Scene, camera: &CameraView) -> Result<()>;

    /// Output size changed.
    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// What a headless render saw in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    pub draws: usize,
    pub boxes: usize,
    pub spheres: usize,
    pub quads: usize,
    pub lights: usize,
}

/// Collects draw lists without touching a GPU. Keeps the last `capacity` frame summaries.
#[derive(Debug)]
pub struct HeadlessRenderer {
    frames: VecDeque<FrameSummary>,
    capacity: usize,
    rendered: u64,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { frames: VecDeque::with_capacity(capacity.min(1024)), capacity: capacity.max(1), rendered: 0 }
    }

    /// Oldest first.
    pub fn frames(&self) -> &VecDeque<FrameSummary> {
        &self.frames
    }

    pub fn last(&self) -> Option<&FrameSummary> {
        self.frames.back()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.rendered
    }
}

impl Renderer for HeadlessRenderer {
    fn render(&mut self, scene: &Scene, _camera: &CameraView) -> Result<()> {
        let (draws, lights) = scene.collect();
        let mut summary = FrameSummary { draws: draws.len(), lights: lights.len(), ..Default::default() };
        for item in &draws {
            match item.mesh {
                MeshKind::Box => summary.boxes += 1,
                MeshKind::Sphere => summary.spheres += 1,
                MeshKind::Quad { .. } => summary.quads += 1,
            }
        }

        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(summary);
        self.rendered += 1;
        log::trace!("Headless frame {}: {:?}", self.rendered, summary);
        Ok(())
    }
}
