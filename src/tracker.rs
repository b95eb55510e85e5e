// src/tracker.rs
//! World-tracking collaborator.
//!
//! The frame loop only talks to `WorldTracker`. On a phone this would wrap an AR SDK's instant
//! world tracker; on the desktop `VirtualTracker` stands in for it with a steerable camera, so the
//! placement flow behaves the same way: the anchor follows the camera until placed, then stays
//! fixed in the world while the camera moves.

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::error::{Error, Result};

/// Position + orientation in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose { position: Vec3::ZERO, rotation: Quat::IDENTITY };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }
}

/// What the renderer needs from the camera this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub view: Mat4,
    pub projection: Mat4,
    /// Stand-in for the camera feed drawn behind the scene (linear RGBA).
    pub background: [f32; 4],
}

impl CameraView {
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

pub trait WorldTracker {
    /// Starts the camera. Fails with `Error::UnsupportedEnvironment` when the host cannot
    /// provide one.
    fn start(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;

    /// Advances tracking by one frame.
    fn update_frame(&mut self, dt: f32);

    /// Moves the anchor to `offset` in camera space. Called every frame while unplaced.
    fn set_anchor_pose_from_camera_offset(&mut self, offset: Vec3);

    /// Current anchor pose in world space.
    fn anchor_pose(&self) -> Pose;

    /// What is drawn behind the scene: the camera feed, or a flat colour standing in for it.
    fn background(&self) -> [f32; 4];

    /// Camera matrices and background for rendering.
    fn camera(&self) -> CameraView;

    /// Viewport changed (window resize).
    fn set_viewport(&mut self, _width: u32, _height: u32) {}
}

/// Desktop stand-in for an instant world tracker.
#[derive(Debug, Clone)]
pub struct VirtualTracker {
    supported: bool,
    running: bool,
    position: Vec3,
    yaw: f32,
    pitch: f32,
    /// Radians per second applied on `update_frame` (set from input).
    yaw_rate: f32,
    pitch_rate: f32,
    anchor: Pose,
    fov_y: f32,
    aspect: f32,
    background: [f32; 4],
}

impl Default for VirtualTracker {
    fn default() -> Self {
        Self {
            supported: true,
            running: false,
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: -0.5,
            yaw_rate: 0.0,
            pitch_rate: 0.0,
            anchor: Pose::IDENTITY,
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            background: [0.08, 0.12, 0.18, 1.0],
        }
    }
}

impl VirtualTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker whose host has no camera; `start` fails.
    pub fn unsupported() -> Self {
        Self { supported: false, ..Self::default() }
    }

    /// Sets how fast the camera turns, in radians per second.
    pub fn steer(&mut self, yaw_rate: f32, pitch_rate: f32) {
        self.yaw_rate = yaw_rate;
        self.pitch_rate = pitch_rate;
    }

    /// Turns the camera immediately.
    pub fn turn(&mut self, yaw: f32, pitch: f32) {
        self.yaw += yaw;
        self.pitch = (self.pitch + pitch).clamp(-1.4, 1.4);
    }

    pub fn camera_pose(&self) -> Pose {
        Pose {
            position: self.position,
            rotation: Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0),
        }
    }
}

impl WorldTracker for VirtualTracker {
    fn start(&mut self) -> Result<()> {
        if !self.supported {
            return Err(Error::unsupported("no camera available to the virtual tracker"));
        }
        self.running = true;
        log::info!("Virtual tracker started");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn update_frame(&mut self, dt: f32) {
        if !self.running {
            return;
        }
        self.turn(self.yaw_rate * dt, self.pitch_rate * dt);
    }

    fn set_anchor_pose_from_camera_offset(&mut self, offset: Vec3) {
        let camera = self.camera_pose();
        // Anchors stay level: position follows the full camera pose, heading follows yaw only.
        self.anchor = Pose {
            position: camera.position + camera.rotation * offset,
            rotation: Quat::from_rotation_y(self.yaw),
        };
    }

    fn anchor_pose(&self) -> Pose {
        self.anchor
    }

    fn background(&self) -> [f32; 4] {
        self.background
    }

    fn camera(&self) -> CameraView {
        CameraView {
            view: self.camera_pose().matrix().inverse(),
            projection: Mat4::perspective_rh(self.fov_y, self.aspect, 0.01, 100.0),
            background: self.background(),
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_host_fails_to_start() {
        let mut tracker = VirtualTracker::unsupported();
        let err = tracker.start().unwrap_err();
        assert!(err.is_unsupported_environment());
        assert!(!tracker.is_running());
    }

    #[test]
    fn anchor_follows_camera_offset() {
        let mut tracker = VirtualTracker::new();
        tracker.start().unwrap();
        tracker.turn(0.0, 0.5); // level the camera
        tracker.set_anchor_pose_from_camera_offset(Vec3::new(0.0, 0.0, -7.0));
        let anchor = tracker.anchor_pose();
        assert!((anchor.position - Vec3::new(0.0, 0.0, -7.0)).length() < 1e-5);

        tracker.turn(std::f32::consts::FRAC_PI_2, 0.0);
        tracker.set_anchor_pose_from_camera_offset(Vec3::new(0.0, 0.0, -7.0));
        let anchor = tracker.anchor_pose();
        assert!((anchor.position - Vec3::new(-7.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn anchor_stays_put_when_not_refreshed() {
        let mut tracker = VirtualTracker::new();
        tracker.start().unwrap();
        tracker.set_anchor_pose_from_camera_offset(Vec3::new(0.0, 0.0, -7.0));
        let placed = tracker.anchor_pose();
        tracker.steer(1.0, 0.0);
        tracker.update_frame(0.5);
        assert_eq!(tracker.anchor_pose(), placed);
    }

    #[test]
    fn pitched_camera_keeps_anchor_level() {
        let mut tracker = VirtualTracker::new();
        tracker.start().unwrap();
        tracker.set_anchor_pose_from_camera_offset(Vec3::new(0.0, 0.0, -7.0));
        let up = tracker.anchor_pose().rotation * Vec3::Y;
        assert!((up - Vec3::Y).length() < 1e-6);
        assert!(tracker.anchor_pose().position.y < 0.0);
    }
}
