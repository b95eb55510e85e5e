// src/frame_loop.rs
//! The per-tick driver: physics step, pose sync, anchor placement, spawn cadence, render.
//!
//! Everything runs on the caller's thread and each tick runs to completion. The host owns the
//! wall clock and the redraw request; `tick` only needs the elapsed seconds.

use crossbeam::channel::Sender;

use crate::body::SpawnedBodies;
use crate::composition::{compose_static, SpawnFactory, StaticContent};
use crate::config::DemoConfig;
use crate::error::Result;
use crate::physics::PhysicsWorld;
use crate::render::Renderer;
use crate::scene::Scene;
use crate::time::Countdown;
use crate::tracker::WorldTracker;
use crate::ui::{ControlPanel, UiEvent, UiInbox};

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub sub_steps: u32,
    pub synced: usize,
    pub spawned: bool,
    pub disposed: usize,
    pub live: usize,
}

pub struct FrameLoop<T: WorldTracker> {
    config: DemoConfig,
    tracker: T,
    physics: PhysicsWorld,
    scene: Scene,
    statics: StaticContent,
    bodies: SpawnedBodies,
    factory: SpawnFactory,
    controls: ControlPanel,
    inbox: UiInbox,
    spawn_timer: Countdown,
    sim_time: f64,
}

impl<T: WorldTracker> FrameLoop<T> {
    /// Starts the tracker and composes the static scene. Fails before anything else is built when
    /// the tracker cannot start.
    pub fn new(config: DemoConfig, mut tracker: T) -> Result<Self> {
        config.validate()?;
        tracker.start()?;

        let mut physics = PhysicsWorld::new(&config.physics);
        let mut scene = Scene::new();
        let statics = compose_static(&mut scene, &mut physics)?;
        let factory = SpawnFactory::new(config.spawn.clone(), config.seed);
        let spawn_timer = Countdown::new(config.spawn.interval);

        log::info!(
            "Frame loop ready: step {:.4}s, up to {} sub-steps, spawn every {}s",
            config.physics.fixed_step,
            config.physics.max_sub_steps,
            config.spawn.interval
        );

        Ok(Self {
            config,
            tracker,
            physics,
            scene,
            statics,
            bodies: SpawnedBodies::new(),
            factory,
            controls: ControlPanel::new(),
            inbox: UiInbox::new(),
            spawn_timer,
            sim_time: 0.0,
        })
    }

    /// Runs one tick with `dt` seconds of elapsed time.
    pub fn tick<R: Renderer + ?Sized>(&mut self, dt: f32, renderer: &mut R) -> Result<TickReport> {
        let mut report = TickReport::default();

        self.inbox.drain_into(&mut self.controls);
        self.sim_time += dt as f64;
        self.tracker.update_frame(dt);

        report.disposed = self.bodies.dispose_expired(self.sim_time, &mut self.scene, &mut self.physics);

        let settings = &self.config.physics;
        report.sub_steps = self.physics.step(settings.fixed_step, dt, settings.max_sub_steps)?;
        report.synced = self.bodies.sync_all(&self.physics, &mut self.scene);

        if self.controls.anchor_placed() {
            self.controls.show_spawn_control();
        } else {
            self.tracker.set_anchor_pose_from_camera_offset(self.config.anchor.camera_offset());
            self.controls.enforce_unplaced();
        }
        let anchor = self.tracker.anchor_pose();
        self.scene.set_pose(self.statics.anchor, anchor.position, anchor.rotation);

        if self.controls.spawning_active() && self.spawn_timer.tick(dt) {
            let spawned = self
                .factory
                .spawn_random(self.statics.anchor, &mut self.scene, &mut self.physics, self.sim_time)?;
            self.bodies.push(spawned);
            report.spawned = true;
        }

        renderer.render(&self.scene, &self.tracker.camera())?;

        report.live = self.bodies.len();
        Ok(report)
    }

    /// Applies a button press right away.
    pub fn press(&mut self, event: UiEvent) {
        self.controls.apply(event);
    }

    /// Sender for button presses delivered from elsewhere; drained at the start of each tick.
    pub fn ui_sender(&self) -> Sender<UiEvent> {
        self.inbox.sender()
    }

    pub fn controls(&self) -> &ControlPanel {
        &self.controls
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn bodies(&self) -> &SpawnedBodies {
        &self.bodies
    }

    pub fn statics(&self) -> &StaticContent {
        &self.statics
    }

    pub fn spawn_timer(&self) -> &Countdown {
        &self.spawn_timer
    }

    /// Seconds of simulated time, the sum of every tick's delta.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;
    use crate::tracker::VirtualTracker;

    const DT: f32 = 1.0 / 64.0;

    fn demo() -> FrameLoop<VirtualTracker> {
        let config = DemoConfig { seed: Some(9), ..DemoConfig::default() };
        FrameLoop::new(config, VirtualTracker::new()).unwrap()
    }

    fn place_and_start(frame: &mut FrameLoop<VirtualTracker>) {
        frame.press(UiEvent::TogglePlacement);
        frame.press(UiEvent::ToggleSpawning);
        assert!(frame.controls().spawning_active());
    }

    #[test]
    fn one_second_of_spawning_creates_four_bodies() {
        let mut frame = demo();
        let mut renderer = HeadlessRenderer::new();
        place_and_start(&mut frame);

        let spawned = (0..64).filter(|_| frame.tick(DT, &mut renderer).unwrap().spawned).count();
        assert_eq!(spawned, 4);
        assert_eq!(frame.bodies().total_created(), 4);
        assert_eq!(renderer.frames_rendered(), 64);
    }

    #[test]
    fn sixty_hz_spawns_every_sixteenth_tick() {
        let mut frame = demo();
        let mut renderer = HeadlessRenderer::new();
        place_and_start(&mut frame);

        let spawn_ticks: Vec<usize> = (1..=60)
            .filter(|_| frame.tick(1.0 / 60.0, &mut renderer).unwrap().spawned)
            .collect();
        assert_eq!(spawn_ticks, vec![16, 32, 48]);
        assert_eq!(frame.bodies().total_created(), 3);
        assert_eq!(frame.bodies().len(), 3);
    }

    #[test]
    fn countdown_resets_to_interval() {
        let mut frame = demo();
        let mut renderer = HeadlessRenderer::new();
        place_and_start(&mut frame);

        for _ in 0..16 {
            frame.tick(DT, &mut renderer).unwrap();
        }
        assert_eq!(frame.bodies().total_created(), 1);
        assert_eq!(frame.spawn_timer().remaining(), 0.25);
    }

    #[test]
    fn body_disposed_exactly_at_lifetime() {
        let mut frame = demo();
        let mut renderer = HeadlessRenderer::new();
        place_and_start(&mut frame);

        while frame.bodies().total_created() == 0 {
            frame.tick(DT, &mut renderer).unwrap();
        }
        frame.press(UiEvent::ToggleSpawning);
        let first = frame.bodies().iter().next().cloned().unwrap();
        let deadline = first.spawned_at() + first.lifetime() as f64;

        while frame.sim_time() + (DT as f64) < deadline {
            frame.tick(DT, &mut renderer).unwrap();
            assert!(frame.physics().contains(first.body()), "disposed early at t={}", frame.sim_time());
            assert!(frame.scene().contains(first.node()));
        }
        let report = frame.tick(DT, &mut renderer).unwrap();
        assert_eq!(frame.sim_time(), deadline);
        assert_eq!(report.disposed, 1);
        assert!(!frame.physics().contains(first.body()));
        assert!(!frame.scene().contains(first.node()));
    }

    #[test]
    fn render_pose_mirrors_physics_after_every_tick() {
        let mut frame = demo();
        let mut renderer = HeadlessRenderer::new();
        place_and_start(&mut frame);

        for _ in 0..100 {
            frame.tick(DT, &mut renderer).unwrap();
            for body in frame.bodies().iter() {
                let (pos, rot) = frame.physics().transform(body.body()).unwrap();
                let t = frame.scene().transform(body.node()).unwrap();
                assert_eq!(t.translation, pos);
                assert_eq!(t.rotation, rot);
            }
        }
    }

    #[test]
    fn nothing_spawns_while_unplaced() {
        let mut frame = demo();
        let mut renderer = HeadlessRenderer::new();
        place_and_start(&mut frame);
        frame.press(UiEvent::TogglePlacement);

        for _ in 0..64 {
            let report = frame.tick(DT, &mut renderer).unwrap();
            assert!(!report.spawned);
            assert!(!frame.controls().spawning_active());
            assert!(!frame.controls().spawn_button().visible);
        }
        assert_eq!(frame.bodies().total_created(), 0);
    }

    #[test]
    fn anchor_follows_camera_only_while_unplaced() {
        let mut frame = demo();
        let mut renderer = HeadlessRenderer::new();
        frame.tick(DT, &mut renderer).unwrap();
        let before = frame.scene().transform(frame.statics().anchor).unwrap();

        frame.tracker_mut().turn(0.5, 0.0);
        frame.tick(DT, &mut renderer).unwrap();
        let followed = frame.scene().transform(frame.statics().anchor).unwrap();
        assert_ne!(before.translation, followed.translation);

        frame.press(UiEvent::TogglePlacement);
        frame.tracker_mut().turn(0.5, 0.0);
        frame.tick(DT, &mut renderer).unwrap();
        let placed = frame.scene().transform(frame.statics().anchor).unwrap();
        assert_eq!(followed.translation, placed.translation);
    }

    #[test]
    fn dropped_box_never_sinks_through_floor() {
        let mut frame = demo();
        let mut renderer = HeadlessRenderer::new();
        place_and_start(&mut frame);
        for _ in 0..300 {
            frame.tick(DT, &mut renderer).unwrap();
            for body in frame.bodies().iter() {
                let (pos, _) = frame.physics().transform(body.body()).unwrap();
                assert!(pos.y > 0.0, "body below floor at y={}", pos.y);
            }
        }
    }

    #[test]
    fn events_from_sender_apply_next_tick() {
        let mut frame = demo();
        let mut renderer = HeadlessRenderer::new();
        let tx = frame.ui_sender();
        tx.send(UiEvent::TogglePlacement).unwrap();
        assert!(!frame.controls().anchor_placed());
        frame.tick(DT, &mut renderer).unwrap();
        assert!(frame.controls().anchor_placed());
        assert!(frame.controls().spawn_button().visible);
    }

    #[test]
    fn unsupported_tracker_aborts_startup() {
        let err = FrameLoop::new(DemoConfig::default(), VirtualTracker::unsupported()).err().unwrap();
        assert!(err.is_unsupported_environment());
    }
}
