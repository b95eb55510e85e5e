// src/lib.rs
//! Place a virtual floor in front of the camera and drop random boxes and spheres onto it.
//!
//! The core is `FrameLoop`: it steps the rapier world, mirrors body poses onto the scene graph,
//! keeps the anchor glued to the camera until placed, and spawns/disposes bodies on a timer. The
//! desktop host below drives it from winit with a wgpu renderer and a steerable virtual tracker.

pub mod body;
pub mod composition;
pub mod config;
pub mod context;
pub mod error;
pub mod frame_loop;
pub mod gpu;
pub mod input;
pub mod physics;
pub mod render;
pub mod scene;
pub mod time;
pub mod tracker;
pub mod ui;

pub use config::DemoConfig;
pub use error::{Error, Result, UNSUPPORTED_ENVIRONMENT_MESSAGE};
pub use frame_loop::{FrameLoop, TickReport};
pub use render::{HeadlessRenderer, Renderer};
pub use tracker::{VirtualTracker, WorldTracker};

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::gpu::GpuRenderer;
use crate::input::{Action, KeyBindings};
use crate::time::FrameClock;

/// Runs the desktop demo until the window closes. Fails with `Error::UnsupportedEnvironment`
/// before opening a window when tracking or a GPU adapter is unavailable.
pub fn run_native() -> Result<()> {
    pollster::block_on(run_inner())
}

// ----------------------------------------------------------------------------
// winit 0.30 + wgpu 22 App State
// ----------------------------------------------------------------------------
struct DropApp {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    frame: FrameLoop<VirtualTracker>,
    clock: FrameClock,
    keys: KeyBindings,
    title: String,
    failure: Option<Error>,

    // Created inside the `resumed` event
    window: Option<Arc<Window>>,
    renderer: Option<GpuRenderer>,
}

impl DropApp {
    fn create_renderer(&self, window: Arc<Window>) -> Result<GpuRenderer> {
        let surface = self
            .instance
            .create_surface(window.clone())
            .map_err(|e| Error::render(format!("failed to create surface: {}", e)))?;
        let size = window.inner_size();
        let caps = surface.get_capabilities(&self.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| Error::unsupported("surface is not compatible with the GPU adapter"))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2u32,
        };
        surface.configure(&self.device, &config);

        Ok(GpuRenderer::new(self.device.clone(), self.queue.clone(), surface, config))
    }

    /// Window title doubles as the button bar.
    fn refresh_title(&mut self) {
        let controls = self.frame.controls();
        let mut title = format!("Anchor Drop | [Enter] {}", controls.placement_button().label);
        let spawn = controls.spawn_button();
        if spawn.visible {
            title.push_str(&format!(" | [Space] {}", spawn.label));
        }
        if title != self.title {
            if let Some(window) = self.window.as_ref() {
                window.set_title(&title);
            }
            self.title = title;
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Error) {
        log::error!("{}", err);
        self.failure = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else { return };
        let time = self.clock.tick();
        let (yaw, pitch) = self.keys.steer_rates();
        self.frame.tracker_mut().steer(yaw, pitch);

        match self.frame.tick(time.delta, renderer) {
            Ok(report) => {
                if report.spawned || report.disposed > 0 {
                    log::trace!("frame {}: {:?}", time.frame, report);
                }
            }
            Err(err) => {
                self.fail(event_loop, err);
                return;
            }
        }
        self.refresh_title();

        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for DropApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes().with_title("Anchor Drop");
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, Error::unsupported(format!("failed to create window: {}", e)));
                return;
            }
        };
        self.window = Some(window.clone());

        match self.create_renderer(window.clone()) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(err) => {
                self.fail(event_loop, err);
                return;
            }
        }

        let size = window.inner_size();
        self.frame.tracker_mut().set_viewport(size.width, size.height);
        self.refresh_title();
        // restart timing so the first tick does not include setup time
        self.clock = FrameClock::new();
        window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else { return };
        if window.id() != window_id { return; }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if new_size.width > 0 && new_size.height > 0 {
                    if let Some(renderer) = self.renderer.as_mut() {
                        renderer.resize(new_size.width, new_size.height);
                    }
                    self.frame.tracker_mut().set_viewport(new_size.width, new_size.height);
                }
            }
            WindowEvent::Focused(false) => {
                self.keys.release_all();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else { return };
                match self.keys.handle(code, event.state, event.repeat) {
                    Some(Action::Ui(ui)) => {
                        self.frame.press(ui);
                        self.refresh_title();
                    }
                    Some(Action::Quit) => event_loop.exit(),
                    None => {}
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

// ----------------------------------------------------------------------------
// Async Runner
// ----------------------------------------------------------------------------
async fn run_inner() -> Result<()> {
    let config = DemoConfig::from_env()?;
    // Tracker first: an unsupported host never gets a window.
    let frame = FrameLoop::new(config, VirtualTracker::new())?;

    let event_loop = EventLoop::new()
        .map_err(|e| Error::unsupported(format!("no windowing system available: {}", e)))?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        dx12_shader_compiler: Default::default(),
        flags: wgpu::InstanceFlags::empty(),
        gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| Error::unsupported("no compatible GPU adapter"))?;
    log::info!("Using adapter: {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("anchor_drop_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .map_err(|e| Error::render(format!("failed to request device: {}", e)))?;

    let mut app = DropApp {
        instance,
        adapter,
        device: Arc::new(device),
        queue: Arc::new(queue),
        frame,
        clock: FrameClock::new(),
        keys: KeyBindings::new(),
        title: String::new(),
        failure: None,
        window: None,
        renderer: None,
    };

    event_loop
        .run_app(&mut app)
        .map_err(|e| Error::custom(format!("event loop failed: {}", e)))?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
