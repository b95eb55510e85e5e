// src/gpu/mod.rs
//! wgpu renderer for the demo scene.
//!
//! One pipeline, three unit meshes, one instance buffer. Each frame the scene is flattened into a
//! `FramePlan` (pure CPU work), uploaded, and drawn in mesh order: boxes, spheres, then the
//! alpha-blended floor quad last so it blends over the background.

pub mod mesh;

use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::scene::{Light, MeshKind, Scene};
use crate::tracker::CameraView;

use self::mesh::{unit_cube, unit_quad, unit_sphere, MeshData, Vertex};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SPHERE_SEGMENTS: u16 = 20;
const INITIAL_INSTANCES: usize = 64;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct Globals {
    pub view_proj: [[f32; 4]; 4],
    pub light_dir: [f32; 4],
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct Instance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// roughness, metalness, hotspot, lit
    pub params: [f32; 4],
}

impl Instance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        3 => Float32x4, 4 => Float32x4, 5 => Float32x4, 6 => Float32x4,
        7 => Float32x4, 8 => Float32x4
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Instance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Draw order of the unit meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Batch {
    Box = 0,
    Sphere = 1,
    Quad = 2,
}

/// Everything one frame uploads, grouped by mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub globals: Globals,
    pub instances: Vec<Instance>,
    /// Instance ranges for box, sphere and quad, in that order.
    pub batches: [Range<u32>; 3],
    pub clear: wgpu::Color,
}

impl FramePlan {
    pub fn build(scene: &Scene, camera: &CameraView) -> Self {
        let (draws, lights) = scene.collect();

        let mut grouped: [Vec<Instance>; 3] = Default::default();
        for item in &draws {
            let (batch, model) = match item.mesh {
                MeshKind::Box => (Batch::Box, item.world),
                MeshKind::Sphere => (Batch::Sphere, item.world),
                MeshKind::Quad { width, height } => {
                    (Batch::Quad, item.world * Mat4::from_scale(Vec3::new(width, height, 1.0)))
                }
            };
            let m = item.material;
            let [r, g, b] = m.color.0;
            grouped[batch as usize].push(Instance {
                model: model.to_cols_array_2d(),
                color: [r, g, b, m.opacity],
                params: [m.roughness, m.metalness, m.hotspot as u32 as f32, m.lit as u32 as f32],
            });
        }

        let mut ambient = Vec3::ZERO;
        let mut light_dir = Vec3::NEG_Y;
        let mut light_color = Vec3::ZERO;
        let mut have_sun = false;
        for light in &lights {
            match light.light {
                Light::Ambient { color, intensity } => ambient += Vec3::from(color.0) * intensity,
                Light::Directional { color, intensity, .. } if !have_sun => {
                    let dir = light.direction();
                    if dir != Vec3::ZERO {
                        light_dir = dir;
                    }
                    light_color = Vec3::from(color.0) * intensity;
                    have_sun = true;
                }
                Light::Directional { .. } => {}
            }
        }

        let mut instances = Vec::with_capacity(draws.len());
        let mut batches: [Range<u32>; 3] = Default::default();
        for (i, group) in grouped.iter().enumerate() {
            let start = instances.len() as u32;
            instances.extend_from_slice(group);
            batches[i] = start..instances.len() as u32;
        }

        let [r, g, b, a] = camera.background;
        Self {
            globals: Globals {
                view_proj: camera.view_proj().to_cols_array_2d(),
                light_dir: light_dir.extend(0.0).to_array(),
                light_color: light_color.extend(1.0).to_array(),
                ambient: ambient.extend(1.0).to_array(),
            },
            instances,
            batches,
            clear: wgpu::Color { r: r as f64, g: g as f64, b: b as f64, a: a as f64 },
        }
    }
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, label: &str, data: &MeshData) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_vertices", label)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_indices", label)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertices, indices, index_count: data.indices.len() as u32 }
    }
}

pub struct GpuRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    meshes: [GpuMesh; 3],
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    depth_view: wgpu::TextureView,
}

impl GpuRenderer {
    /// `config` must already have been applied to `surface`.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::include_wgsl!("shader.wgsl"));

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals_buffer"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bind_group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: globals_buffer.as_entire_binding() }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&globals_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::layout(), Instance::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // the floor is seen from both sides while the camera swings around
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let meshes = [
            GpuMesh::upload(&device, "box", &unit_cube()),
            GpuMesh::upload(&device, "sphere", &unit_sphere(SPHERE_SEGMENTS, SPHERE_SEGMENTS)),
            GpuMesh::upload(&device, "quad", &unit_quad()),
        ];
        let instance_buffer = create_instance_buffer(&device, INITIAL_INSTANCES);
        let depth_view = create_depth_view(&device, &config);

        log::info!("GPU renderer ready ({:?}, {}x{})", config.format, config.width, config.height);

        Self {
            device,
            queue,
            surface,
            config,
            pipeline,
            globals_buffer,
            globals_bind_group,
            meshes,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCES,
            depth_view,
        }
    }

    /// Next swap chain texture, or `None` when this frame should be skipped.
    fn acquire(&self) -> Result<Option<wgpu::SurfaceTexture>> {
        let err = match self.surface.get_current_texture() {
            Ok(frame) => return Ok(Some(frame)),
            Err(err) => err,
        };
        if surface_recovery(&err) == SurfaceRecovery::Fatal {
            return Err(Error::render(format!("failed to acquire frame: {:?}", err)));
        }

        log::warn!("Failed to acquire next swap chain texture: {:?}. Reconfiguring surface.", err);
        self.surface.configure(&self.device, &self.config);
        match self.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => match surface_recovery(&e) {
                SurfaceRecovery::Fatal => Err(Error::render(format!("failed to acquire frame after reconfigure: {:?}", e))),
                SurfaceRecovery::SkipFrame => {
                    log::warn!("Still no frame after reconfigure ({:?}); skipping this frame", e);
                    Ok(None)
                }
            },
        }
    }

    fn upload_instances(&mut self, instances: &[Instance]) {
        if instances.len() > self.instance_capacity {
            self.instance_capacity = instances.len().next_power_of_two();
            self.instance_buffer = create_instance_buffer(&self.device, self.instance_capacity);
            log::debug!("Instance buffer grown to {}", self.instance_capacity);
        }
        if !instances.is_empty() {
            self.queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(instances));
        }
    }
}

impl Renderer for GpuRenderer {
    fn render(&mut self, scene: &Scene, camera: &CameraView) -> Result<()> {
        let plan = FramePlan::build(scene, camera);
        self.queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&plan.globals));
        self.upload_instances(&plan.instances);

        let Some(frame) = self.acquire()? else { return Ok(()) };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(plan.clear), store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: wgpu::StoreOp::Store }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.globals_bind_group, &[]);
            rpass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for (mesh, range) in self.meshes.iter().zip(plan.batches.iter()) {
                if range.is_empty() {
                    continue;
                }
                rpass.set_vertex_buffer(0, mesh.vertices.slice(..));
                rpass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint16);
                rpass.draw_indexed(0..mesh.index_count, 0, range.clone());
            }
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, &self.config);
    }
}

/// What to do when the surface cannot hand out a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRecovery {
    /// Reconfigure and try again; drop the frame if that fails too.
    SkipFrame,
    Fatal,
}

/// Out of memory ends the demo. Timeouts, outdated and lost surfaces (minimized windows, display
/// changes) are transient.
pub fn surface_recovery(err: &wgpu::SurfaceError) -> SurfaceRecovery {
    match err {
        wgpu::SurfaceError::OutOfMemory => SurfaceRecovery::Fatal,
        _ => SurfaceRecovery::SkipFrame,
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("instance_buffer"),
        size: (std::mem::size_of::<Instance>() * capacity) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d { width: config.width.max(1), height: config.height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::compose_static;
    use crate::config::PhysicsSettings;
    use crate::physics::PhysicsWorld;
    use crate::scene::{Color, Material, NodeKind, Transform};
    use crate::tracker::{VirtualTracker, WorldTracker};

    #[test]
    fn plan_orders_batches_box_sphere_quad() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::new(&PhysicsSettings::default());
        let content = compose_static(&mut scene, &mut physics).unwrap();
        let solid = |mesh| NodeKind::Mesh { mesh, material: Material::standard(Color::WHITE, 0.4, 0.3), receive_shadow: false };
        scene.add(content.anchor, "s", solid(MeshKind::Sphere), Transform::IDENTITY).unwrap();
        scene.add(content.anchor, "b1", solid(MeshKind::Box), Transform::IDENTITY).unwrap();
        scene.add(content.anchor, "b2", solid(MeshKind::Box), Transform::IDENTITY).unwrap();

        let plan = FramePlan::build(&scene, &VirtualTracker::new().camera());
        assert_eq!(plan.instances.len(), 4);
        assert_eq!(plan.batches, [0..2, 2..3, 3..4]);
        // floor carries the hotspot flag and is unlit
        assert_eq!(plan.instances[3].params[2], 1.0);
        assert_eq!(plan.instances[3].params[3], 0.0);
    }

    #[test]
    fn plan_sums_ambient_and_aims_sun_at_anchor() {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::new(&PhysicsSettings::default());
        compose_static(&mut scene, &mut physics).unwrap();

        let plan = FramePlan::build(&scene, &VirtualTracker::new().camera());
        assert!((plan.globals.ambient[0] - Color::LIGHT_GREY.0[0]).abs() < 1e-6);
        assert!((plan.globals.light_color[0] - 0.9).abs() < 1e-6);
        let dir = Vec3::from_slice(&plan.globals.light_dir[..3]);
        assert!((dir - Vec3::new(0.0, -8.0, -5.0).normalize()).length() < 1e-5);
    }

    #[test]
    fn only_out_of_memory_is_fatal() {
        assert_eq!(surface_recovery(&wgpu::SurfaceError::Timeout), SurfaceRecovery::SkipFrame);
        assert_eq!(surface_recovery(&wgpu::SurfaceError::Outdated), SurfaceRecovery::SkipFrame);
        assert_eq!(surface_recovery(&wgpu::SurfaceError::Lost), SurfaceRecovery::SkipFrame);
        assert_eq!(surface_recovery(&wgpu::SurfaceError::OutOfMemory), SurfaceRecovery::Fatal);
    }

    #[test]
    fn plan_clears_to_camera_background() {
        let scene = Scene::new();
        let camera = VirtualTracker::new().camera();
        let plan = FramePlan::build(&scene, &camera);
        assert_eq!(plan.clear.r, camera.background[0] as f64);
        assert!(plan.instances.is_empty());
        assert!(plan.batches.iter().all(|r| r.is_empty()));
    }
}
