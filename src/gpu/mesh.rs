// src/gpu/mesh.rs
//! Unit meshes shared by every draw. Sizes come from the instance model matrix.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

/// Cube spanning -0.5..0.5 on every axis, four vertices per face so normals stay flat.
pub fn unit_cube() -> MeshData {
    // (normal, u axis, v axis)
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut mesh = MeshData::default();
    for (n, u, v) in FACES {
        let base = mesh.vertices.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = [
                0.5 * (n[0] + su * u[0] + sv * v[0]),
                0.5 * (n[1] + su * u[1] + sv * v[1]),
                0.5 * (n[2] + su * u[2] + sv * v[2]),
            ];
            mesh.vertices.push(Vertex { position, normal: n, uv: [(su + 1.0) * 0.5, (1.0 - sv) * 0.5] });
        }
        mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// UV sphere of diameter 1.
pub fn unit_sphere(sectors: u16, stacks: u16) -> MeshData {
    let sectors = sectors.max(3);
    let stacks = stacks.max(2);
    let mut mesh = MeshData::default();

    for i in 0..=stacks {
        let v = i as f32 / stacks as f32;
        let phi = v * PI;
        for j in 0..=sectors {
            let u = j as f32 / sectors as f32;
            let theta = u * 2.0 * PI;
            let normal = [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()];
            mesh.vertices.push(Vertex {
                position: [normal[0] * 0.5, normal[1] * 0.5, normal[2] * 0.5],
                normal,
                uv: [u, v],
            });
        }
    }

    let row = sectors + 1;
    for i in 0..stacks {
        for j in 0..sectors {
            let a = i * row + j;
            let b = a + row;
            if i != 0 {
                mesh.indices.extend_from_slice(&[a, a + 1, b]);
            }
            if i != stacks - 1 {
                mesh.indices.extend_from_slice(&[a + 1, b + 1, b]);
            }
        }
    }
    mesh
}

/// 1x1 quad in the XY plane facing +Z.
pub fn unit_quad() -> MeshData {
    let n = [0.0, 0.0, 1.0];
    MeshData {
        vertices: vec![
            Vertex { position: [-0.5, -0.5, 0.0], normal: n, uv: [0.0, 1.0] },
            Vertex { position: [0.5, -0.5, 0.0], normal: n, uv: [1.0, 1.0] },
            Vertex { position: [0.5, 0.5, 0.0], normal: n, uv: [1.0, 0.0] },
            Vertex { position: [-0.5, 0.5, 0.0], normal: n, uv: [0.0, 0.0] },
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [a[1] * b[2] - a[2] * b[1], a[2] * b[0] - a[0] * b[2], a[0] * b[1] - a[1] * b[0]]
    }

    fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    fn assert_ccw_outward(mesh: &MeshData) {
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize]);
            let face = cross(sub(b.position, a.position), sub(c.position, a.position));
            assert!(dot(face, a.normal) > 0.0, "triangle {:?} winds inward", tri);
        }
    }

    #[test]
    fn cube_is_unit_sized_and_outward() {
        let cube = unit_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        for v in &cube.vertices {
            assert!(v.position.iter().all(|c| (c.abs() - 0.5).abs() < 1e-6));
        }
        assert_ccw_outward(&cube);
    }

    #[test]
    fn sphere_has_unit_diameter() {
        let sphere = unit_sphere(20, 20);
        for v in &sphere.vertices {
            let r = dot(v.position, v.position).sqrt();
            assert!((r - 0.5).abs() < 1e-5);
        }
        assert!(sphere.indices.iter().all(|&i| (i as usize) < sphere.vertices.len()));
    }

    #[test]
    fn quad_faces_forward() {
        let quad = unit_quad();
        assert_ccw_outward(&quad);
    }
}
