//! Vertex data and GPU geometry buffers.

use std::f32::consts::PI;

use cgmath::{Vector2, Vector3};
use wgpu::util::DeviceExt;

use crate::data_structures::dispose::Release;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
    /// Zero when the source provides no tangents; the shader then skips normal mapping.
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x2,
            2 => Float32x3,
            3 => Float32x3,
            4 => Float32x3,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Vertex and index buffers of one mesh.
#[derive(Debug)]
pub struct Geometry {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
}

impl Geometry {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        vertices: &[ModelVertex],
        indices: &[u32],
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: indices.len() as u32,
        }
    }
}

impl Release for Geometry {
    fn release(self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}

/// Averages per-triangle tangents and bitangents into the vertices.
///
/// Used for meshes that ship normal maps without tangents. Triangles with
/// degenerate texture coordinates contribute nothing.
pub fn compute_tangents(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut triangles_included = vec![0u32; vertices.len()];

    for c in indices.chunks_exact(3) {
        let [i0, i1, i2] = [c[0] as usize, c[1] as usize, c[2] as usize];
        if i0.max(i1).max(i2) >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (vertices[i0], vertices[i1], vertices[i2]);

        let delta_pos1 = Vector3::from(v1.position) - Vector3::from(v0.position);
        let delta_pos2 = Vector3::from(v2.position) - Vector3::from(v0.position);
        let delta_uv1 = Vector2::from(v1.tex_coords) - Vector2::from(v0.tex_coords);
        let delta_uv2 = Vector2::from(v2.tex_coords) - Vector2::from(v0.tex_coords);

        // delta_pos1 = delta_uv1.x * T + delta_uv1.y * B
        // delta_pos2 = delta_uv2.x * T + delta_uv2.y * B
        let r = 1.0 / (delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x);
        if !r.is_finite() {
            continue;
        }
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // flipped for right-handed normal maps with wgpu's texture coordinates
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for i in [i0, i1, i2] {
            let v = &mut vertices[i];
            v.tangent = (tangent + Vector3::from(v.tangent)).into();
            v.bitangent = (bitangent + Vector3::from(v.bitangent)).into();
            triangles_included[i] += 1;
        }
    }

    for (v, n) in vertices.iter_mut().zip(triangles_included) {
        if n > 0 {
            let denom = 1.0 / n as f32;
            v.tangent = (Vector3::from(v.tangent) * denom).into();
            v.bitangent = (Vector3::from(v.bitangent) * denom).into();
        }
    }
}

/// Parameters of a UV sphere centred at the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereGeometry {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl SphereGeometry {
    pub fn new(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        Self {
            radius,
            width_segments: width_segments.max(3),
            height_segments: height_segments.max(2),
        }
    }

    /// CPU-side vertices and triangle indices.
    ///
    /// The grid has a seam column, so there are `(w + 1) * (h + 1)` vertices. The
    /// first and last rows touch the poles and only emit one triangle per quad.
    pub fn build(&self) -> (Vec<ModelVertex>, Vec<u32>) {
        let w = self.width_segments;
        let h = self.height_segments;
        let mut vertices = Vec::with_capacity(((w + 1) * (h + 1)) as usize);

        for iy in 0..=h {
            let v = iy as f32 / h as f32;
            // center the texture coordinate of pole vertices on their triangle
            let u_offset = if iy == 0 {
                0.5 / w as f32
            } else if iy == h {
                -0.5 / w as f32
            } else {
                0.0
            };
            for ix in 0..=w {
                let u = ix as f32 / w as f32;
                let phi = u * 2.0 * PI;
                let theta = v * PI;
                let position = [
                    -self.radius * phi.cos() * theta.sin(),
                    self.radius * theta.cos(),
                    self.radius * phi.sin() * theta.sin(),
                ];
                let normal = Vector3::from(position);
                let len = (normal.x * normal.x + normal.y * normal.y + normal.z * normal.z).sqrt();
                let normal = if len > 0.0 { normal / len } else { normal };
                vertices.push(ModelVertex {
                    position,
                    tex_coords: [u + u_offset, v],
                    normal: normal.into(),
                    ..Default::default()
                });
            }
        }

        let row = w + 1;
        let mut indices = Vec::with_capacity((6 * w * (h - 1)) as usize);
        for iy in 0..h {
            for ix in 0..w {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != h - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }
        (vertices, indices)
    }

    pub fn upload(&self, device: &wgpu::Device, name: &str) -> Geometry {
        let (vertices, indices) = self.build();
        Geometry::new(device, name, &vertices, &indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_counts() {
        let (vertices, indices) = SphereGeometry::new(640.0, 64, 32).build();
        assert_eq!(vertices.len(), 65 * 33);
        assert_eq!(indices.len(), 6 * 64 * 31);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let (vertices, _) = SphereGeometry::new(40.0, 32, 16).build();
        for vertex in vertices {
            let [x, y, z] = vertex.position;
            let len = (x * x + y * y + z * z).sqrt();
            assert!((len - 40.0).abs() < 1e-3, "{len}");
            let [nx, ny, nz] = vertex.normal;
            assert!((nx * 40.0 - x).abs() < 1e-3);
            assert!((ny * 40.0 - y).abs() < 1e-3);
            assert!((nz * 40.0 - z).abs() < 1e-3);
        }
    }

    #[test]
    fn poles_and_seam() {
        let sphere = SphereGeometry::new(1.0, 4, 2);
        let (vertices, indices) = sphere.build();
        assert!((vertices[0].position[1] - 1.0).abs() < 1e-6);
        assert!((vertices.last().unwrap().position[1] + 1.0).abs() < 1e-6);
        // no triangle uses two vertices of the top row (which all sit on the pole)
        for tri in indices.chunks(3) {
            let on_top = tri.iter().filter(|&&i| i < 5).count();
            assert!(on_top <= 1, "{tri:?}");
        }
        assert!((vertices[0].tex_coords[0] - 0.125).abs() < 1e-6);
        assert_eq!(vertices[4].tex_coords, [1.125, 0.0]);
    }

    #[test]
    fn segments_are_clamped() {
        let sphere = SphereGeometry::new(1.0, 0, 0);
        assert_eq!((sphere.width_segments, sphere.height_segments), (3, 2));
        let (vertices, indices) = sphere.build();
        assert_eq!(vertices.len(), 4 * 3);
        assert_eq!(indices.len(), 6 * 3);
    }

    #[test]
    fn tangents_follow_texture_axes() {
        let vertex = |position, tex_coords| ModelVertex {
            position,
            tex_coords,
            normal: [0.0, 0.0, 1.0],
            ..Default::default()
        };
        let mut vertices = [
            vertex([0.0, 0.0, 0.0], [0.0, 1.0]),
            vertex([1.0, 0.0, 0.0], [1.0, 1.0]),
            vertex([0.0, 1.0, 0.0], [0.0, 0.0]),
        ];
        compute_tangents(&mut vertices, &[0, 1, 2]);
        for v in vertices {
            assert_eq!(v.tangent, [1.0, 0.0, 0.0]);
            assert_eq!(v.bitangent, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn degenerate_uvs_leave_tangents_zero() {
        let mut vertices = [ModelVertex::default(); 3];
        vertices[1].position = [1.0, 0.0, 0.0];
        vertices[2].position = [0.0, 1.0, 0.0];
        compute_tangents(&mut vertices, &[0, 1, 2]);
        assert!(vertices.iter().all(|v| v.tangent == [0.0; 3]));
    }
}
