//! Render composition and pipeline batching.
//!
//! Scene nodes describe what they draw as [`Instanced`] items. The scene sorts
//! them into one batch per [`Side`], since culling is baked into the pipeline,
//! and records each batch with [`DrawMesh`].

use crate::data_structures::{geometry::Geometry, material::Side};

/// Everything needed to draw one mesh node.
#[derive(Clone, Copy)]
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub geometry: &'a Geometry,
    pub bind_group: &'a wgpu::BindGroup,
    pub side: Side,
}

/// Renderables grouped by the pipeline they need.
#[derive(Default)]
pub struct Batches<'a> {
    pub front: Vec<Instanced<'a>>,
    pub back: Vec<Instanced<'a>>,
    pub double: Vec<Instanced<'a>>,
}

impl<'a> Batches<'a> {
    pub fn get(&self, side: Side) -> &[Instanced<'a>] {
        match side {
            Side::Front => &self.front,
            Side::Back => &self.back,
            Side::Double => &self.double,
        }
    }

    pub fn len(&self) -> usize {
        self.front.len() + self.back.len() + self.double.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> FromIterator<Instanced<'a>> for Batches<'a> {
    fn from_iter<I: IntoIterator<Item = Instanced<'a>>>(iter: I) -> Self {
        let mut batches = Batches::default();
        for instanced in iter {
            match instanced.side {
                Side::Front => batches.front.push(instanced),
                Side::Back => batches.back.push(instanced),
                Side::Double => batches.double.push(instanced),
            }
        }
        batches
    }
}

pub trait DrawMesh<'a> {
    fn draw_mesh(
        &mut self,
        instanced: &Instanced<'a>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    );
}

impl<'a> DrawMesh<'a> for wgpu::RenderPass<'a> {
    fn draw_mesh(
        &mut self,
        instanced: &Instanced<'a>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    ) {
        let geometry = instanced.geometry;
        self.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
        self.set_vertex_buffer(1, instanced.instance.slice(..));
        self.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.set_bind_group(0, camera_bind_group, &[]);
        self.set_bind_group(1, light_bind_group, &[]);
        self.set_bind_group(2, instanced.bind_group, &[]);
        self.draw_indexed(0..geometry.num_elements, 0, 0..1);
    }
}
