use crate::{
    data_structures::{
        geometry::{ModelVertex, Vertex},
        instance::InstanceRaw,
        material::Side,
        texture::Texture,
    },
    pipelines::{PipelineState, mk_render_pipeline},
};

/// One pipeline per [`Side`]; culling is fixed at pipeline creation.
#[derive(Debug)]
pub struct MeshPipelines {
    front: wgpu::RenderPipeline,
    back: wgpu::RenderPipeline,
    double: wgpu::RenderPipeline,
}

impl MeshPipelines {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        light_bind_group_layout: &wgpu::BindGroupLayout,
        material_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[
                camera_bind_group_layout,
                light_bind_group_layout,
                material_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("mesh.wgsl").into()),
        });

        let pipeline = |side: Side| {
            mk_render_pipeline(
                device,
                &format!("{side:?} Mesh Pipeline"),
                &layout,
                PipelineState {
                    color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    depth_format: Some(Texture::DEPTH_FORMAT),
                    depth_write: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    cull_mode: side.cull_mode(),
                    sample_count,
                },
                &[ModelVertex::desc(), InstanceRaw::desc()],
                &shader,
            )
        };

        Self {
            front: pipeline(Side::Front),
            back: pipeline(Side::Back),
            double: pipeline(Side::Double),
        }
    }

    pub fn get(&self, side: Side) -> &wgpu::RenderPipeline {
        match side {
            Side::Front => &self.front,
            Side::Back => &self.back,
            Side::Double => &self.double,
        }
    }
}
