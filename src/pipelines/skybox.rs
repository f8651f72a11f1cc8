use crate::{
    data_structures::texture::Texture,
    pipelines::{
        PipelineState,
        light::{cube_entry, sampler_entry},
        mk_render_pipeline,
    },
};

/// Draws the background cube map behind everything else.
#[derive(Debug)]
pub struct SkyboxPipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    /// `None` until a background is set, and again after it was released.
    bind_group: Option<wgpu::BindGroup>,
}

impl SkyboxPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        sample_count: u32,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[cube_entry(0), sampler_entry(1)],
            label: Some("skybox_bind_group_layout"),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[camera_bind_group_layout, &bind_group_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skybox Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("skybox.wgsl").into()),
        });
        // The triangle sits exactly on the far plane, so it has to pass against a cleared depth of 1.
        let pipeline = mk_render_pipeline(
            device,
            "Skybox Pipeline",
            &layout,
            PipelineState {
                color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                depth_format: Some(Texture::DEPTH_FORMAT),
                depth_write: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                cull_mode: None,
                sample_count,
            },
            &[],
            &shader,
        );

        Self {
            pipeline,
            bind_group_layout,
            bind_group: None,
        }
    }

    pub fn set_background(&mut self, device: &wgpu::Device, background: &Texture) {
        let sampler = background.sampler_or_default(device);
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&background.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some("skybox_bind_group"),
        }));
    }

    /// Drops the bind group so a released background is never sampled.
    pub fn clear_background(&mut self) {
        self.bind_group = None;
    }

    pub fn has_background(&self) -> bool {
        self.bind_group.is_some()
    }

    pub fn draw(&self, render_pass: &mut wgpu::RenderPass<'_>, camera_bind_group: &wgpu::BindGroup) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, camera_bind_group, &[]);
        render_pass.set_bind_group(1, bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}
