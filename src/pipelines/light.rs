use wgpu::util::DeviceExt;

use crate::data_structures::texture::Texture;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    /// Sum of all ambient lights, scaled by their intensity.
    pub ambient: [f32; 3],
    /// Non-zero once an environment cube is bound.
    pub has_environment: u32,
}

impl LightUniform {
    pub fn new(ambient: [f32; 3]) -> Self {
        Self {
            ambient,
            has_environment: 0,
        }
    }
}

/// Lighting uniform plus the environment cube meshes reflect.
#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl LightResources {
    /// `environment` is bound until [`set_environment`](Self::set_environment) replaces it.
    pub fn new(device: &wgpu::Device, uniform: LightUniform, environment: &Texture) -> Self {
        let buffer = mk_buffer(device, uniform);
        let bind_group_layout = mk_bind_group_layout(device);
        let sampler = environment.sampler_or_default(device);
        let bind_group = mk_bind_group(device, &bind_group_layout, &buffer, environment, &sampler);
        Self {
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
            sampler,
        }
    }

    pub fn set_environment(&mut self, device: &wgpu::Device, environment: &Texture) {
        self.uniform.has_environment = 1;
        self.bind_group = mk_bind_group(
            device,
            &self.bind_group_layout,
            &self.buffer,
            environment,
            &self.sampler,
        );
    }

    pub fn set_ambient(&mut self, ambient: [f32; 3]) {
        self.uniform.ambient = ambient;
    }

    pub fn write(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_buffer(device: &wgpu::Device, light_uniform: LightUniform) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Light Buffer"),
        contents: bytemuck::cast_slice(&[light_uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            cube_entry(1),
            sampler_entry(2),
        ],
        label: Some("light_bind_group_layout"),
    })
}

pub(crate) fn cube_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::Cube,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

pub(crate) fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

pub fn mk_bind_group(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    light_buffer: &wgpu::Buffer,
    environment: &Texture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&environment.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("light_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_one_vec4() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 16);
        let uniform = LightUniform::new([0.5, 0.5, 0.5]);
        assert_eq!(uniform.has_environment, 0);
    }
}
