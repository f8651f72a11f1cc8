//! Surface materials.
//!
//! A material owns a small uniform buffer, a bind group and any number of texture
//! maps. Every one of those is a GPU resource and is listed by
//! [`Material::disposables`]; plain values (colors, factors, the side) are not.

use anyhow::{Context, Result};
use wgpu::util::DeviceExt;

use crate::data_structures::{
    dispose::{Dispose, Release, Shared},
    texture::{Texture, create_default_sampler},
};

/// Which faces of a mesh are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

impl Side {
    pub const ALL: [Side; 3] = [Side::Front, Side::Back, Side::Double];

    /// Faces wound counter-clockwise are front faces.
    pub fn cull_mode(self) -> Option<wgpu::Face> {
        match self {
            Side::Front => Some(wgpu::Face::Back),
            Side::Back => Some(wgpu::Face::Front),
            Side::Double => None,
        }
    }
}

pub trait Material {
    fn side(&self) -> Side;

    /// `None` once the material has been disposed.
    fn bind_group(&self) -> Option<&wgpu::BindGroup>;

    /// The material's resource-valued fields, each independently optional.
    fn disposables(&mut self) -> Vec<&mut dyn Dispose>;
}

impl Release for wgpu::Buffer {
    fn release(self) {
        self.destroy();
    }
}

impl Release for wgpu::BindGroup {
    fn release(self) {}
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub color: [f32; 4],
    pub emissive: [f32; 4],
    /// metalness, roughness, unlit flag, normal map flag
    pub params: [f32; 4],
}

impl MaterialUniform {
    pub fn basic(color: [f32; 4]) -> Self {
        Self {
            color,
            emissive: [0.0; 4],
            params: [0.0, 1.0, 1.0, 0.0],
        }
    }

    pub fn standard(params: &StandardMaterialParams) -> Self {
        let [r, g, b] = params.emissive;
        Self {
            color: params.color,
            emissive: [r, g, b, 0.0],
            params: [
                params.metalness,
                params.roughness,
                0.0,
                if params.normal_map.holds_resource() { 1.0 } else { 0.0 },
            ],
        }
    }
}

/// Layout, sampler and fallback maps shared by every material.
///
/// Absent maps are bound to the 1x1 fallbacks so all materials share one shader.
#[derive(Clone, Debug)]
pub struct MaterialDefaults {
    pub layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,
    pub white: Shared<Texture>,
    pub flat_normal: Shared<Texture>,
}

impl MaterialDefaults {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            layout: material_layout(device),
            sampler: create_default_sampler(device),
            white: Texture::create_white(device, queue).into(),
            flat_normal: Texture::create_default_normal_map(device, queue).into(),
        }
    }

    fn pick<'a>(
        &'a self,
        map: &'a Shared<Texture>,
        fallback: &'a Shared<Texture>,
    ) -> Result<&'a wgpu::TextureView> {
        map.get()
            .or(fallback.get())
            .map(|texture| &texture.view)
            .context("material fallback textures were already released")
    }
}

impl Dispose for MaterialDefaults {
    fn dispose(&mut self) -> usize {
        self.white.dispose() + self.flat_normal.dispose()
    }

    fn holds_resource(&self) -> bool {
        self.white.holds_resource() || self.flat_normal.holds_resource()
    }
}

pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            texture_entry(2),
            texture_entry(3),
            texture_entry(4),
            texture_entry(5),
        ],
        label: Some("material_bind_group_layout"),
    })
}

struct MaterialMaps<'a> {
    map: &'a Shared<Texture>,
    normal_map: &'a Shared<Texture>,
    emissive_map: &'a Shared<Texture>,
    occlusion_map: &'a Shared<Texture>,
}

fn mk_bind_group(
    device: &wgpu::Device,
    defaults: &MaterialDefaults,
    name: &str,
    uniform: &MaterialUniform,
    maps: MaterialMaps,
) -> Result<(wgpu::Buffer, wgpu::BindGroup)> {
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{name} material uniform")),
        contents: bytemuck::cast_slice(&[*uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &defaults.layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&defaults.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(
                    defaults.pick(maps.map, &defaults.white)?,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(
                    defaults.pick(maps.normal_map, &defaults.flat_normal)?,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(
                    defaults.pick(maps.emissive_map, &defaults.white)?,
                ),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::TextureView(
                    defaults.pick(maps.occlusion_map, &defaults.white)?,
                ),
            },
        ],
        label: Some(&format!("{name} material bind group")),
    });
    Ok((buffer, bind_group))
}

/// Unlit material: `color * map`.
#[derive(Debug)]
pub struct BasicMaterial {
    pub name: String,
    pub color: [f32; 4],
    pub side: Side,
    pub map: Shared<Texture>,
    uniform: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
}

impl BasicMaterial {
    pub fn new(
        device: &wgpu::Device,
        defaults: &MaterialDefaults,
        name: &str,
        map: Shared<Texture>,
        side: Side,
    ) -> Result<Self> {
        let color = [1.0; 4];
        let empty = Shared::empty();
        let (uniform, bind_group) = mk_bind_group(
            device,
            defaults,
            name,
            &MaterialUniform::basic(color),
            MaterialMaps {
                map: &map,
                normal_map: &empty,
                emissive_map: &empty,
                occlusion_map: &empty,
            },
        )?;
        Ok(Self {
            name: name.to_string(),
            color,
            side,
            map,
            uniform: Some(uniform),
            bind_group: Some(bind_group),
        })
    }
}

impl Material for BasicMaterial {
    fn side(&self) -> Side {
        self.side
    }

    fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    fn disposables(&mut self) -> Vec<&mut dyn Dispose> {
        vec![&mut self.bind_group, &mut self.uniform, &mut self.map]
    }
}

/// Inputs of a [`StandardMaterial`], mirroring glTF's metallic-roughness model.
#[derive(Debug)]
pub struct StandardMaterialParams {
    pub color: [f32; 4],
    pub emissive: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
    pub side: Side,
    pub map: Shared<Texture>,
    pub normal_map: Shared<Texture>,
    pub emissive_map: Shared<Texture>,
    pub occlusion_map: Shared<Texture>,
}

impl Default for StandardMaterialParams {
    fn default() -> Self {
        Self {
            color: [1.0; 4],
            emissive: [0.0; 3],
            metalness: 0.0,
            roughness: 1.0,
            side: Side::Front,
            map: Shared::empty(),
            normal_map: Shared::empty(),
            emissive_map: Shared::empty(),
            occlusion_map: Shared::empty(),
        }
    }
}

/// Material lit by the ambient light and reflecting the scene environment.
#[derive(Debug)]
pub struct StandardMaterial {
    pub name: String,
    pub color: [f32; 4],
    pub emissive: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
    pub side: Side,
    pub map: Shared<Texture>,
    pub normal_map: Shared<Texture>,
    pub emissive_map: Shared<Texture>,
    pub occlusion_map: Shared<Texture>,
    uniform: Option<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
}

impl StandardMaterial {
    pub fn new(
        device: &wgpu::Device,
        defaults: &MaterialDefaults,
        name: &str,
        params: StandardMaterialParams,
    ) -> Result<Self> {
        let (uniform, bind_group) = mk_bind_group(
            device,
            defaults,
            name,
            &MaterialUniform::standard(&params),
            MaterialMaps {
                map: &params.map,
                normal_map: &params.normal_map,
                emissive_map: &params.emissive_map,
                occlusion_map: &params.occlusion_map,
            },
        )?;
        Ok(Self {
            name: name.to_string(),
            color: params.color,
            emissive: params.emissive,
            metalness: params.metalness,
            roughness: params.roughness,
            side: params.side,
            map: params.map,
            normal_map: params.normal_map,
            emissive_map: params.emissive_map,
            occlusion_map: params.occlusion_map,
            uniform: Some(uniform),
            bind_group: Some(bind_group),
        })
    }
}

impl Material for StandardMaterial {
    fn side(&self) -> Side {
        self.side
    }

    fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.bind_group.as_ref()
    }

    fn disposables(&mut self) -> Vec<&mut dyn Dispose> {
        vec![
            &mut self.bind_group,
            &mut self.uniform,
            &mut self.map,
            &mut self.normal_map,
            &mut self.emissive_map,
            &mut self.occlusion_map,
        ]
    }
}
