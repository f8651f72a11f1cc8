use scene_canvas::{config::SceneConfig, data_structures::texture::Texture, scene::RenderTarget};
use winit::dpi::PhysicalSize;

pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
pub const SIZE: PhysicalSize<u32> = PhysicalSize::new(64, 64);

/// A device without a surface. `None` on machines without any adapter.
pub fn headless() -> Option<(wgpu::Device, wgpu::Queue)> {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to start the test runtime");
    runtime.block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .ok()
    })
}

pub fn target() -> RenderTarget {
    RenderTarget {
        format: FORMAT,
        sample_count: 1,
        size: SIZE,
    }
}

pub fn config() -> SceneConfig {
    SceneConfig {
        antialias: false,
        ..Default::default()
    }
}

/// Colour and depth textures matching [`target`].
pub struct Offscreen {
    pub colour: wgpu::Texture,
    pub colour_view: wgpu::TextureView,
    pub depth: Texture,
}

impl Offscreen {
    pub fn new(device: &wgpu::Device) -> Self {
        let colour = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Output Texture"),
            size: wgpu::Extent3d {
                width: SIZE.width,
                height: SIZE.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let colour_view = colour.create_view(&wgpu::TextureViewDescriptor::default());
        let depth =
            Texture::create_depth_texture(device, [SIZE.width, SIZE.height], 1, "test depth");
        Self {
            colour,
            colour_view,
            depth,
        }
    }

    pub fn colour_attachment(&self) -> wgpu::RenderPassColorAttachment<'_> {
        wgpu::RenderPassColorAttachment {
            view: &self.colour_view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                store: wgpu::StoreOp::Store,
            },
        }
    }

    pub fn depth_attachment(&self) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }
}

/// Runs the test body with a headless device, or skips it without an adapter.
#[macro_export]
macro_rules! gpu_test {
    (|$device:ident, $queue:ident| $body:block) => {{
        match crate::common::test_utils::headless() {
            Some(($device, $queue)) => $body,
            None => eprintln!("No graphics adapter available, skipping"),
        }
    }};
}
