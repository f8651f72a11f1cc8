use std::sync::Arc;

use anyhow::{Context as _, Result};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{config::SceneConfig, data_structures::texture};

/// Window, surface and device plus the render targets sized to the surface.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    /// Multisampled colour target; `None` without antialiasing.
    pub(crate) msaa_texture: Option<texture::Texture>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub sample_count: u32,
    pub clear_colour: wgpu::Color,
    pub max_pixel_ratio: f64,
}

/// Size of the drawing buffer for a window of `physical` pixels.
///
/// The CSS size (`physical / scale_factor`) is multiplied by the scale factor
/// capped at `max_ratio`, so very dense displays don't render at full
/// resolution.
pub fn drawing_buffer_size(
    physical: PhysicalSize<u32>,
    scale_factor: f64,
    max_ratio: f64,
) -> PhysicalSize<u32> {
    if scale_factor <= 0.0 {
        return physical;
    }
    let ratio = scale_factor.min(max_ratio);
    let scale = |px: u32| ((px as f64 / scale_factor) * ratio).round() as u32;
    PhysicalSize::new(scale(physical.width), scale(physical.height))
}

impl Context {
    pub async fn new(window: Arc<Window>, scene_config: &SceneConfig) -> Result<Self> {
        let size = window.inner_size();

        // The instance is a handle to our GPU
        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No graphics adapter is compatible with the surface")?;
        log::info!("device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Shaders output linear colour, so prefer an sRGB surface.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("Surface reports no supported formats")?;
        let alpha_mode = if scene_config.alpha
            && surface_caps
                .alpha_modes
                .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps.alpha_modes[0]
        };

        let mut sample_count = scene_config.sample_count();
        if sample_count > 1
            && !adapter
                .get_texture_format_features(surface_format)
                .flags
                .sample_count_supported(sample_count)
        {
            log::warn!("{sample_count}x MSAA unsupported for {surface_format:?}, antialiasing disabled");
            sample_count = 1;
        }

        let size = Self::surface_size(size, window.scale_factor(), scene_config.max_pixel_ratio);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            sample_count,
            "depth_texture",
        );
        let msaa_texture = (sample_count > 1).then(|| {
            texture::Texture::create_msaa_texture(
                &device,
                [config.width, config.height],
                config.format,
                sample_count,
            )
        });

        let clear_colour = if alpha_mode == wgpu::CompositeAlphaMode::Opaque {
            wgpu::Color::BLACK
        } else {
            wgpu::Color::TRANSPARENT
        };

        Ok(Self {
            window,
            depth_texture,
            msaa_texture,
            surface,
            device,
            queue,
            config,
            sample_count,
            clear_colour,
            max_pixel_ratio: scene_config.max_pixel_ratio,
        })
    }

    /// The canvas drawing buffer is independent of its CSS size on the web;
    /// native surfaces have to match the window.
    fn surface_size(
        physical: PhysicalSize<u32>,
        scale_factor: f64,
        max_pixel_ratio: f64,
    ) -> PhysicalSize<u32> {
        if cfg!(target_arch = "wasm32") {
            drawing_buffer_size(physical, scale_factor, max_pixel_ratio)
        } else {
            physical
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.config.width, self.config.height)
    }

    /// Reconfigures the surface and recreates the size dependent targets.
    /// Returns `false` for zero sizes, which happen while minimized.
    pub fn resize(&mut self, physical: PhysicalSize<u32>, scale_factor: f64) -> bool {
        let size = Self::surface_size(physical, scale_factor, self.max_pixel_ratio);
        if size.width == 0 || size.height == 0 {
            return false;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.reconfigure();
        true
    }

    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
        let size = [self.config.width, self.config.height];
        self.depth_texture = texture::Texture::create_depth_texture(
            &self.device,
            size,
            self.sample_count,
            "depth_texture",
        );
        if self.sample_count > 1 {
            self.msaa_texture = Some(texture::Texture::create_msaa_texture(
                &self.device,
                size,
                self.config.format,
                self.sample_count,
            ));
        }
    }

    /// Colour attachment for a frame: the MSAA target resolving into `frame`,
    /// or `frame` itself.
    pub fn colour_attachment<'a>(
        &'a self,
        frame: &'a wgpu::TextureView,
    ) -> wgpu::RenderPassColorAttachment<'a> {
        let (view, resolve_target) = match &self.msaa_texture {
            Some(msaa) => (&msaa.view, Some(frame)),
            None => (frame, None),
        };
        wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(self.clear_colour),
                store: wgpu::StoreOp::Store,
            },
        }
    }

    pub fn depth_attachment(&self) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth_texture.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }
}
