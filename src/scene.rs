//! The scene shown on the page: a skybox that doubles as the environment,
//! two textured spheres, an ambient light and whatever gets [`Scene::add`]ed
//! later, usually the glTF model.
//!
//! [`Scene::destroy`] frees the GPU memory of all of it. A destroyed scene
//! still renders, but only the clear colour.

use cgmath::Point3;
use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    event::{MouseButton, WindowEvent},
};

use crate::{
    camera::{CameraResources, OrbitController, PerspectiveCamera},
    config::{SceneConfig, SphereConfig},
    context::Context,
    data_structures::{
        dispose::{Dispose, Release, Shared},
        geometry::SphereGeometry,
        instance::Instance,
        material::{BasicMaterial, MaterialDefaults, Side},
        scene_graph::{
            AmbientLightNode, ContainerNode, MeshNode, SceneNode, collect_ambient, count_nodes,
            dispose,
        },
        texture::Texture,
    },
    pipelines::{
        light::{LightResources, LightUniform},
        mesh::MeshPipelines,
        skybox::SkyboxPipeline,
    },
    render::{Batches, DrawMesh},
    resources,
};

/// What a scene renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub size: PhysicalSize<u32>,
}

impl From<&Context> for RenderTarget {
    fn from(ctx: &Context) -> Self {
        Self {
            format: ctx.config.format,
            sample_count: ctx.sample_count,
            size: ctx.size(),
        }
    }
}

pub struct Scene {
    root: ContainerNode,
    camera: CameraResources,
    light: LightResources,
    skybox: SkyboxPipeline,
    meshes: MeshPipelines,
    defaults: MaterialDefaults,
    background: Shared<Texture>,
    environment: Shared<Texture>,
    /// Bound as environment until the real one is loaded.
    blank_environment: Option<Texture>,
    destroyed: bool,
}

impl Scene {
    pub async fn new(ctx: &Context, config: &SceneConfig) -> anyhow::Result<Self> {
        let mut scene = Self::with_target(&ctx.device, &ctx.queue, RenderTarget::from(ctx), config)?;
        scene.load_assets(&ctx.device, &ctx.queue, config).await;
        Ok(scene)
    }

    /// Camera, pipelines and lights, without any assets.
    pub fn with_target(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: RenderTarget,
        config: &SceneConfig,
    ) -> anyhow::Result<Self> {
        let PhysicalSize { width, height } = target.size;
        let mut camera = PerspectiveCamera::new(
            config.fov,
            width.max(1) as f32 / height.max(1) as f32,
            config.near,
            config.far,
        );
        camera.position = Point3::new(0.0, 0.0, config.camera_z);
        camera.look_at(Point3::new(0.0, 0.0, 0.0));

        let mut controller = OrbitController::new(width, height);
        controller.enable_damping = config.enable_damping;
        controller.damping_factor = config.damping_factor;
        let camera = CameraResources::new(device, camera, controller);

        let blank_environment = Texture::create_blank_cube(device, queue)?;
        let light = LightResources::new(device, LightUniform::new([0.0; 3]), &blank_environment);
        let defaults = MaterialDefaults::new(device, queue);

        let skybox = SkyboxPipeline::new(
            device,
            target.format,
            target.sample_count,
            &camera.bind_group_layout,
        );
        let meshes = MeshPipelines::new(
            device,
            target.format,
            target.sample_count,
            &camera.bind_group_layout,
            &light.bind_group_layout,
            &defaults.layout,
        );

        let mut scene = Self {
            root: ContainerNode::new("scene"),
            camera,
            light,
            skybox,
            meshes,
            defaults,
            background: Shared::empty(),
            environment: Shared::empty(),
            blank_environment: Some(blank_environment),
            destroyed: false,
        };
        scene.add_lights(config);
        Ok(scene)
    }

    /// Skybox and spheres. Assets that fail to load are logged and left out,
    /// the scene stays usable without them.
    async fn load_assets(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, config: &SceneConfig) {
        match resources::load_cube_texture(&config.skybox_faces, device, queue).await {
            Ok(cube) => self.set_background(device, cube),
            Err(err) => log::error!("Skybox unavailable: {err:#}"),
        }

        for (name, sphere) in [
            ("outer sphere", &config.outer_sphere),
            ("inner sphere", &config.inner_sphere),
        ] {
            let map = match resources::load_texture(&sphere.texture, false, device, queue).await {
                Ok(texture) => Shared::new(texture),
                Err(err) => {
                    log::error!("{name}: {err:#}");
                    Shared::empty()
                }
            };
            match self.sphere(device, name, sphere, map) {
                Ok(node) => self.add(Box::new(node)),
                Err(err) => log::error!("{name}: {err:#}"),
            }
        }
    }

    fn sphere(
        &self,
        device: &wgpu::Device,
        name: &str,
        config: &SphereConfig,
        map: Shared<Texture>,
    ) -> anyhow::Result<MeshNode> {
        let geometry = SphereGeometry::new(config.radius, config.width_segments, config.height_segments)
            .upload(device, name);
        let material = BasicMaterial::new(device, &self.defaults, name, map, config.side)?;
        Ok(MeshNode::new(device, name, geometry, Box::new(material)))
    }

    /// The cube map becomes both the background and the environment meshes reflect.
    pub fn set_background(&mut self, device: &wgpu::Device, cube: Texture) {
        if self.destroyed {
            log::warn!("Scene is destroyed, background ignored");
            cube.release();
            return;
        }
        self.background.dispose();
        self.environment.dispose();

        self.skybox.set_background(device, &cube);
        self.light.set_environment(device, &cube);
        self.background = Shared::new(cube);
        self.environment = self.background.clone();
    }

    fn add_lights(&mut self, config: &SceneConfig) {
        let light = &config.ambient_light;
        let mut node = AmbientLightNode::new(light.color, light.intensity);
        node.set_local_transform(Instance::from(cgmath::Vector3::from(light.position)));
        self.root.add_child(Box::new(node));
    }

    /// Attaches `node` to the scene root. A destroyed scene disposes it right away.
    pub fn add(&mut self, mut node: Box<dyn SceneNode>) {
        if self.destroyed {
            log::warn!("Scene is destroyed, disposing {:?} instead of adding it", node.name());
            dispose(node.as_mut());
            return;
        }
        self.root.add_child(node);
    }

    pub fn root(&self) -> &dyn SceneNode {
        &self.root
    }

    pub fn node_count(&self) -> usize {
        count_nodes(&self.root)
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera.camera
    }

    pub fn defaults(&self) -> &MaterialDefaults {
        &self.defaults
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Orbit step, uniform uploads and transform propagation.
    pub fn prepare(&mut self, queue: &wgpu::Queue) {
        self.camera.update(queue);
        self.root.update_world_transforms(&Instance::new());
        self.root.write_to_buffers(queue);
        self.light.set_ambient(collect_ambient(&self.root));
        self.light.write(queue);
    }

    /// Per-frame hook: [`prepare`](Self::prepare) followed by [`render`](Self::render).
    pub fn update(&mut self, ctx: &Context) -> Result<(), wgpu::SurfaceError> {
        self.prepare(&ctx.queue);
        self.render(ctx)
    }

    pub fn render(&self, ctx: &Context) -> Result<(), wgpu::SurfaceError> {
        let output = ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        self.draw(
            &mut encoder,
            ctx.colour_attachment(&view),
            ctx.depth_attachment(),
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Records the frame: the skybox first, then meshes batched by side.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        colour: wgpu::RenderPassColorAttachment<'_>,
        depth: wgpu::RenderPassDepthStencilAttachment<'_>,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Render Pass"),
            color_attachments: &[Some(colour)],
            depth_stencil_attachment: Some(depth),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        if self.destroyed {
            return;
        }

        self.skybox.draw(&mut render_pass, &self.camera.bind_group);

        let batches: Batches = self.root.get_render().into_iter().collect();
        for side in Side::ALL {
            let batch = batches.get(side);
            if batch.is_empty() {
                continue;
            }
            render_pass.set_pipeline(self.meshes.get(side));
            for instanced in batch {
                render_pass.draw_mesh(instanced, &self.camera.bind_group, &self.light.bind_group);
            }
        }
    }

    /// Keeps the projection in line with the surface.
    pub fn on_resize(&mut self, ctx: &Context) {
        let PhysicalSize { width, height } = ctx.size();
        self.resize(width, height);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.camera.set_aspect(width, height);
        self.camera.controller.resize(width, height);
    }

    pub fn on_mouse_down(&mut self, button: MouseButton) {
        self.camera.controller.on_mouse_down(button);
    }

    pub fn on_mouse_up(&mut self) {
        self.camera.controller.on_mouse_up();
    }

    pub fn on_mouse_move(&mut self, position: PhysicalPosition<f64>) {
        self.camera
            .controller
            .on_mouse_move(position, &self.camera.camera);
    }

    /// Pointer and wheel input for the orbit controls.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                if state.is_pressed() {
                    self.on_mouse_down(*button);
                } else {
                    self.on_mouse_up();
                }
            }
            WindowEvent::CursorMoved { position, .. } => self.on_mouse_move(*position),
            _ => self
                .camera
                .controller
                .handle_window_events(event, &self.camera.camera),
        }
    }

    /// Frees the GPU memory of everything the scene holds.
    ///
    /// The node graph goes first, then the background and environment handles,
    /// then the fallbacks shared by all materials. Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            log::debug!("Scene already destroyed");
            return;
        }
        let started = instant::Instant::now();
        let nodes = self.node_count();
        dispose(&mut self.root);

        self.skybox.clear_background();
        self.background.dispose();
        self.environment.dispose();
        self.blank_environment.dispose();
        self.defaults.dispose();

        self.destroyed = true;
        log::info!(
            "Scene destroyed, {nodes} nodes disposed in {:?}",
            started.elapsed()
        );
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        if !self.destroyed {
            log::debug!("Scene dropped without destroy()");
        }
    }
}
