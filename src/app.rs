//! Window, event loop and the scene's lifecycle.
//!
//! [`run`] opens a window (on the web: a canvas inside the page's scene
//! container), sets up the GPU and the scene asynchronously, then loads the
//! model in the background. Closing the window destroys the scene before
//! the loop exits.

use std::{fmt::Debug, sync::Arc};

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

use crate::{
    config::SceneConfig,
    context::Context,
    data_structures::scene_graph::SceneNode,
    resources,
    scene::Scene,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub enum AppEvent {
    /// Sent by the web build once the async setup finished.
    #[allow(dead_code)]
    Initialized { ctx: Context, scene: Scene },
    ModelLoaded(anyhow::Result<Box<dyn SceneNode>>),
}

impl Debug for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { .. } => f.write_str("Initialized"),
            Self::ModelLoaded(Ok(node)) => f.debug_tuple("ModelLoaded").field(&node.name()).finish(),
            Self::ModelLoaded(Err(err)) => f.debug_tuple("ModelLoaded").field(err).finish(),
        }
    }
}

struct AppState {
    ctx: Context,
    scene: Scene,
}

pub struct App {
    config: SceneConfig,
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<AppEvent>,
    state: Option<AppState>,
    started: bool,
}

impl App {
    pub fn new(event_loop: &EventLoop<AppEvent>, config: SceneConfig) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy: event_loop.create_proxy(),
            state: None,
            started: false,
        })
    }

    fn initialized(&mut self, ctx: Context, scene: Scene) {
        let mut state = AppState { ctx, scene };
        let size = state.ctx.window.inner_size();
        if state.ctx.resize(size, state.ctx.window.scale_factor()) {
            state.scene.on_resize(&state.ctx);
        }
        state.ctx.window.request_redraw();
        self.load_model(&state);
        self.state = Some(state);
    }

    /// Loads the model and delivers it as [`AppEvent::ModelLoaded`]. On the web
    /// this runs in the background while the scene already renders.
    fn load_model(&self, state: &AppState) {
        let device = state.ctx.device.clone();
        let queue = state.ctx.queue.clone();
        let defaults = state.scene.defaults().clone();
        let path = self.config.model_path.clone();
        let proxy = self.proxy.clone();
        let load = async move {
            let model = resources::load_model_gltf(&path, &device, &queue, &defaults).await;
            if proxy.send_event(AppEvent::ModelLoaded(model)).is_err() {
                log::warn!("Event loop closed before {path} finished loading");
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        self.async_runtime.block_on(load);

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(load);
    }
}

/// Appends the canvas to the scene container and lets it fill the container.
///
/// The canvas follows the container's CSS size, so winit's resize observer
/// reports container resizes as [`WindowEvent::Resized`].
#[cfg(target_arch = "wasm32")]
fn mount_canvas(window: &Window, container_class: &str) -> anyhow::Result<()> {
    use anyhow::Context as _;
    use wasm_bindgen::JsCast;
    use winit::platform::web::WindowExtWebSys;

    let canvas = window.canvas().context("window has no canvas")?;
    let document = web_sys::window()
        .and_then(|window| window.document())
        .context("no document")?;
    let parent: web_sys::HtmlElement = match document
        .get_elements_by_class_name(container_class)
        .item(0)
        .and_then(|container| container.dyn_into().ok())
    {
        Some(container) => container,
        None => {
            log::warn!("No element with class {container_class:?}, appending the canvas to <body>");
            document.body().context("document has no body")?
        }
    };

    let style = canvas.style();
    for (property, value) in [("display", "block"), ("width", "100%"), ("height", "100%")] {
        style
            .set_property(property, value)
            .map_err(|_| anyhow::anyhow!("failed to set canvas {property}"))?;
    }
    parent
        .append_child(&canvas)
        .map_err(|_| anyhow::anyhow!("failed to append the canvas"))?;
    log::debug!(
        "canvas mounted in a {}x{} container",
        parent.offset_width(),
        parent.offset_height()
    );
    Ok(())
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        let window_attributes = Window::default_attributes().with_title("Scene");
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create a window: {err}");
                event_loop.exit();
                return;
            }
        };

        #[cfg(target_arch = "wasm32")]
        if let Err(err) = mount_canvas(&window, &self.config.container_class) {
            log::error!("Failed to mount the canvas: {err:#}");
        }

        let config = self.config.clone();
        let init_future = async move {
            let ctx = Context::new(window, &config).await?;
            let scene = Scene::new(&ctx, &config).await?;
            anyhow::Ok((ctx, scene))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok((ctx, scene)) => self.initialized(ctx, scene),
                Err(err) => {
                    log::error!("App initialization failed: {err:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match init_future.await {
                    Ok((ctx, scene)) => {
                        if proxy
                            .send_event(AppEvent::Initialized { ctx, scene })
                            .is_err()
                        {
                            log::error!("Event loop closed during initialization");
                        }
                    }
                    Err(err) => log::error!("App initialization failed: {err:#}"),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::Initialized { ctx, scene } => self.initialized(ctx, scene),
            AppEvent::ModelLoaded(Ok(model)) => match &mut self.state {
                Some(state) => state.scene.add(model),
                None => log::warn!("Model loaded without a scene"),
            },
            AppEvent::ModelLoaded(Err(err)) => {
                log::error!("Failed to load {}: {err:#}", self.config.model_path)
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        state.scene.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                state.scene.destroy();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if state.ctx.resize(size, state.ctx.window.scale_factor()) {
                    state.scene.on_resize(&state.ctx);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let size = state.ctx.window.inner_size();
                if state.ctx.resize(size, scale_factor) {
                    state.scene.on_resize(&state.ctx);
                }
            }
            WindowEvent::RedrawRequested => {
                state.ctx.window.request_redraw();
                match state.scene.update(&state.ctx) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        let scale_factor = state.ctx.window.scale_factor();
                        state.ctx.resize(size, scale_factor);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
        // the embedding page may have installed a logger already
        let _ = console_log::init_with_level(log::Level::Info);
    }
}

/// Opens the window and runs the scene until it is closed.
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    init_logging();

    let event_loop: EventLoop<AppEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}

/// Entry point of the web build.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    run(SceneConfig::default()).map_err(|err| JsValue::from_str(&format!("{err:#}")))
}
