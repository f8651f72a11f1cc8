//! scene-canvas
//!
//! A single interactive 3D scene for the desktop and the web: a skybox that
//! also lights the scene as environment, two textured spheres, an ambient
//! light and a glTF model, viewed through orbit controls. Every GPU resource
//! the scene allocates can be released explicitly with [`Scene::destroy`],
//! which walks the scene graph and frees geometry, materials and textures.
//!
//! High-level modules
//! - `app`: window, event loop and scene lifecycle (`run`, web `start`)
//! - `camera`: perspective camera, its uniform and the orbit controller
//! - `config`: the settings the scene starts with
//! - `context`: window surface, device, queue and render targets
//! - `data_structures`: scene graph, geometry, materials, textures, disposal
//! - `pipelines`: the mesh and skybox pipelines and the lighting uniform
//! - `render`: batching of drawables per pipeline
//! - `resources`: loading textures, cube maps and glTF models
//! - `scene`: building, updating, rendering and destroying the scene
//!

pub mod app;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

pub use app::run;
pub use config::SceneConfig;
pub use data_structures::{
    dispose::{Dispose, Release, Shared},
    scene_graph::{SceneNode, dispose},
};
pub use scene::Scene;

// Re-exports commonly used types for convenience in downstream code.
pub use winit::dpi::PhysicalPosition;
pub use winit::event::WindowEvent;
