//! Scene data: nodes, geometry, materials, textures and how they are freed.
//!
//! - `dispose` defines releasing GPU objects and shared handles
//! - `geometry` holds vertex formats, mesh buffers and sphere generation
//! - `instance` holds node transforms and their GPU form
//! - `material` defines the material trait and the basic/standard materials
//! - `scene_graph` enables hierarchical scene organization and teardown
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod dispose;
pub mod geometry;
pub mod instance;
pub mod material;
pub mod scene_graph;
pub mod texture;
