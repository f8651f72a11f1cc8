use crate::data_structures::material::Side;

/// A textured sphere placed at the origin.
#[derive(Clone, Debug, PartialEq)]
pub struct SphereConfig {
    /// Path below `assets/`.
    pub texture: String,
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub side: Side,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AmbientLightConfig {
    pub color: [f32; 3],
    pub intensity: f32,
    /// Ambient light ignores its position; it is kept so the node can be placed like any other.
    pub position: [f32; 3],
}

/// Everything the scene needs to know before it starts.
///
/// Asset paths are relative to `assets/`.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
    /// Class of the DOM element the canvas is appended to (web only).
    pub container_class: String,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub camera_z: f32,
    pub near: f32,
    pub far: f32,
    pub max_pixel_ratio: f64,
    pub antialias: bool,
    pub alpha: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub model_path: String,
    /// Order: +x, -x, +y, -y, +z, -z.
    pub skybox_faces: [String; 6],
    pub outer_sphere: SphereConfig,
    pub inner_sphere: SphereConfig,
    pub ambient_light: AmbientLightConfig,
}

impl SceneConfig {
    pub fn sample_count(&self) -> u32 {
        if self.antialias { 4 } else { 1 }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        let face = |name: &str| format!("textures/Yokohama/{name}.jpg");
        Self {
            container_class: "threejs__canvas__container".to_string(),
            fov: 75.0,
            camera_z: 1400.0,
            near: 0.1,
            far: 10000.0,
            max_pixel_ratio: 2.0,
            antialias: true,
            alpha: true,
            enable_damping: true,
            damping_factor: 0.05,
            model_path: "models/cat.glb".to_string(),
            skybox_faces: [
                face("posx"),
                face("negx"),
                face("posy"),
                face("negy"),
                face("posz"),
                face("negz"),
            ],
            outer_sphere: SphereConfig {
                texture: "textures/earthmap1k.jpg".to_string(),
                radius: 640.0,
                width_segments: 64,
                height_segments: 32,
                side: Side::Double,
            },
            inner_sphere: SphereConfig {
                texture: "textures/Harbor.jpg".to_string(),
                radius: 40.0,
                width_segments: 32,
                height_segments: 16,
                side: Side::Back,
            },
            ambient_light: AmbientLightConfig {
                color: [1.0, 1.0, 1.0],
                intensity: 1.0,
                position: [10.0, 10.0, 0.0],
            },
        }
    }
}
