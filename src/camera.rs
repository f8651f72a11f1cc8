//! Perspective camera, its GPU uniform and orbit controls.
//!
//! - [`PerspectiveCamera`] holds the eye, the look-at target and the frustum
//! - [`CameraUniform`] is the view/projection data uploaded to shaders
//! - [`OrbitController`] turns pointer and wheel input into orbiting, panning
//!   and dollying around the target, optionally with damping

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix4, Point3, SquareMatrix, Vector3, Vector4};
use wgpu::util::DeviceExt;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Keeps the polar angle away from the poles where `look_at` degenerates.
const EPS: f32 = 1e-6;

#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view.
    pub fovy: cgmath::Deg<f32>,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl PerspectiveCamera {
    pub fn new(fovy: f32, aspect: f32, znear: f32, zfar: f32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 0.0),
            target: Point3::new(0.0, 0.0, -1.0),
            up: Vector3::unit_y(),
            fovy: cgmath::Deg(fovy),
            aspect,
            znear,
            zfar,
        }
    }

    pub fn look_at(&mut self, target: Point3<f32>) {
        self.target = target;
    }

    /// Ignores degenerate sizes (minimized windows report 0).
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn build_view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
    /// Inverse of the view-projection without translation, used by the skybox
    /// to turn clip space positions into view directions.
    pub inv_sky_view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
            inv_sky_view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &PerspectiveCamera) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = camera.build_view_projection_matrix().into();

        let mut view = camera.view_matrix();
        view.w = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let sky = camera.projection_matrix() * view;
        self.inv_sky_view_proj = sky.invert().unwrap_or(Matrix4::identity()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera state plus the GPU objects its uniform lives in.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: PerspectiveCamera,
    pub controller: OrbitController,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(
        device: &wgpu::Device,
        camera: PerspectiveCamera,
        controller: OrbitController,
    ) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = camera_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        Self {
            camera,
            controller,
            uniform,
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Applies pending controller input and uploads the camera uniform.
    pub fn update(&mut self, queue: &wgpu::Queue) {
        self.controller.update(&mut self.camera);
        self.uniform.update_view_proj(&self.camera);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn camera_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DragState {
    None,
    Rotate,
    Pan,
}

/// Orbits the camera around its target.
///
/// Input only accumulates deltas; [`update`](Self::update) applies them once per
/// frame. With damping enabled only `damping_factor` of the pending rotation and
/// pan is applied per update and the rest decays, which gives the motion inertia.
#[derive(Debug)]
pub struct OrbitController {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
    pan_offset: Vector3<f32>,
    drag: DragState,
    cursor: Option<PhysicalPosition<f64>>,
    viewport: (u32, u32),
}

impl OrbitController {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
            pan_offset: Vector3::new(0.0, 0.0, 0.0),
            drag: DragState::None,
            cursor: None,
            viewport: (width, height),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn viewport_height(&self) -> f32 {
        self.viewport.1.max(1) as f32
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.theta_delta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.phi_delta -= angle;
    }

    /// Zoom towards the target; steps are wheel notches, positive moves away.
    pub fn dolly(&mut self, steps: f32) {
        let zoom_scale = 0.95f32.powf(self.zoom_speed);
        self.scale /= zoom_scale.powf(steps);
    }

    /// Moves the target in screen space by a pointer delta in pixels.
    pub fn pan(&mut self, dx: f32, dy: f32, camera: &PerspectiveCamera) {
        let offset = camera.position - camera.target;
        let forward = -offset.normalize();
        let right = forward.cross(camera.up).normalize();
        let up = right.cross(forward);
        // visible half height at the target distance
        let target_distance = offset.magnitude() * (cgmath::Rad::from(camera.fovy).0 / 2.0).tan();
        let height = self.viewport_height();
        self.pan_offset += right * (-2.0 * dx * target_distance / height * self.pan_speed);
        self.pan_offset += up * (2.0 * dy * target_distance / height * self.pan_speed);
    }

    pub fn on_mouse_down(&mut self, button: MouseButton) {
        self.drag = match button {
            MouseButton::Left => DragState::Rotate,
            MouseButton::Right | MouseButton::Middle => DragState::Pan,
            _ => self.drag,
        };
    }

    pub fn on_mouse_up(&mut self) {
        self.drag = DragState::None;
    }

    pub fn on_mouse_move(&mut self, position: PhysicalPosition<f64>, camera: &PerspectiveCamera) {
        let previous = self.cursor.replace(position);
        let Some(previous) = previous else {
            return;
        };
        let dx = (position.x - previous.x) as f32;
        let dy = (position.y - previous.y) as f32;
        let height = self.viewport_height();
        match self.drag {
            DragState::Rotate => {
                self.rotate_left(2.0 * PI * dx / height * self.rotate_speed);
                self.rotate_up(2.0 * PI * dy / height * self.rotate_speed);
            }
            DragState::Pan => self.pan(dx, dy, camera),
            DragState::None => (),
        }
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent, camera: &PerspectiveCamera) {
        match event {
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => self.on_mouse_down(*button),
                ElementState::Released => self.on_mouse_up(),
            },
            WindowEvent::CursorMoved { position, .. } => self.on_mouse_move(*position, camera),
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.on_mouse_up();
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -*y,
                    MouseScrollDelta::PixelDelta(pos) => -(pos.y as f32) / 100.0,
                };
                if steps != 0.0 {
                    self.dolly(steps);
                }
            }
            _ => (),
        }
    }

    /// Applies pending input to `camera`. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - camera.target;
        let radius = offset.magnitude();
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            PI / 2.0
        };

        let factor = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        theta += self.theta_delta * factor;
        phi = (phi + self.phi_delta * factor).clamp(EPS, PI - EPS);
        let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
        camera.target += self.pan_offset * factor;

        let offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        let previous = camera.position;
        camera.position = camera.target + offset;

        if self.enable_damping {
            self.theta_delta *= 1.0 - self.damping_factor;
            self.phi_delta *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
            self.pan_offset = Vector3::new(0.0, 0.0, 0.0);
        }
        self.scale = 1.0;

        (camera.position - previous).magnitude2() > EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 10000.0);
        camera.position = Point3::new(0.0, 0.0, 1400.0);
        camera.look_at(Point3::new(0.0, 0.0, 0.0));
        camera
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-2
    }

    #[test]
    fn aspect_ignores_zero_sizes() {
        let mut camera = camera();
        camera.set_aspect(1600, 800);
        assert_eq!(camera.aspect, 2.0);
        camera.set_aspect(0, 800);
        assert_eq!(camera.aspect, 2.0);
    }

    #[test]
    fn origin_projects_to_the_middle_of_the_screen() {
        let camera = camera();
        let clip = camera.build_view_projection_matrix() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(close(clip.x / clip.w, 0.0));
        assert!(close(clip.y / clip.w, 0.0));
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth), "{depth}");
    }

    #[test]
    fn rotating_left_orbits_around_the_target() {
        let mut camera = camera();
        let mut controller = OrbitController::new(800, 600);
        controller.rotate_left(PI / 2.0);

        assert!(controller.update(&mut camera));

        assert!(close(camera.position.x, -1400.0), "{:?}", camera.position);
        assert!(close(camera.position.y, 0.0));
        assert!(close(camera.position.z, 0.0));
        assert!(!controller.update(&mut camera));
    }

    #[test]
    fn damping_applies_rotation_gradually() {
        let mut camera = camera();
        let mut controller = OrbitController::new(800, 600);
        controller.enable_damping = true;
        controller.rotate_left(PI / 2.0);

        controller.update(&mut camera);
        assert!(camera.position.x < 0.0);
        assert!(camera.position.x > -1400.0 * 0.1);

        for _ in 0..1000 {
            controller.update(&mut camera);
        }
        assert!(close(camera.position.x, -1400.0), "{:?}", camera.position);
    }

    #[test]
    fn wheel_dollies_out_and_in() {
        let mut camera = camera();
        let mut controller = OrbitController::new(800, 600);

        controller.dolly(1.0);
        controller.update(&mut camera);
        assert!(close(camera.position.z, 1400.0 / 0.95));

        controller.dolly(-1.0);
        controller.update(&mut camera);
        assert!(close(camera.position.z, 1400.0));
    }

    #[test]
    fn distance_is_clamped() {
        let mut camera = camera();
        let mut controller = OrbitController::new(800, 600);
        controller.max_distance = 1500.0;
        controller.dolly(10.0);
        controller.update(&mut camera);
        assert!(close(camera.position.z, 1500.0));
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let mut camera = camera();
        let mut controller = OrbitController::new(800, 600);
        controller.rotate_up(-4.0 * PI);
        controller.update(&mut camera);
        assert!(camera.position.y < -1399.0);
        assert!(camera.position.y > -1400.01);
    }

    #[test]
    fn left_drag_rotates_by_viewport_fraction() {
        let mut camera = camera();
        let mut controller = OrbitController::new(800, 600);
        controller.on_mouse_down(MouseButton::Left);
        controller.on_mouse_move(PhysicalPosition::new(100.0, 100.0), &camera);
        // a drag over a quarter of the height turns by 90°
        controller.on_mouse_move(PhysicalPosition::new(250.0, 100.0), &camera);
        controller.on_mouse_up();
        controller.on_mouse_move(PhysicalPosition::new(400.0, 100.0), &camera);

        controller.update(&mut camera);

        assert!(close(camera.position.x, -1400.0), "{:?}", camera.position);
    }

    #[test]
    fn right_drag_pans_the_target() {
        let mut camera = camera();
        let mut controller = OrbitController::new(800, 600);
        controller.on_mouse_down(MouseButton::Right);
        controller.on_mouse_move(PhysicalPosition::new(100.0, 100.0), &camera);
        controller.on_mouse_move(PhysicalPosition::new(110.0, 100.0), &camera);

        controller.update(&mut camera);

        // dragging right moves the scene right, i.e. the target left
        assert!(camera.target.x < 0.0);
        assert!(close(camera.target.y, 0.0));
        assert!(close(camera.position.z - camera.target.z, 1400.0));
    }

    #[test]
    fn sky_matrix_ignores_camera_translation() {
        let mut near = camera();
        let mut far = camera();
        near.position = Point3::new(0.0, 0.0, 10.0);
        far.position = Point3::new(0.0, 0.0, 5000.0);
        let mut a = CameraUniform::new();
        let mut b = CameraUniform::new();
        a.update_view_proj(&near);
        b.update_view_proj(&far);
        for (ra, rb) in a.inv_sky_view_proj.iter().zip(b.inv_sky_view_proj.iter()) {
            for (x, y) in ra.iter().zip(rb.iter()) {
                assert!((x - y).abs() < 1e-4);
            }
        }
    }
}
