//! Camera, projection and the orbit controller.
//!
//! The camera derives its position each frame from the orbit controller's
//! spherical coordinates around a target point. Pointer input accumulates
//! into goal values; `update` interpolates toward them (damped if enabled)
//! and applies the distance and polar-angle clamps, so the camera can never
//! leave the configured ranges regardless of input magnitude.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, Vector3};
use instant::Duration;
use wgpu::util::DeviceExt;
use winit::event::{MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// A look-at camera. Position and target are rewritten every frame by the
/// orbit controller.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new(position: Point3<f32>, target: Point3<f32>) -> Self {
        Self {
            position,
            target,
            up: Vector3::unit_y(),
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }
}

/// Perspective projection. Only the aspect ratio changes after startup, in
/// response to surface resizes.
#[derive(Clone, Debug)]
pub struct Projection {
    pub aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, fovy: impl Into<Rad<f32>>, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// Update the aspect ratio. Zero dimensions are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Camera data as it is laid out in the uniform buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.matrix() * camera.view_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Static orbit controller tunables, set once at startup.
#[derive(Clone, Debug)]
pub struct OrbitSettings {
    pub enable_damping: bool,
    /// Fraction of the remaining delta consumed per 60Hz-equivalent frame.
    pub damping_factor: f32,
    pub enable_pan: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar: Rad<f32>,
    pub max_polar: Rad<f32>,
    pub auto_rotate: bool,
    /// Azimuth change per second when auto-rotating.
    pub auto_rotate_speed: Rad<f32>,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            enable_pan: true,
            min_distance: 1.0,
            max_distance: 12.0,
            min_polar: Rad(0.05),
            max_polar: Rad(std::f32::consts::FRAC_PI_2 - 0.05),
            auto_rotate: false,
            auto_rotate_speed: Rad(0.5),
            rotate_speed: 0.005,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

/// Derives the camera position from pointer-drag input around a target point,
/// with damping and angle/distance clamps.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    settings: OrbitSettings,
    target: Point3<f32>,
    azimuth: Rad<f32>,
    polar: Rad<f32>,
    distance: f32,
    goal_azimuth: Rad<f32>,
    goal_polar: Rad<f32>,
    goal_distance: f32,
}

impl OrbitControls {
    /// Build a controller whose spherical state matches the given camera.
    pub fn from_camera(settings: OrbitSettings, camera: &Camera) -> Self {
        let offset = camera.position - camera.target;
        let distance = offset.magnitude().max(1e-4);
        let polar = Rad((offset.y / distance).clamp(-1.0, 1.0).acos());
        let azimuth = Rad(offset.x.atan2(offset.z));
        let mut controls = Self {
            settings,
            target: camera.target,
            azimuth,
            polar,
            distance,
            goal_azimuth: azimuth,
            goal_polar: polar,
            goal_distance: distance,
        };
        controls.clamp_goals();
        controls
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn polar(&self) -> Rad<f32> {
        self.polar
    }

    pub fn azimuth(&self) -> Rad<f32> {
        self.azimuth
    }

    pub fn target(&self) -> Point3<f32> {
        self.target
    }

    fn clamp_goals(&mut self) {
        self.goal_distance = self
            .goal_distance
            .clamp(self.settings.min_distance, self.settings.max_distance);
        self.goal_polar = Rad(self
            .goal_polar
            .0
            .clamp(self.settings.min_polar.0, self.settings.max_polar.0));
    }

    /// Accumulate a pointer drag into the rotation goals.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        self.goal_azimuth -= Rad(dx as f32 * self.settings.rotate_speed);
        self.goal_polar -= Rad(dy as f32 * self.settings.rotate_speed);
        self.clamp_goals();
    }

    /// Accumulate a scroll step into the distance goal. Positive steps zoom in.
    pub fn handle_scroll(&mut self, steps: f32) {
        self.goal_distance *= 0.95f32.powf(steps * self.settings.zoom_speed);
        self.clamp_goals();
    }

    /// Move the orbit target parallel to the view plane. No-op when panning
    /// is disabled.
    pub fn handle_pan(&mut self, dx: f64, dy: f64) {
        if !self.settings.enable_pan {
            return;
        }
        let scale = self.distance * 0.001 * self.settings.pan_speed;
        let right = Vector3::new(self.azimuth.0.cos(), 0.0, -self.azimuth.0.sin());
        self.target -= right * (dx as f32 * scale);
        self.target += Vector3::unit_y() * (dy as f32 * scale);
    }

    /// Window-level input that is relevant to the controller (scroll wheel).
    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        if let WindowEvent::MouseWheel { delta, .. } = event {
            let steps = match delta {
                MouseScrollDelta::LineDelta(_, y) => *y,
                MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
            };
            self.handle_scroll(steps);
        }
    }

    /// Advance the controller and write the resulting position into the
    /// camera. Idempotent when no new input arrived and damping has settled.
    pub fn update(&mut self, camera: &mut Camera, dt: Duration) {
        if self.settings.auto_rotate {
            self.goal_azimuth += self.settings.auto_rotate_speed * dt.as_secs_f32();
        }

        let t = if self.settings.enable_damping {
            // Exponential decay normalized to a 60Hz reference frame so the
            // feel is independent of the actual refresh rate.
            let frames = dt.as_secs_f32() * 60.0;
            1.0 - (1.0 - self.settings.damping_factor).powf(frames)
        } else {
            1.0
        };

        self.azimuth += (self.goal_azimuth - self.azimuth) * t;
        self.polar += (self.goal_polar - self.polar) * t;
        self.distance += (self.goal_distance - self.distance) * t;

        // The goals are already clamped on input, the interpolated state is
        // clamped again so the invariant holds at every instant.
        self.distance = self
            .distance
            .clamp(self.settings.min_distance, self.settings.max_distance);
        self.polar = Rad(self
            .polar
            .0
            .clamp(self.settings.min_polar.0, self.settings.max_polar.0));

        let offset = Vector3::new(
            self.distance * self.polar.0.sin() * self.azimuth.0.sin(),
            self.distance * self.polar.0.cos(),
            self.distance * self.polar.0.sin() * self.azimuth.0.cos(),
        );
        camera.position = self.target + offset;
        camera.target = self.target;
    }
}

/// GPU-side camera resources, owned by the context.
#[derive(Debug)]
pub struct CameraResources {
    pub camera: Camera,
    pub controller: OrbitControls,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
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

    pub fn new(
        device: &wgpu::Device,
        camera: Camera,
        controller: OrbitControls,
        projection: &Projection,
    ) -> Self {
        let mut uniform = CameraUniform::new();
        uniform.update_view_proj(&camera, projection);

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = Self::layout(device);
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Deg;

    fn controls() -> (OrbitControls, Camera) {
        let camera = Camera::new(Point3::new(0.0, 2.0, 4.0), Point3::new(0.0, 1.0, 0.0));
        let controls = OrbitControls::from_camera(OrbitSettings::default(), &camera);
        (controls, camera)
    }

    #[test]
    fn resize_updates_aspect_ratio() {
        let mut projection = Projection::new(800, 600, Deg(45.0), 0.1, 500.0);
        projection.resize(1920, 1080);
        assert!((projection.aspect - 1920.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn resize_ignores_zero_dimensions() {
        let mut projection = Projection::new(800, 600, Deg(45.0), 0.1, 500.0);
        projection.resize(0, 1080);
        assert!((projection.aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn distance_stays_clamped_for_any_input() {
        let (mut controls, mut camera) = controls();
        controls.handle_scroll(-1e6);
        for _ in 0..100 {
            controls.update(&mut camera, Duration::from_millis(16));
        }
        let settings = OrbitSettings::default();
        assert!(controls.distance() <= settings.max_distance + 1e-4);

        controls.handle_scroll(1e6);
        for _ in 0..100 {
            controls.update(&mut camera, Duration::from_millis(16));
        }
        assert!(controls.distance() >= settings.min_distance - 1e-4);
    }

    #[test]
    fn polar_angle_stays_clamped_for_any_input() {
        let (mut controls, mut camera) = controls();
        let settings = OrbitSettings::default();
        controls.handle_mouse(0.0, -1e9);
        for _ in 0..100 {
            controls.update(&mut camera, Duration::from_millis(16));
        }
        assert!(controls.polar().0 <= settings.max_polar.0 + 1e-4);
        assert!(controls.polar().0 >= settings.min_polar.0 - 1e-4);

        controls.handle_mouse(0.0, 1e9);
        for _ in 0..100 {
            controls.update(&mut camera, Duration::from_millis(16));
        }
        assert!(controls.polar().0 >= settings.min_polar.0 - 1e-4);
    }

    #[test]
    fn update_is_idempotent_without_input() {
        let (mut controls, mut camera) = controls();
        // Let damping settle first.
        for _ in 0..600 {
            controls.update(&mut camera, Duration::from_millis(16));
        }
        let before = camera.position;
        controls.update(&mut camera, Duration::from_millis(16));
        assert!((camera.position - before).magnitude() < 1e-4);
    }

    #[test]
    fn auto_rotate_advances_azimuth() {
        let camera = Camera::new(Point3::new(0.0, 2.0, 4.0), Point3::new(0.0, 1.0, 0.0));
        let settings = OrbitSettings {
            auto_rotate: true,
            enable_damping: false,
            ..Default::default()
        };
        let mut controls = OrbitControls::from_camera(settings, &camera);
        let start = controls.azimuth();
        let mut camera = camera;
        controls.update(&mut camera, Duration::from_millis(500));
        assert!((controls.azimuth() - start).0.abs() > 0.1);
    }

    #[test]
    fn pan_disabled_keeps_target() {
        let camera = Camera::new(Point3::new(0.0, 2.0, 4.0), Point3::new(0.0, 1.0, 0.0));
        let settings = OrbitSettings {
            enable_pan: false,
            ..Default::default()
        };
        let mut controls = OrbitControls::from_camera(settings, &camera);
        let before = controls.target();
        controls.handle_pan(100.0, 100.0);
        assert_eq!(controls.target(), before);
    }
}
