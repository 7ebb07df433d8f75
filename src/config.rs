//! Viewer configuration.
//!
//! All tunables are plain values set once before [`crate::viewer::run`] is
//! called. Nothing here is re-read after startup except the model offset,
//! which is applied when the asset finishes loading.

use cgmath::{Deg, Point3, Vector3};

use crate::camera::OrbitSettings;

/// Camera start position and projection parameters.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 2.0, 4.0),
            target: Point3::new(0.0, 1.0, 0.0),
            fovy: Deg(45.0),
            znear: 0.1,
            zfar: 500.0,
        }
    }
}

/// Ground plane construction parameters.
#[derive(Clone, Debug)]
pub struct GroundConfig {
    pub size: f32,
    pub subdivisions: u32,
    pub color: [f32; 4],
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            size: 20.0,
            subdivisions: 32,
            color: [0.45, 0.45, 0.45, 1.0],
        }
    }
}

/// Spot light parameters. The light is static after creation.
#[derive(Clone, Debug)]
pub struct LightConfig {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub color: [f32; 3],
    pub intensity: f32,
    /// Half-angle of the light cone.
    pub angle: Deg<f32>,
    /// Softness of the cone edge in `[0, 1]`.
    pub penumbra: f32,
    /// Depth offset applied when sampling the shadow map, against acne.
    pub shadow_bias: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: Point3::new(3.0, 6.0, 2.0),
            target: Point3::new(0.0, 0.0, 0.0),
            color: [1.0, 1.0, 1.0],
            intensity: 1.4,
            angle: Deg(30.0),
            penumbra: 0.4,
            shadow_bias: 0.002,
        }
    }
}

/// Top-level viewer configuration, passed to [`crate::viewer::run`].
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub title: String,
    /// Base path that relative asset references are resolved against.
    pub asset_base: String,
    /// Model file to load, relative to `asset_base`.
    pub model_file: String,
    /// Translation applied to the model root once it is attached.
    pub model_offset: Vector3<f32>,
    pub clear_colour: wgpu::Color,
    /// DOM id of the progress indicator element (WASM only).
    pub progress_element: String,
    pub camera: CameraConfig,
    pub controls: OrbitSettings,
    pub ground: GroundConfig,
    pub light: LightConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "vantage".to_string(),
            asset_base: "assets".to_string(),
            model_file: "scene.gltf".to_string(),
            model_offset: Vector3::new(0.0, 1.05, -1.0),
            clear_colour: wgpu::Color::BLACK,
            progress_element: "progress".to_string(),
            camera: CameraConfig::default(),
            controls: OrbitSettings::default(),
            ground: GroundConfig::default(),
            light: LightConfig::default(),
        }
    }
}
