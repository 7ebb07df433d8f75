//! GPU context: device, surface and all render resources.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use winit::window::Window;

use crate::camera::{self, CameraResources, OrbitControls, Projection};
use crate::config::ViewerConfig;
use crate::mesh;
use crate::pipelines::light::LightResources;
use crate::pipelines::scene::{self, SAMPLE_COUNT};
use crate::pipelines::shadow;
use crate::texture::Texture;

/// Everything needed to render a frame: the wgpu handles, surface
/// configuration, camera and light resources and the two pipelines.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub clear_colour: wgpu::Color,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub(crate) depth_texture: Texture,
    pub(crate) msaa_texture: Texture,
    pub(crate) material_layout: wgpu::BindGroupLayout,
    pub(crate) scene_pipeline: wgpu::RenderPipeline,
    pub(crate) shadow_pipeline: wgpu::RenderPipeline,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer_config: &ViewerConfig) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        log::info!("using adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("device request failed")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shaders assume an sRGB surface; colours come out darker on a
        // linear format.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera = camera::Camera::new(viewer_config.camera.position, viewer_config.camera.target);
        let projection = Projection::new(
            config.width,
            config.height,
            viewer_config.camera.fovy,
            viewer_config.camera.znear,
            viewer_config.camera.zfar,
        );
        let controller = OrbitControls::from_camera(viewer_config.controls.clone(), &camera);
        let camera = CameraResources::new(&device, camera, controller, &projection);

        let light = LightResources::new(&device, &viewer_config.light);

        let depth_texture = Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            SAMPLE_COUNT,
            "depth_texture",
        );
        let msaa_texture = Texture::create_msaa_target(&device, &config, SAMPLE_COUNT);

        let material_layout = mesh::material_layout(&device);
        let scene_pipeline = scene::mk_scene_pipeline(
            &device,
            &config,
            &material_layout,
            &camera.bind_group_layout,
            &light.bind_group_layout,
        );
        let shadow_pipeline = shadow::mk_shadow_pipeline(&device, &light.shadow_bind_group_layout);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            clear_colour: viewer_config.clear_colour,
            camera,
            projection,
            light,
            depth_texture,
            msaa_texture,
            material_layout,
            scene_pipeline,
            shadow_pipeline,
        })
    }

    /// Reconfigure the surface and size-dependent textures. Zero dimensions
    /// are ignored, the surface cannot be configured to an empty extent.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.projection.resize(width, height);
        self.depth_texture = Texture::create_depth_texture(
            &self.device,
            [width, height],
            SAMPLE_COUNT,
            "depth_texture",
        );
        self.msaa_texture = Texture::create_msaa_target(&self.device, &self.config, SAMPLE_COUNT);
    }
}
