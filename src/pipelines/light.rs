//! Spot light GPU resources and shadow map.

use cgmath::{Deg, InnerSpace, Matrix4, Rad, Vector3};
use wgpu::util::DeviceExt;

use crate::camera::OPENGL_TO_WGPU_MATRIX;
use crate::config::LightConfig;
use crate::texture::Texture;

/// Shadow map resolution. Mirrored by the constant in `scene.wgsl`.
pub const SHADOW_MAP_SIZE: u32 = 1024;

/// How far the light's shadow projection reaches.
const SHADOW_FAR: f32 = 50.0;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    view_proj: [[f32; 4]; 4],
    position: [f32; 3],
    intensity: f32,
    direction: [f32; 3],
    /// Cosine of the cone half-angle.
    cos_angle: f32,
    color: [f32; 3],
    penumbra: f32,
    shadow_bias: f32,
    // Uniform buffers require 16 byte alignment, pad the tail out.
    _padding: [f32; 3],
}

impl LightUniform {
    pub fn new(config: &LightConfig) -> Self {
        let direction = (config.target - config.position).normalize();
        // look_at degenerates when the light points straight down the up
        // axis; fall back to Z-up in that case.
        let up = if direction.cross(Vector3::unit_y()).magnitude() < 1e-4 {
            Vector3::unit_z()
        } else {
            Vector3::unit_y()
        };
        let view = Matrix4::look_at_rh(config.position, config.target, up);
        let proj = cgmath::perspective(Deg(config.angle.0 * 2.0), 1.0, 0.5, SHADOW_FAR);

        Self {
            view_proj: (OPENGL_TO_WGPU_MATRIX * proj * view).into(),
            position: config.position.into(),
            intensity: config.intensity,
            direction: direction.into(),
            cos_angle: Rad::from(config.angle).0.cos(),
            color: config.color,
            penumbra: config.penumbra,
            shadow_bias: config.shadow_bias,
            _padding: [0.0; 3],
        }
    }
}

/// GPU-side light resources: the uniform, the shadow map and two bind
/// groups. The shadow pass binds only the uniform since the shadow map is
/// its render target at that point.
#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub shadow_map: Texture,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub shadow_bind_group: wgpu::BindGroup,
    pub shadow_bind_group_layout: wgpu::BindGroupLayout,
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_shadow_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("shadow_bind_group_layout"),
    })
}

impl LightResources {
    pub fn new(device: &wgpu::Device, config: &LightConfig) -> Self {
        let uniform = LightUniform::new(config);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let shadow_map = Texture::create_shadow_map(device, SHADOW_MAP_SIZE);
        let shadow_sampler = shadow_map
            .sampler
            .as_ref()
            .expect("shadow maps always carry a comparison sampler");

        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
            ],
            label: Some("light_bind_group"),
        });

        let shadow_bind_group_layout = mk_shadow_bind_group_layout(device);
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("shadow_bind_group"),
        });

        Self {
            uniform,
            buffer,
            shadow_map,
            bind_group,
            bind_group_layout,
            shadow_bind_group,
            shadow_bind_group_layout,
        }
    }
}
