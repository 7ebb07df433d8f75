//! Mesh data, CPU-side and on the GPU.
//!
//! [`MeshData`] is plain data: geometry, a base colour and optionally the
//! bytes of a base colour image. It can be built and inspected without a GPU
//! device, which keeps scene construction and the asset loader testable.
//! [`GpuMesh`] is the uploaded counterpart created lazily at render time.

use wgpu::util::DeviceExt;

use crate::texture::Texture;

/// Types that describe their GPU vertex buffer layout.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for MeshVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// CPU-side mesh: geometry plus material inputs.
#[derive(Clone, Debug)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    /// Base colour factor, multiplied with the texture in the shader.
    pub base_color: [f32; 4],
    /// Raw image file bytes for the base colour texture, if any.
    pub texture_bytes: Option<Vec<u8>>,
    /// File format hint for `texture_bytes` (e.g. "png").
    pub texture_format: Option<String>,
}

impl MeshData {
    pub fn with_color(name: impl Into<String>, vertices: Vec<MeshVertex>, indices: Vec<u32>, base_color: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            base_color,
            texture_bytes: None,
            texture_format: None,
        }
    }
}

/// Build a flat subdivided plane in the XY plane, centred on the origin,
/// with normals facing +Z. Callers rotate it into place via the node
/// transform.
pub fn plane(size: f32, subdivisions: u32, color: [f32; 4]) -> MeshData {
    let cells = subdivisions.max(1);
    let step = size / cells as f32;
    let half = size / 2.0;

    let mut vertices = Vec::with_capacity(((cells + 1) * (cells + 1)) as usize);
    for y in 0..=cells {
        for x in 0..=cells {
            vertices.push(MeshVertex {
                position: [x as f32 * step - half, y as f32 * step - half, 0.0],
                tex_coords: [x as f32 / cells as f32, 1.0 - y as f32 / cells as f32],
                normal: [0.0, 0.0, 1.0],
            });
        }
    }

    let mut indices = Vec::with_capacity((cells * cells * 6) as usize);
    let stride = cells + 1;
    for y in 0..cells {
        for x in 0..cells {
            let i = y * stride + x;
            indices.extend_from_slice(&[i, i + 1, i + stride, i + 1, i + stride + 1, i + stride]);
        }
    }

    MeshData::with_color("ground", vertices, indices, color)
}

/// Material factors as they are laid out in the uniform buffer.
///
/// `params.x` carries the receive-shadow flag so the shader can skip the
/// shadow-map lookup for meshes that opted out.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct MaterialUniform {
    base_color: [f32; 4],
    params: [f32; 4],
}

/// Bind group layout for mesh materials: base colour texture, sampler and
/// the material uniform.
pub fn material_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ],
        label: Some("material_bind_group_layout"),
    })
}

/// GPU resources for one mesh node: geometry buffers, the material bind
/// group and the per-node instance buffer holding the world transform.
#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_elements: u32,
    pub material_bind_group: wgpu::BindGroup,
    pub instance_buffer: wgpu::Buffer,
}

impl GpuMesh {
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &MeshData,
        receive_shadow: bool,
        layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", data.name)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", data.name)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let diffuse = match &data.texture_bytes {
            Some(bytes) => Texture::from_bytes(
                device,
                queue,
                bytes,
                &data.name,
                data.texture_format.as_deref(),
            )
            .unwrap_or_else(|e| {
                log::warn!("falling back to flat colour for {}: {}", data.name, e);
                Texture::create_default_white(device, queue)
            }),
            None => Texture::create_default_white(device, queue),
        };

        let uniform = MaterialUniform {
            base_color: data.base_color,
            params: [if receive_shadow { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        };
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Material Buffer", data.name)),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let sampler = diffuse
            .sampler
            .as_ref()
            .expect("diffuse textures always carry a sampler");
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: material_buffer.as_entire_binding(),
                },
            ],
            label: Some(&format!("{:?} Material Bind Group", data.name)),
        });

        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Instance Buffer"),
            size: std::mem::size_of::<crate::scene::TransformRaw>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            vertex_buffer,
            index_buffer,
            num_elements: data.indices.len() as u32,
            material_bind_group,
            instance_buffer,
        }
    }
}

/// Draw helpers for the main pass, in the style of a render-pass extension
/// trait.
pub trait DrawMesh<'a> {
    fn draw_mesh(
        &mut self,
        mesh: &'a GpuMesh,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    );
}

impl<'a, 'b> DrawMesh<'b> for wgpu::RenderPass<'a>
where
    'b: 'a,
{
    fn draw_mesh(
        &mut self,
        mesh: &'b GpuMesh,
        camera_bind_group: &'b wgpu::BindGroup,
        light_bind_group: &'b wgpu::BindGroup,
    ) {
        self.set_bind_group(0, &mesh.material_bind_group, &[]);
        self.set_bind_group(1, camera_bind_group, &[]);
        self.set_bind_group(2, light_bind_group, &[]);
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_vertex_buffer(1, mesh.instance_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.num_elements, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_has_expected_vertex_and_index_counts() {
        let mesh = plane(10.0, 4, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(mesh.vertices.len(), 25);
        assert_eq!(mesh.indices.len(), 4 * 4 * 6);
    }

    #[test]
    fn plane_is_flat_with_forward_normals() {
        let mesh = plane(10.0, 2, [0.5, 0.5, 0.5, 1.0]);
        for v in &mesh.vertices {
            assert_eq!(v.position[2], 0.0);
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn plane_spans_the_requested_size() {
        let mesh = plane(20.0, 8, [0.5, 0.5, 0.5, 1.0]);
        let xs: Vec<f32> = mesh.vertices.iter().map(|v| v.position[0]).collect();
        let min = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!((min + 10.0).abs() < 1e-4);
        assert!((max - 10.0).abs() < 1e-4);
    }
}
