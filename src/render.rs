//! Frame rendering: shadow pass, then the lit main pass.

use crate::context::Context;
use crate::mesh::{DrawMesh, GpuMesh, MeshData};
use crate::scene::{Node, NodeKind, Scene};

/// Upload GPU meshes that don't exist yet and refresh every instance buffer
/// with the node's current world transform.
fn prepare(ctx: &Context, scene: &mut Scene) {
    scene.root.visit_mut(&mut |node| {
        if node.gpu.is_none() {
            if let NodeKind::Mesh(data) = &node.kind {
                node.gpu = Some(upload_mesh(ctx, data, node.receive_shadow));
            }
        }
        if let Some(gpu) = &node.gpu {
            ctx.queue.write_buffer(
                &gpu.instance_buffer,
                0,
                bytemuck::cast_slice(&[node.world_transform().to_raw()]),
            );
        }
    });
}

fn upload_mesh(ctx: &Context, data: &MeshData, receive_shadow: bool) -> GpuMesh {
    log::debug!("uploading mesh {}", data.name);
    GpuMesh::upload(
        &ctx.device,
        &ctx.queue,
        data,
        receive_shadow,
        &ctx.material_layout,
    )
}

/// Collect the uploaded meshes of a subtree in draw order.
fn collect_draws<'a>(node: &'a Node, out: &mut Vec<(&'a GpuMesh, bool)>) {
    if let Some(gpu) = &node.gpu {
        out.push((gpu, node.cast_shadow));
    }
    for child in &node.children {
        collect_draws(child, out);
    }
}

/// Render one frame. Surface errors bubble up so the caller can reconfigure
/// on `Lost`/`Outdated`.
pub fn render_frame(ctx: &Context, scene: &mut Scene) -> Result<(), wgpu::SurfaceError> {
    let output = ctx.surface.get_current_texture()?;
    let surface_view = output
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    prepare(ctx, scene);
    let mut draws = Vec::new();
    collect_draws(&scene.root, &mut draws);

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

    // Shadow pass: depth only, from the light's point of view. Only casters
    // are drawn; the shadow map itself cannot be bound here.
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.light.shadow_map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&ctx.shadow_pipeline);
        pass.set_bind_group(0, &ctx.light.shadow_bind_group, &[]);
        for (gpu, cast_shadow) in &draws {
            if !cast_shadow {
                continue;
            }
            pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, gpu.instance_buffer.slice(..));
            pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..gpu.num_elements, 0, 0..1);
        }
    }

    // Main pass: multisampled colour resolved into the surface.
    {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &ctx.msaa_texture.view,
                depth_slice: None,
                resolve_target: Some(&surface_view),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(ctx.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&ctx.scene_pipeline);
        for (gpu, _) in &draws {
            pass.draw_mesh(gpu, &ctx.camera.bind_group, &ctx.light.bind_group);
        }
    }

    ctx.queue.submit(std::iter::once(encoder.finish()));
    output.present();

    Ok(())
}
