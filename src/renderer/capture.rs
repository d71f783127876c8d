use wgpu::util::DeviceExt as _;

use crate::renderer::cube::{view_state, CubeFace, CUBE_VERTEX_COUNT, CUBE_VERTICES};
use crate::renderer::kernel::{EnvironmentInput, Kernel, KernelParam, ENVIRONMENT_SLOT};
use crate::renderer::render_target::ActiveTarget;
use crate::renderer::utils::with_validation;
use crate::{Error, Result};

/// Renders the unit cube once per face into an active target.
pub struct CubeCaptureRenderer {
    vertex_buffer: wgpu::Buffer,
}

impl CubeCaptureRenderer {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cube Capture Vertex Buffer"),
            contents: bytemuck::cast_slice(&CUBE_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self { vertex_buffer }
    }

    /// Draws all six faces of `target` in [`CubeFace::ALL`] order. Only the
    /// target's active mip level is written.
    pub fn capture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: ActiveTarget<'_>,
        kernel: &mut dyn Kernel,
        input: &EnvironmentInput,
    ) -> Result<()> {
        if kernel.input_dimension() != input.dimension() {
            return Err(Error::KernelInput {
                kernel: kernel.label().to_string(),
                expected: kernel.input_dimension(),
                found: input.dimension(),
            });
        }

        kernel.set("projection", KernelParam::Matrix(view_state().projection))?;
        kernel.set("environment", KernelParam::TextureSlot(ENVIRONMENT_SLOT))?;

        let side_width = target.side_width();
        let mip_level = target.mip_level();
        let stage = target.target().id().label();

        for face in CubeFace::ALL {
            kernel.set("view", KernelParam::Matrix(face.view()))?;

            let ((), error) = with_validation(device, || {
                // Each face is its own submission so this write lands before its draw.
                kernel.flush(queue);

                let color_view = target.face_view(face);
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Cube Capture Encoder"),
                });
                {
                    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Cube Capture Render Pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &color_view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: target.depth_view(),
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(1.0),
                                store: wgpu::StoreOp::Discard,
                            }),
                            stencil_ops: None,
                        }),
                        occlusion_query_set: None,
                        timestamp_writes: None,
                    });
                    render_pass.set_viewport(0.0, 0.0, side_width as f32, side_width as f32, 0.0, 1.0);
                    kernel.record(&mut render_pass, input);
                    render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                    render_pass.draw(0..CUBE_VERTEX_COUNT, 0..1);
                }
                queue.submit(Some(encoder.finish()));
            });
            if let Some(e) = error {
                return Err(face_failure(stage, side_width, kernel.label(), face, mip_level, e));
            }

            log::debug!(
                "{}: captured face {} at mip {} ({}px)",
                kernel.label(),
                face.index(),
                mip_level,
                side_width
            );
        }
        Ok(())
    }
}

/// A capture that the device rejected while drawing `face` at `mip_level`.
fn face_failure(
    stage: &'static str,
    side_width: u32,
    kernel: &str,
    face: CubeFace,
    mip_level: u32,
    cause: impl std::fmt::Display,
) -> Error {
    Error::TargetIncomplete {
        stage,
        side_width,
        reason: format!("{kernel} capture of face {} at mip {mip_level}: {cause}", face.index()),
    }
}
