use crate::renderer::cube::CubeFace;
use crate::renderer::render_target::{mip_side_width, RenderTarget, CUBE_FORMAT};
use crate::renderer::utils::{bind_sampled_texture, create_shader_module, sampled_texture_layout, with_validation};
use crate::{Error, Result};

const MIPMAP_WGSL: &str = include_str!("../shaders/mipmap.wgsl");

/// Box-filters each level of a cube target from the level above it, one
/// fullscreen triangle per face and level.
pub struct MipmapPipeline {
    render_pipeline: wgpu::RenderPipeline,
    source_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl MipmapPipeline {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let source_layout =
            sampled_texture_layout(device, "Mipmap Source Bind Group Layout", wgpu::TextureViewDimension::D2);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mipmap"),
            bind_group_layouts: &[&source_layout],
            push_constant_ranges: &[],
        });

        let shader_module = create_shader_module(device, "mipmap", MIPMAP_WGSL.to_string())?;
        let (render_pipeline, error) = with_validation(device, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("mipmap"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader_module,
                    entry_point: "vs_main",
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader_module,
                    entry_point: "fs_main",
                    targets: &[Some(CUBE_FORMAT.into())],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        });
        if let Some(e) = error {
            return Err(Error::Shader {
                label: "mipmap",
                reason: e.to_string(),
            });
        }

        // Sampling the exact texel centre of a 2x2 footprint averages it.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("mipmap"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            render_pipeline,
            source_layout,
            sampler,
        })
    }

    /// Fills levels `1..` of every face of `target` from level 0, in one
    /// submission.
    pub fn generate(&self, device: &wgpu::Device, queue: &wgpu::Queue, target: &RenderTarget) -> Result<()> {
        let levels = target.mip_level_count();
        if levels < 2 {
            return Ok(());
        }

        let ((), error) = with_validation(device, || {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mipmap"),
            });
            for face in CubeFace::ALL {
                for level in 1..levels {
                    let source = target.face_view(face, level - 1);
                    let destination = target.face_view(face, level);
                    let bind_group = bind_sampled_texture(
                        device,
                        &self.source_layout,
                        "Mipmap Source Bind Group",
                        &source,
                        &self.sampler,
                    );

                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("mipmap"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &destination,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    pass.set_pipeline(&self.render_pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.draw(0..3, 0..1);
                }
            }
            queue.submit(Some(encoder.finish()));
        });

        if let Some(e) = error {
            return Err(Error::Device {
                stage: target.id().label(),
                reason: format!("mip generation: {e}"),
            });
        }
        log::debug!(
            "generated {} mips of the {} target down to {}px",
            levels - 1,
            target.id().label(),
            mip_side_width(target.side_width(), levels - 1)
        );
        Ok(())
    }
}
