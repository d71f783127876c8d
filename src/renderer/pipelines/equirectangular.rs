use crate::radiance::SourceTexture;
use crate::renderer::capture::CubeCaptureRenderer;
use crate::renderer::kernel::{InputDimension, KernelDesc, ShaderKernel};
use crate::renderer::render_target::{MipChain, RenderTargetManager, TargetId};
use crate::Result;

use super::mipmap::MipmapPipeline;

pub const EQUIRECTANGULAR_KERNEL: KernelDesc = KernelDesc {
    label: "equirectangular",
    fragment: include_str!("../shaders/equirectangular.wgsl"),
    input: InputDimension::Equirectangular,
};

/// Background face width for a panorama `panorama_width` texels wide: four
/// faces wrap the horizon.
pub fn background_side_width(panorama_width: u32) -> u32 {
    (panorama_width / 4).max(1)
}

/// Projects the equirectangular panorama onto [`TargetId::Background`] and
/// fills its mip chain.
pub struct BackgroundGenerator {
    kernel: ShaderKernel,
    mipmap_pipeline: MipmapPipeline,
}

impl BackgroundGenerator {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        Ok(Self {
            kernel: ShaderKernel::new(device, &EQUIRECTANGULAR_KERNEL)?,
            mipmap_pipeline: MipmapPipeline::new(device)?,
        })
    }

    pub fn generate(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        manager: &mut RenderTargetManager,
        renderer: &CubeCaptureRenderer,
        source: &SourceTexture,
        side_width: u32,
    ) -> Result<()> {
        let input = self.kernel.bind_input(device, &source.view, &source.sampler);
        let target = manager.allocate(device, TargetId::Background, side_width, MipChain::Full)?;
        log::info!(
            "rendering background cubemap: {}px, {} mip levels",
            side_width,
            target.mip_level_count()
        );
        renderer.capture(device, queue, target.activate(0)?, &mut self.kernel, &input)?;
        manager.generate_mips(device, queue, TargetId::Background, &self.mipmap_pipeline)
    }
}
