use crate::renderer::capture::CubeCaptureRenderer;
use crate::renderer::kernel::{InputDimension, KernelDesc, ShaderKernel};
use crate::renderer::render_target::{MipChain, RenderTargetManager, TargetId};
use crate::{Error, Result};

pub const IRRADIANCE_KERNEL: KernelDesc = KernelDesc {
    label: "irradiance",
    fragment: include_str!("../shaders/irradiance.wgsl"),
    input: InputDimension::Cube,
};

/// Cosine-weighted hemisphere convolution into [`TargetId::Irradiance`].
pub struct IrradianceConvolver {
    kernel: ShaderKernel,
    side_width: u32,
}

impl IrradianceConvolver {
    pub fn new(device: &wgpu::Device, side_width: u32) -> Result<Self> {
        Ok(Self {
            kernel: ShaderKernel::new(device, &IRRADIANCE_KERNEL)?,
            side_width,
        })
    }

    pub fn side_width(&self) -> u32 {
        self.side_width
    }

    pub fn convolve(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        manager: &mut RenderTargetManager,
        renderer: &CubeCaptureRenderer,
        source: TargetId,
    ) -> Result<()> {
        if source == TargetId::Irradiance {
            return Err(Error::TargetIncomplete {
                stage: TargetId::Irradiance.label(),
                side_width: self.side_width,
                reason: "cannot convolve a target into itself".to_string(),
            });
        }

        let input = {
            let environment = manager.require(source)?;
            self.kernel.bind_input(device, environment.cube_view(), environment.sampler())
        };

        log::info!("convolving irradiance: {}px", self.side_width);
        let target = manager.allocate(device, TargetId::Irradiance, self.side_width, MipChain::None)?;
        renderer.capture(device, queue, target.activate(0)?, &mut self.kernel, &input)
    }
}
