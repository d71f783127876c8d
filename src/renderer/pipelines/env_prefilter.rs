use crate::renderer::capture::CubeCaptureRenderer;
use crate::renderer::kernel::{InputDimension, Kernel, KernelDesc, KernelParam, ShaderKernel};
use crate::renderer::render_target::{full_mip_chain, mip_side_width, MipChain, RenderTargetManager, TargetId};
use crate::{Error, Result};

pub const PREFILTER_KERNEL: KernelDesc = KernelDesc {
    label: "prefilter",
    fragment: include_str!("../shaders/prefilter.wgsl"),
    input: InputDimension::Cube,
};

/// Roughness of mip `level` in a chain of `levels`: evenly spaced over [0, 1].
pub fn roughness(level: u32, levels: u32) -> f32 {
    if levels > 1 {
        level as f32 / (levels - 1) as f32
    } else {
        0.0
    }
}

/// One level of the specular chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MipSpec {
    pub level: u32,
    pub roughness: f32,
    pub side_width: u32,
}

impl MipSpec {
    pub fn new(level: u32, levels: u32, base_side_width: u32) -> Self {
        Self {
            level,
            roughness: roughness(level, levels),
            side_width: mip_side_width(base_side_width, level),
        }
    }

    pub fn chain(base_side_width: u32, levels: u32) -> impl Iterator<Item = MipSpec> {
        (0..levels).map(move |level| MipSpec::new(level, levels, base_side_width))
    }
}

/// Importance-sampled GGX prefilter into [`TargetId::Specular`], one roughness per mip.
pub struct SpecularPrefilterer {
    kernel: ShaderKernel,
}

impl SpecularPrefilterer {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        Ok(Self {
            kernel: ShaderKernel::new(device, &PREFILTER_KERNEL)?,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn prefilter(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        manager: &mut RenderTargetManager,
        renderer: &CubeCaptureRenderer,
        source: TargetId,
        base_side_width: u32,
        max_mip_levels: u32,
    ) -> Result<()> {
        if source == TargetId::Specular {
            return Err(Error::TargetIncomplete {
                stage: TargetId::Specular.label(),
                side_width: base_side_width,
                reason: "cannot prefilter a target into itself".to_string(),
            });
        }
        if max_mip_levels == 0 {
            return Err(Error::TargetIncomplete {
                stage: TargetId::Specular.label(),
                side_width: base_side_width,
                reason: "at least one mip level is required".to_string(),
            });
        }

        let (input, source_width) = {
            let environment = manager.require(source)?;
            let input = self.kernel.bind_input(device, environment.cube_view(), environment.sampler());
            (input, environment.side_width())
        };

        let full = full_mip_chain(base_side_width);
        let levels = if max_mip_levels > full {
            log::warn!(
                "{} specular mip levels requested, a {}px base allows {}; clamping",
                max_mip_levels,
                base_side_width,
                full
            );
            full
        } else {
            max_mip_levels
        };

        manager.allocate(device, TargetId::Specular, base_side_width, MipChain::Levels(levels))?;
        self.kernel
            .set("resolution", KernelParam::Scalar(source_width as f32))?;

        for spec in MipSpec::chain(base_side_width, levels) {
            manager.resize(device, TargetId::Specular, spec.side_width)?;
            self.kernel.set("roughness", KernelParam::Scalar(spec.roughness))?;

            log::info!(
                "prefiltering specular mip {}: {}px, roughness {:.3}",
                spec.level,
                spec.side_width,
                spec.roughness
            );
            let target = manager.require(TargetId::Specular)?.activate(spec.level)?;
            renderer.capture(device, queue, target, &mut self.kernel, &input)?;
        }
        Ok(())
    }
}
