use std::path::PathBuf;

use pollster::FutureExt as _;

use crate::config::{
    Config, OutputLayout, DEFAULT_IRRADIANCE_SIZE, DEFAULT_MIP_LEVELS, DEFAULT_PREFILTER_SIZE,
};
use crate::export::HdrExporter;
use crate::radiance::{Origin, RadianceImage};
use crate::renderer::pipelines::{
    background_side_width, BackgroundGenerator, IrradianceConvolver, SpecularPrefilterer,
};
use crate::renderer::{CubeCaptureRenderer, GpuContext, RenderTargetManager, TargetId};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BakeSettings {
    pub mip_levels: u32,
    pub irradiance_size: u32,
    pub prefilter_size: u32,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            mip_levels: DEFAULT_MIP_LEVELS,
            irradiance_size: DEFAULT_IRRADIANCE_SIZE,
            prefilter_size: DEFAULT_PREFILTER_SIZE,
        }
    }
}

impl From<&Config> for BakeSettings {
    fn from(config: &Config) -> Self {
        Self {
            mip_levels: config.mip_levels,
            irradiance_size: config.irradiance_size,
            prefilter_size: config.prefilter_size,
        }
    }
}

/// Runs the three stages on one GPU context and owns every render target they produce.
pub struct Baker {
    context: GpuContext,
    settings: BakeSettings,
    manager: RenderTargetManager,
    renderer: CubeCaptureRenderer,
    background: BackgroundGenerator,
    irradiance: IrradianceConvolver,
    prefilter: SpecularPrefilterer,
}

impl Baker {
    pub fn new(context: GpuContext, settings: BakeSettings) -> Result<Self> {
        let device = &context.device;
        let renderer = CubeCaptureRenderer::new(device);
        let background = BackgroundGenerator::new(device)?;
        let irradiance = IrradianceConvolver::new(device, settings.irradiance_size)?;
        let prefilter = SpecularPrefilterer::new(device)?;
        Ok(Self {
            context,
            settings,
            manager: RenderTargetManager::new(),
            renderer,
            background,
            irradiance,
            prefilter,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn targets(&self) -> &RenderTargetManager {
        &self.manager
    }

    pub fn bake(&mut self, image: &RadianceImage) -> Result<()> {
        let GpuContext { device, queue, .. } = &self.context;

        let source = match image.origin() {
            Origin::LowerLeft => image.upload(device, queue)?,
            Origin::UpperLeft => image.clone().into_bottom_up().upload(device, queue)?,
        };

        let background_width = background_side_width(image.width());
        self.background.generate(
            device,
            queue,
            &mut self.manager,
            &self.renderer,
            &source,
            background_width,
        )?;

        self.irradiance.convolve(
            device,
            queue,
            &mut self.manager,
            &self.renderer,
            TargetId::Background,
        )?;

        let base = self.settings.prefilter_size.min(background_width);
        self.prefilter.prefilter(
            device,
            queue,
            &mut self.manager,
            &self.renderer,
            TargetId::Background,
            base,
            self.settings.mip_levels,
        )
    }

    /// Writes every baked map under `layout`. Fails before writing anything
    /// if a stage has not run.
    pub fn export(&self, layout: &OutputLayout, name: &str) -> Result<Vec<PathBuf>> {
        let background = self.manager.require(TargetId::Background)?;
        let irradiance = self.manager.require(TargetId::Irradiance)?;
        let specular = self.manager.require(TargetId::Specular)?;

        let exporter = HdrExporter::new(&self.context.device, &self.context.queue);
        let mut written = exporter.export(
            background.texture(),
            None,
            &layout.root,
            OutputLayout::BACKGROUND_DIR,
            &format!("background_{name}"),
        )?;
        written.extend(exporter.export(
            irradiance.texture(),
            None,
            &layout.root,
            OutputLayout::IRRADIANCE_DIR,
            &format!("irradiance_{name}"),
        )?);
        for level in 0..specular.mip_level_count() {
            written.extend(exporter.export(
                specular.texture(),
                Some(level),
                &layout.root,
                OutputLayout::ENVIRONMENT_DIR,
                &format!("environment_{name}"),
            )?);
        }
        Ok(written)
    }
}

/// Validates, loads, bakes and exports one panorama. The output directories
/// are only created once baking has succeeded.
pub fn run(config: &Config) -> Result<Vec<PathBuf>> {
    config.validate()?;
    let image = RadianceImage::load(&config.input)?.into_bottom_up();

    let context = GpuContext::new().block_on()?;
    let mut baker = Baker::new(context, BakeSettings::from(config))?;
    baker.bake(&image)?;

    let layout = config.layout();
    layout.create_dirs()?;
    let written = baker.export(&layout, &config.input_name())?;
    log::info!("wrote {} files under {:?}", written.len(), layout.root);
    Ok(written)
}
