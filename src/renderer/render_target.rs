use std::collections::hash_map::{Entry, HashMap};

use crate::renderer::cube::CubeFace;
use crate::renderer::pipelines::mipmap::MipmapPipeline;
use crate::renderer::utils::with_validation;
use crate::{Error, Result};

pub const CUBE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Side width of mip `level` of a chain whose level 0 is `base` wide.
pub fn mip_side_width(base: u32, level: u32) -> u32 {
    base.checked_shr(level).unwrap_or(0).max(1)
}

/// Number of levels down to and including the 1x1 level.
pub fn full_mip_chain(side_width: u32) -> u32 {
    u32::BITS - side_width.max(1).leading_zeros()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    Background,
    Irradiance,
    Specular,
}

impl TargetId {
    pub fn label(self) -> &'static str {
        match self {
            TargetId::Background => "background",
            TargetId::Irradiance => "irradiance",
            TargetId::Specular => "specular",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MipChain {
    None,
    Levels(u32),
    Full,
}

impl MipChain {
    /// Levels actually reserved for a target `side_width` wide.
    pub fn level_count(self, side_width: u32) -> u32 {
        let full = full_mip_chain(side_width);
        match self {
            MipChain::None => 1,
            MipChain::Levels(n) => n.clamp(1, full),
            MipChain::Full => full,
        }
    }
}

/// Color cube plus the depth/stencil attachment it renders with.
pub struct RenderTarget {
    id: TargetId,
    side_width: u32,
    color: wgpu::Texture,
    cube_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    depth_width: u32,
}

impl RenderTarget {
    fn new(device: &wgpu::Device, id: TargetId, side_width: u32, mip_level_count: u32) -> Result<Self> {
        let incomplete = |reason: String| Error::TargetIncomplete {
            stage: id.label(),
            side_width,
            reason,
        };

        let max = device.limits().max_texture_dimension_2d;
        if side_width == 0 || side_width > max {
            return Err(incomplete(format!("side width must be within 1..={max}")));
        }

        let (target, error) = with_validation(device, || {
            let color = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(id.label()),
                size: wgpu::Extent3d {
                    width: side_width,
                    height: side_width,
                    depth_or_array_layers: 6,
                },
                mip_level_count,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: CUBE_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let cube_view = color.create_view(&wgpu::TextureViewDescriptor {
                label: Some(id.label()),
                dimension: Some(wgpu::TextureViewDimension::Cube),
                ..Default::default()
            });
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(id.label()),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: if mip_level_count > 1 {
                    wgpu::FilterMode::Linear
                } else {
                    wgpu::FilterMode::Nearest
                },
                ..Default::default()
            });
            let (depth, depth_view) = create_depth(device, id, side_width);
            Self {
                id,
                side_width,
                color,
                cube_view,
                sampler,
                depth,
                depth_view,
                depth_width: side_width,
            }
        });

        match error {
            Some(e) => Err(incomplete(e.to_string())),
            None => Ok(target),
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn side_width(&self) -> u32 {
        self.side_width
    }

    pub fn mip_level_count(&self) -> u32 {
        self.color.mip_level_count()
    }

    pub fn has_mip_chain(&self) -> bool {
        self.mip_level_count() > 1
    }

    pub fn depth_width(&self) -> u32 {
        self.depth_width
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.color
    }

    pub fn cube_view(&self) -> &wgpu::TextureView {
        &self.cube_view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    /// Single face, single mip view usable as a color attachment.
    pub fn face_view(&self, face: CubeFace, mip_level: u32) -> wgpu::TextureView {
        assert!(
            mip_level < self.mip_level_count(),
            "{} target reserves {} mip levels, cannot attach level {}",
            self.id.label(),
            self.mip_level_count(),
            mip_level
        );
        self.color.create_view(&wgpu::TextureViewDescriptor {
            label: Some(self.id.label()),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: mip_level,
            mip_level_count: Some(1),
            base_array_layer: face.index(),
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    /// Freezes the destination of one capture: this target at `mip_level`.
    pub fn activate(&self, mip_level: u32) -> Result<ActiveTarget<'_>> {
        assert!(
            mip_level < self.mip_level_count(),
            "{} target reserves {} mip levels, cannot activate level {}",
            self.id.label(),
            self.mip_level_count(),
            mip_level
        );
        let side_width = mip_side_width(self.side_width, mip_level);
        if self.depth_width != side_width {
            return Err(Error::TargetIncomplete {
                stage: self.id.label(),
                side_width,
                reason: format!(
                    "depth attachment is {}px wide but mip {} is {}px",
                    self.depth_width, mip_level, side_width
                ),
            });
        }
        Ok(ActiveTarget {
            target: self,
            mip_level,
            side_width,
        })
    }

    fn matches(&self, side_width: u32, mip_level_count: u32) -> bool {
        self.side_width == side_width && self.mip_level_count() == mip_level_count
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.color.destroy();
        self.depth.destroy();
    }
}

fn create_depth(device: &wgpu::Device, id: TargetId, width: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let depth = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(id.label()),
        size: wgpu::Extent3d {
            width,
            height: width,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = depth.create_view(&wgpu::TextureViewDescriptor::default());
    (depth, view)
}

/// The destination of one capture call. Immutable for the duration of the call.
#[derive(Clone, Copy)]
pub struct ActiveTarget<'a> {
    target: &'a RenderTarget,
    mip_level: u32,
    side_width: u32,
}

impl<'a> ActiveTarget<'a> {
    pub fn target(&self) -> &'a RenderTarget {
        self.target
    }

    pub fn mip_level(&self) -> u32 {
        self.mip_level
    }

    pub fn side_width(&self) -> u32 {
        self.side_width
    }

    pub fn face_view(&self, face: CubeFace) -> wgpu::TextureView {
        self.target.face_view(face, self.mip_level)
    }

    pub fn depth_view(&self) -> &'a wgpu::TextureView {
        self.target.depth_view()
    }
}

/// Sole owner of every render target. Replacing or releasing a target
/// destroys its GPU textures.
#[derive(Default)]
pub struct RenderTargetManager {
    targets: HashMap<TargetId, RenderTarget>,
}

impl RenderTargetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(
        &mut self,
        device: &wgpu::Device,
        id: TargetId,
        side_width: u32,
        mips: MipChain,
    ) -> Result<&RenderTarget> {
        let mip_level_count = mips.level_count(side_width);
        if let MipChain::Levels(requested) = mips {
            if requested != mip_level_count {
                log::warn!(
                    "{}: {} mip levels requested, {}px allows {}",
                    id.label(),
                    requested,
                    side_width,
                    mip_level_count
                );
            }
        }

        match self.targets.entry(id) {
            Entry::Occupied(mut entry) => {
                if entry.get().matches(side_width, mip_level_count) {
                    log::debug!("{}: reusing {}px target", id.label(), side_width);
                } else {
                    let target = RenderTarget::new(device, id, side_width, mip_level_count)?;
                    let old = entry.insert(target);
                    log::debug!(
                        "{}: replaced {}px target with {}px",
                        id.label(),
                        old.side_width,
                        side_width
                    );
                }
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                log::debug!(
                    "{}: allocating {}px target with {} mip levels",
                    id.label(),
                    side_width,
                    mip_level_count
                );
                let target = RenderTarget::new(device, id, side_width, mip_level_count)?;
                Ok(entry.insert(target))
            }
        }
    }

    /// Matches the depth attachment of a mip-chain target to `side_width`.
    /// The color cube already holds storage for every level. Asking for the
    /// current width is a no-op on any target.
    pub fn resize(&mut self, device: &wgpu::Device, id: TargetId, side_width: u32) -> Result<()> {
        let target = self.targets.get_mut(&id).ok_or_else(|| Error::TargetIncomplete {
            stage: id.label(),
            side_width,
            reason: "resize of an unallocated target".to_string(),
        })?;
        if target.depth_width == side_width {
            return Ok(());
        }
        if !target.has_mip_chain() {
            return Err(Error::TargetIncomplete {
                stage: id.label(),
                side_width,
                reason: "only mip-chain targets resize in place; allocate a new side width instead"
                    .to_string(),
            });
        }
        if side_width == 0 || side_width > target.side_width {
            return Err(Error::TargetIncomplete {
                stage: id.label(),
                side_width,
                reason: format!("working width must be within 1..={}", target.side_width),
            });
        }

        let ((depth, depth_view), error) = with_validation(device, || create_depth(device, id, side_width));
        if let Some(e) = error {
            return Err(Error::TargetIncomplete {
                stage: id.label(),
                side_width,
                reason: e.to_string(),
            });
        }
        target.depth.destroy();
        target.depth = depth;
        target.depth_view = depth_view;
        target.depth_width = side_width;
        Ok(())
    }

    pub fn get(&self, id: TargetId) -> Option<&RenderTarget> {
        self.targets.get(&id)
    }

    /// Like [`get`](Self::get), failing with context when the stage that
    /// produces `id` has not run.
    pub fn require(&self, id: TargetId) -> Result<&RenderTarget> {
        self.get(id).ok_or_else(|| Error::TargetIncomplete {
            stage: id.label(),
            side_width: 0,
            reason: "target has not been rendered".to_string(),
        })
    }

    pub fn release(&mut self, id: TargetId) -> bool {
        self.targets.remove(&id).is_some()
    }

    /// Fills levels 1.. of every face from level 0.
    pub fn generate_mips(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: TargetId,
        pipeline: &MipmapPipeline,
    ) -> Result<()> {
        pipeline.generate(device, queue, self.require(id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_widths_never_reach_zero() {
        assert_eq!(mip_side_width(128, 0), 128);
        assert_eq!(mip_side_width(128, 3), 16);
        assert_eq!(mip_side_width(128, 7), 1);
        assert_eq!(mip_side_width(128, 12), 1);
        assert_eq!(mip_side_width(5, 1), 2);
        assert_eq!(mip_side_width(1, 40), 1);
    }

    #[test]
    fn full_chain_counts_down_to_one_texel() {
        assert_eq!(full_mip_chain(1), 1);
        assert_eq!(full_mip_chain(2), 2);
        assert_eq!(full_mip_chain(128), 8);
        assert_eq!(full_mip_chain(100), 7);
        assert_eq!(mip_side_width(100, full_mip_chain(100) - 1), 1);
    }

    #[test]
    fn mip_chain_requests_are_clamped() {
        assert_eq!(MipChain::None.level_count(512), 1);
        assert_eq!(MipChain::Levels(5).level_count(512), 5);
        assert_eq!(MipChain::Levels(20).level_count(16), 5);
        assert_eq!(MipChain::Levels(0).level_count(16), 1);
        assert_eq!(MipChain::Full.level_count(16), 5);
    }
}
