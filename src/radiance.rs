use std::path::Path;

use half::f16;

use crate::{Error, Result};

/// Row order of a decoded image. GPU uploads expect `LowerLeft`, the
/// convention the equirectangular kernel samples with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    UpperLeft,
    LowerLeft,
}

/// Decoded equirectangular panorama, tightly packed float RGB.
#[derive(Debug, Clone)]
pub struct RadianceImage {
    width: u32,
    height: u32,
    origin: Origin,
    data: Vec<f32>,
}

impl RadianceImage {
    pub const CHANNELS: usize = 3;

    pub fn new(width: u32, height: u32, origin: Origin, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage {
                reason: format!("empty image {width}x{height}"),
            });
        }
        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(Error::InvalidImage {
                reason: format!(
                    "{width}x{height} RGB image needs {expected} floats, got {}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            origin,
            data,
        })
    }

    /// Every pixel set to `rgb`.
    pub fn constant(width: u32, height: u32, rgb: [f32; 3]) -> Result<Self> {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * Self::CHANNELS)
            .collect();
        Self::new(width, height, Origin::LowerLeft, data)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let decoded = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?;
        let rgb = decoded.to_rgb32f();
        let (width, height) = rgb.dimensions();
        log::info!("loaded {path:?}: {width}x{height}");
        Self::new(width, height, Origin::UpperLeft, rgb.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let i = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Reorders rows bottom-up if the codec delivered them top-down.
    pub fn into_bottom_up(mut self) -> Self {
        if self.origin == Origin::UpperLeft {
            flip_vertical(&mut self.data, self.width as usize * Self::CHANNELS);
            self.origin = Origin::LowerLeft;
        }
        self
    }

    /// Uploads the panorama as a filterable `Rgba16Float` texture.
    pub fn upload(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<SourceTexture> {
        let max = device.limits().max_texture_dimension_2d;
        if self.width > max || self.height > max {
            return Err(Error::InvalidImage {
                reason: format!(
                    "{}x{} exceeds the device texture limit of {max}",
                    self.width, self.height
                ),
            });
        }

        let texels: Vec<f16> = self
            .data
            .chunks_exact(Self::CHANNELS)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 1.0])
            .map(f16::from_f32)
            .collect();

        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Equirectangular Source Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            bytemuck::cast_slice(&texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * 2 * self.width),
                rows_per_image: Some(self.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Equirectangular Source Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(SourceTexture {
            texture,
            view,
            sampler,
        })
    }
}

pub struct SourceTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

/// Swaps rows top to bottom in place. `row_len` is in elements.
pub fn flip_vertical<T>(data: &mut [T], row_len: usize) {
    if row_len == 0 {
        return;
    }
    let rows = data.len() / row_len;
    for y in 0..rows / 2 {
        let (upper, lower) = data.split_at_mut((rows - 1 - y) * row_len);
        upper[y * row_len..(y + 1) * row_len].swap_with_slice(&mut lower[..row_len]);
    }
}
