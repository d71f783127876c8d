use std::fs;
use std::path::{Path, PathBuf};

use half::f16;
use image::codecs::hdr::HdrEncoder;
use image::Rgb;

use crate::radiance::flip_vertical;
use crate::renderer::cube::CubeFace;
use crate::renderer::render_target::{mip_side_width, CUBE_FORMAT};
use crate::{align_to_256, Error, Result};

const BYTES_PER_TEXEL: u32 = 8;

/// One output file: `root/subdir/{name}_{face}.hdr`, or
/// `root/subdir/{name}_{mip}_{face}.hdr` for a mip chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAsset<'a> {
    pub root: &'a Path,
    pub subdir: &'a str,
    pub name: &'a str,
    pub face: CubeFace,
    pub mip: Option<u32>,
}

impl OutputAsset<'_> {
    pub fn file_name(&self) -> String {
        match self.mip {
            Some(mip) => format!("{}_{}_{}.hdr", self.name, mip, self.face.index()),
            None => format!("{}_{}.hdr", self.name, self.face.index()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(self.subdir).join(self.file_name())
    }
}

/// Float RGB face, rows ordered top-down.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

pub fn check_format(texture: &wgpu::Texture) -> Result<()> {
    match texture.format() {
        CUBE_FORMAT => Ok(()),
        found => Err(Error::UnexpectedFormat { found }),
    }
}

/// Decodes tightly packed little-endian `Rgba16Float` texels into float RGB.
pub fn decode_rgba16f(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_TEXEL as usize)
        .flat_map(|texel| {
            [0, 2, 4].map(|offset| f16::from_le_bytes([texel[offset], texel[offset + 1]]).to_f32())
        })
        .collect()
}

pub fn encode_hdr(face: &FaceImage) -> image::ImageResult<Vec<u8>> {
    let pixels: Vec<Rgb<f32>> = face
        .pixels
        .chunks_exact(3)
        .map(|rgb| Rgb([rgb[0], rgb[1], rgb[2]]))
        .collect();
    let mut bytes = Vec::new();
    HdrEncoder::new(&mut bytes).encode(&pixels, face.width as usize, face.height as usize)?;
    Ok(bytes)
}

/// Reads all six layers of `mip_level` in one copy. Faces come back in
/// [`CubeFace::ALL`] order with rows flipped to top-down.
pub fn read_faces(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    mip_level: u32,
) -> Result<Vec<FaceImage>> {
    if !texture.usage().contains(wgpu::TextureUsages::COPY_SRC) {
        return Err(Error::Device {
            stage: "export",
            reason: "texture was not created with COPY_SRC".to_string(),
        });
    }

    let width = mip_side_width(texture.width(), mip_level);
    let height = mip_side_width(texture.height(), mip_level);
    let layers = CubeFace::ALL.len() as u32;
    let unpadded_bytes_per_row = width * BYTES_PER_TEXEL;
    let padded_bytes_per_row = align_to_256(unpadded_bytes_per_row as usize) as u32;
    let face_bytes = (padded_bytes_per_row * height) as usize;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Cubemap Readback Buffer"),
        size: (face_bytes * layers as usize) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Cubemap Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: layers,
        },
    );
    queue.submit(Some(encoder.finish()));

    let (tx, rx) = crossbeam::channel::bounded(1);
    let buffer_slice = buffer.slice(..);
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv().unwrap_or(Err(wgpu::BufferAsyncError))?;

    let faces = {
        let data = buffer_slice.get_mapped_range();
        data.chunks_exact(face_bytes)
            .map(|face| {
                let mut pixels: Vec<f32> = face
                    .chunks_exact(padded_bytes_per_row as usize)
                    .flat_map(|row| decode_rgba16f(&row[..unpadded_bytes_per_row as usize]))
                    .collect();
                flip_vertical(&mut pixels, width as usize * 3);
                FaceImage {
                    width,
                    height,
                    pixels,
                }
            })
            .collect()
    };
    buffer.unmap();
    Ok(faces)
}

/// Writes cube textures to Radiance HDR files.
pub struct HdrExporter<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
}

impl<'a> HdrExporter<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self { device, queue }
    }

    /// Exports the six faces of one mip. `mip_level` of `None` means level 0
    /// with the level left out of the file names. Nothing is written unless
    /// every face encodes.
    pub fn export(
        &self,
        texture: &wgpu::Texture,
        mip_level: Option<u32>,
        root: &Path,
        subdir: &str,
        name: &str,
    ) -> Result<Vec<PathBuf>> {
        check_format(texture)?;
        let level = mip_level.unwrap_or(0);
        let count = texture.mip_level_count();
        if level >= count {
            return Err(Error::MipOutOfRange { level, count });
        }

        let faces = read_faces(self.device, self.queue, texture, level)?;
        let assets: Vec<OutputAsset> = CubeFace::ALL
            .iter()
            .map(|&face| OutputAsset {
                root,
                subdir,
                name,
                face,
                mip: mip_level,
            })
            .collect();

        let encoded: Vec<Result<Vec<u8>>> = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = faces
                .iter()
                .zip(&assets)
                .map(|(face, asset)| {
                    scope.spawn(move |_| {
                        encode_hdr(face).map_err(|source| Error::Encode {
                            path: asset.path(),
                            source,
                        })
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        let encoded = encoded.into_iter().collect::<Result<Vec<_>>>()?;

        fs::create_dir_all(root.join(subdir))?;
        let files: Vec<(PathBuf, Vec<u8>)> = assets.iter().map(OutputAsset::path).zip(encoded).collect();
        write_all(&files)?;
        Ok(files
            .into_iter()
            .map(|(path, _)| {
                log::info!("wrote {path:?}");
                path
            })
            .collect())
    }
}

/// `face.hdr` is staged as `face.hdr.tmp`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn remove_files<'p>(paths: impl IntoIterator<Item = &'p PathBuf>) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("could not remove {path:?}: {e}");
        }
    }
}

/// Writes every file or none of them. Each file is staged under a `.tmp`
/// name and only renamed into place once all of them are on disk.
pub fn write_all(files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let staged: Vec<PathBuf> = files.iter().map(|(path, _)| staging_path(path)).collect();

    for (i, ((_, bytes), tmp)) in files.iter().zip(&staged).enumerate() {
        if let Err(e) = fs::write(tmp, bytes) {
            // `fs::write` may have created `tmp` before failing.
            remove_files(staged[..i].iter().chain(tmp.is_file().then_some(tmp)));
            return Err(e.into());
        }
    }

    for (i, ((path, _), tmp)) in files.iter().zip(&staged).enumerate() {
        if let Err(e) = fs::rename(tmp, path) {
            remove_files(files[..i].iter().map(|(path, _)| path).chain(&staged[i..]));
            return Err(e.into());
        }
    }
    Ok(())
}
