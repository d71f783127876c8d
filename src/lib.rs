use std::path::Path;

pub mod bake;
pub mod config;
pub mod error;
pub mod export;
pub mod radiance;
pub mod renderer;

pub use error::{Error, Result};

pub fn align_to_256(n: usize) -> usize {
    (n + 255) & !255
}

/// File stem of the input panorama, used to name every output file.
pub fn input_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_rows_to_copy_alignment() {
        assert_eq!(align_to_256(0), 0);
        assert_eq!(align_to_256(8), 256);
        assert_eq!(align_to_256(256), 256);
        assert_eq!(align_to_256(257), 512);
        assert_eq!(align_to_256(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize), 256);
    }

    #[test]
    fn input_name_strips_directory_and_extension() {
        assert_eq!(input_name(Path::new("assets/room.hdr")), "room");
        assert_eq!(input_name(Path::new("room.HDR")), "room");
        assert_eq!(input_name(Path::new("/tmp/sky.sunset.hdr")), "sky.sunset");
    }
}
