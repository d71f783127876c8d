#![allow(dead_code)]

use std::path::Path;

use envmap_baker::bake::{BakeSettings, Baker};
use envmap_baker::radiance::RadianceImage;
use envmap_baker::renderer::GpuContext;
use pollster::FutureExt as _;

/// Headless GPU context, or `None` (with a note on stderr) on machines without a usable adapter.
pub fn gpu() -> Option<GpuContext> {
    match GpuContext::new().block_on() {
        Ok(context) => Some(context),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

pub const SMALL_SETTINGS: BakeSettings = BakeSettings {
    mip_levels: 3,
    irradiance_size: 8,
    prefilter_size: 16,
};

/// Bakes a constant-radiance 64x32 panorama; the background cube is 16px wide.
pub fn bake_constant(rgb: [f32; 3], settings: BakeSettings) -> Option<Baker> {
    let context = gpu()?;
    let image = RadianceImage::constant(64, 32, rgb).unwrap();
    let mut baker = Baker::new(context, settings).unwrap();
    baker.bake(&image).unwrap();
    Some(baker)
}

pub fn assert_close(actual: f32, expected: f32, relative: f32) {
    let tolerance = expected.abs().max(1e-3) * relative;
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} (+/- {tolerance}), got {actual}"
    );
}

pub fn assert_uniform(pixels: &[f32], rgb: [f32; 3], relative: f32) {
    for texel in pixels.chunks_exact(3) {
        for channel in 0..3 {
            assert_close(texel[channel], rgb[channel], relative);
        }
    }
}

/// Decodes a written `.hdr` file as float RGB rows, top row first.
pub fn read_hdr(path: &Path) -> (u32, u32, Vec<f32>) {
    let image = image::open(path).unwrap().to_rgb32f();
    let (width, height) = image.dimensions();
    (width, height, image.into_raw())
}
