mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};

use common::{assert_uniform, bake_constant, gpu, SMALL_SETTINGS};
use envmap_baker::bake::{BakeSettings, Baker};
use envmap_baker::export::read_faces;
use envmap_baker::radiance::{Origin, RadianceImage};
use envmap_baker::renderer::pipelines::diffuse_irradiance::IRRADIANCE_KERNEL;
use envmap_baker::renderer::pipelines::equirectangular::EQUIRECTANGULAR_KERNEL;
use envmap_baker::renderer::{
    CubeCaptureRenderer, MipChain, RenderTargetManager, ShaderKernel, TargetId,
};
use envmap_baker::Error;

const RADIANCE: [f32; 3] = [0.5, 1.0, 2.0];

#[test]
fn constant_panorama_gives_uniform_background() {
    let Some(baker) = bake_constant(RADIANCE, SMALL_SETTINGS) else {
        return;
    };
    let context = baker.context();
    let background = baker.targets().get(TargetId::Background).unwrap();
    assert_eq!(background.side_width(), 16);
    assert_eq!(background.mip_level_count(), 5);

    for level in 0..background.mip_level_count() {
        let faces = read_faces(&context.device, &context.queue, background.texture(), level).unwrap();
        assert_eq!(faces.len(), 6);
        for face in &faces {
            assert_eq!(face.width, 16 >> level);
            assert_uniform(&face.pixels, RADIANCE, 1e-3);
        }
    }
}

#[test]
fn irradiance_of_constant_radiance_is_the_same_constant() {
    let Some(baker) = bake_constant(RADIANCE, SMALL_SETTINGS) else {
        return;
    };
    let context = baker.context();
    let irradiance = baker.targets().get(TargetId::Irradiance).unwrap();
    assert_eq!(irradiance.side_width(), 8);
    assert_eq!(irradiance.mip_level_count(), 1);

    let faces = read_faces(&context.device, &context.queue, irradiance.texture(), 0).unwrap();
    for face in &faces {
        assert_uniform(&face.pixels, RADIANCE, 0.03);
    }
}

#[test]
fn prefiltered_chain_halves_and_preserves_constant_radiance() {
    let Some(baker) = bake_constant(RADIANCE, SMALL_SETTINGS) else {
        return;
    };
    let context = baker.context();
    let specular = baker.targets().get(TargetId::Specular).unwrap();
    assert_eq!(specular.mip_level_count(), 3);

    for (level, width) in [(0, 16), (1, 8), (2, 4)] {
        let faces = read_faces(&context.device, &context.queue, specular.texture(), level).unwrap();
        for face in &faces {
            assert_eq!(face.width, width);
            assert_eq!(face.height, width);
            assert_uniform(&face.pixels, RADIANCE, 0.02);
        }
    }
}

#[test]
fn single_mip_chain_renders_one_sharp_level() {
    let settings = BakeSettings {
        mip_levels: 1,
        ..SMALL_SETTINGS
    };
    let Some(baker) = bake_constant(RADIANCE, settings) else {
        return;
    };
    let context = baker.context();
    let specular = baker.targets().get(TargetId::Specular).unwrap();
    assert_eq!(specular.mip_level_count(), 1);

    let faces = read_faces(&context.device, &context.queue, specular.texture(), 0).unwrap();
    for face in &faces {
        assert_uniform(&face.pixels, RADIANCE, 1e-2);
    }
}

#[test]
fn background_mips_average_the_level_above() {
    let Some(context) = gpu() else {
        return;
    };
    // Upper half bright, lower half dark: every side face has a gradient.
    let (width, height) = (64, 32);
    let data: Vec<f32> = (0..height)
        .flat_map(|y| {
            let value = if y < height / 2 { 0.0 } else { 1.0 };
            std::iter::repeat(value).take(width as usize * 3)
        })
        .collect();
    let image = RadianceImage::new(width, height, Origin::LowerLeft, data).unwrap();
    let mut baker = Baker::new(context, SMALL_SETTINGS).unwrap();
    baker.bake(&image).unwrap();

    let context = baker.context();
    let background = baker.targets().get(TargetId::Background).unwrap();
    let last = background.mip_level_count() - 1;
    let top = read_faces(&context.device, &context.queue, background.texture(), 0).unwrap();
    let bottom = read_faces(&context.device, &context.queue, background.texture(), last).unwrap();

    for (face, (top, bottom)) in top.iter().zip(&bottom).enumerate() {
        assert_eq!((bottom.width, bottom.height), (1, 1));
        let mean = top.pixels.iter().sum::<f32>() / top.pixels.len() as f32;
        assert!(
            (bottom.pixels[0] - mean).abs() < 0.02,
            "face {face}: 1x1 mip {} vs level 0 mean {mean}",
            bottom.pixels[0]
        );
    }
}

#[test]
fn oversized_mip_request_is_clamped_to_full_chain() {
    let settings = BakeSettings {
        mip_levels: 20,
        ..SMALL_SETTINGS
    };
    let Some(baker) = bake_constant(RADIANCE, settings) else {
        return;
    };
    let specular = baker.targets().get(TargetId::Specular).unwrap();
    assert_eq!(specular.mip_level_count(), 5);
}

#[test]
fn manager_reuses_matching_targets_and_replaces_others() {
    let Some(context) = gpu() else {
        return;
    };
    let device = &context.device;
    let mut manager = RenderTargetManager::new();

    let first = manager
        .allocate(device, TargetId::Irradiance, 8, MipChain::None)
        .unwrap()
        .texture()
        .global_id();
    let reused = manager
        .allocate(device, TargetId::Irradiance, 8, MipChain::None)
        .unwrap()
        .texture()
        .global_id();
    assert_eq!(first, reused);

    let replaced = manager
        .allocate(device, TargetId::Irradiance, 16, MipChain::None)
        .unwrap();
    assert_eq!(replaced.side_width(), 16);
    assert_ne!(replaced.texture().global_id(), first);

    assert!(manager.release(TargetId::Irradiance));
    assert!(manager.get(TargetId::Irradiance).is_none());
    assert!(!manager.release(TargetId::Irradiance));
}

#[test]
fn depth_attachment_must_match_the_active_mip() {
    let Some(context) = gpu() else {
        return;
    };
    let device = &context.device;
    let mut manager = RenderTargetManager::new();
    manager
        .allocate(device, TargetId::Specular, 16, MipChain::Levels(3))
        .unwrap();

    manager.resize(device, TargetId::Specular, 4).unwrap();
    let target = manager.get(TargetId::Specular).unwrap();
    assert_eq!(target.depth_width(), 4);
    assert!(matches!(target.activate(0), Err(Error::TargetIncomplete { side_width: 16, .. })));
    let active = target.activate(2).unwrap();
    assert_eq!(active.side_width(), 4);
    assert_eq!(active.mip_level(), 2);

    let out_of_range = catch_unwind(AssertUnwindSafe(|| {
        let _ = target.activate(3);
    }));
    assert!(out_of_range.is_err());

    assert!(matches!(
        manager.resize(device, TargetId::Specular, 32),
        Err(Error::TargetIncomplete { .. })
    ));
}

#[test]
fn single_level_targets_do_not_resize() {
    let Some(context) = gpu() else {
        return;
    };
    let device = &context.device;
    let mut manager = RenderTargetManager::new();
    manager
        .allocate(device, TargetId::Irradiance, 8, MipChain::None)
        .unwrap();

    manager.resize(device, TargetId::Irradiance, 8).unwrap();
    assert!(matches!(
        manager.resize(device, TargetId::Irradiance, 4),
        Err(Error::TargetIncomplete { stage: "irradiance", .. })
    ));
    assert!(matches!(
        manager.resize(device, TargetId::Background, 4),
        Err(Error::TargetIncomplete { .. })
    ));
}

#[test]
fn zero_and_oversized_targets_are_incomplete() {
    let Some(context) = gpu() else {
        return;
    };
    let device = &context.device;
    let mut manager = RenderTargetManager::new();

    assert!(matches!(
        manager.allocate(device, TargetId::Background, 0, MipChain::None),
        Err(Error::TargetIncomplete { side_width: 0, .. })
    ));
    let too_wide = device.limits().max_texture_dimension_2d + 1;
    assert!(matches!(
        manager.allocate(device, TargetId::Background, too_wide, MipChain::None),
        Err(Error::TargetIncomplete { .. })
    ));
    assert!(manager.get(TargetId::Background).is_none());
}

#[test]
fn capture_rejects_input_of_the_wrong_shape() {
    let Some(context) = gpu() else {
        return;
    };
    let device = &context.device;
    let queue = &context.queue;

    let source = RadianceImage::constant(8, 4, RADIANCE)
        .unwrap()
        .upload(device, queue)
        .unwrap();
    let equirectangular = ShaderKernel::new(device, &EQUIRECTANGULAR_KERNEL).unwrap();
    let panorama = equirectangular.bind_input(device, &source.view, &source.sampler);

    let mut irradiance = ShaderKernel::new(device, &IRRADIANCE_KERNEL).unwrap();
    let renderer = CubeCaptureRenderer::new(device);
    let mut manager = RenderTargetManager::new();
    let target = manager
        .allocate(device, TargetId::Irradiance, 4, MipChain::None)
        .unwrap();

    let err = renderer
        .capture(device, queue, target.activate(0).unwrap(), &mut irradiance, &panorama)
        .unwrap_err();
    assert!(matches!(err, Error::KernelInput { .. }), "{err}");
}
