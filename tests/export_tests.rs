mod common;

use std::fs;
use std::path::Path;

use common::{assert_uniform, bake_constant, gpu, read_hdr, SMALL_SETTINGS};
use envmap_baker::bake::Baker;
use envmap_baker::config::OutputLayout;
use envmap_baker::export::HdrExporter;
use envmap_baker::radiance::RadianceImage;
use envmap_baker::renderer::TargetId;
use envmap_baker::Error;

const RADIANCE: [f32; 3] = [0.25, 0.5, 4.0];

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().unwrap().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn exports_every_map_with_stable_names() {
    let Some(baker) = bake_constant(RADIANCE, SMALL_SETTINGS) else {
        return;
    };
    let scratch = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(scratch.path().join("out"));

    let written = baker.export(&layout, "room").unwrap();
    assert_eq!(written.len(), 6 + 6 + 6 * 3);
    assert_eq!(written[3], layout.root.join("background_room_3.hdr"));

    assert_eq!(
        file_names(&layout.root),
        (0..6).map(|face| format!("background_room_{face}.hdr")).collect::<Vec<_>>()
    );
    assert_eq!(
        file_names(&layout.root.join("irradiance")),
        (0..6).map(|face| format!("irradiance_room_{face}.hdr")).collect::<Vec<_>>()
    );
    let mut expected: Vec<String> = (0..3)
        .flat_map(|mip| (0..6).map(move |face| format!("environment_room_{mip}_{face}.hdr")))
        .collect();
    expected.sort();
    assert_eq!(file_names(&layout.root.join("env")), expected);

    let (width, height, pixels) = read_hdr(&layout.root.join("env/environment_room_2_5.hdr"));
    assert_eq!((width, height), (4, 4));
    assert_uniform(&pixels, RADIANCE, 0.03);
}

#[test]
fn exporting_twice_is_byte_identical() {
    let Some(baker) = bake_constant(RADIANCE, SMALL_SETTINGS) else {
        return;
    };
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    let a = baker.export(&OutputLayout::new(first.path()), "room").unwrap();
    let b = baker.export(&OutputLayout::new(second.path()), "room").unwrap();
    assert_eq!(a.len(), b.len());
    for (a, b) in a.iter().zip(&b) {
        assert_eq!(a.file_name(), b.file_name());
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap(), "{a:?}");
    }
}

#[test]
fn exported_faces_are_upright_for_the_capture_camera() {
    let Some(context) = gpu() else {
        return;
    };
    // Lower half dark, upper half bright; rows are stored bottom-up.
    let (width, height) = (64, 32);
    let data: Vec<f32> = (0..height)
        .flat_map(|y| {
            let value = if y < height / 2 { 0.0 } else { 1.0 };
            std::iter::repeat(value).take(width as usize * 3)
        })
        .collect();
    let image = RadianceImage::new(width, height, envmap_baker::radiance::Origin::LowerLeft, data).unwrap();
    let mut baker = Baker::new(context, SMALL_SETTINGS).unwrap();
    baker.bake(&image).unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(scratch.path());
    baker.export(&layout, "split").unwrap();

    // Side-face cameras look with world -Y as up, so the dark lower
    // hemisphere fills the top of each side file.
    for face in [0, 1, 4, 5] {
        let (width, height, pixels) = read_hdr(&layout.root.join(format!("background_split_{face}.hdr")));
        let row_mean = |row: u32| {
            let start = (row * width * 3) as usize;
            let end = start + (width * 3) as usize;
            pixels[start..end].iter().sum::<f32>() / (width * 3) as f32
        };
        assert!(row_mean(0) < 0.1, "face {face} top row {}", row_mean(0));
        assert!(row_mean(height - 1) > 0.9, "face {face} bottom row {}", row_mean(height - 1));
    }
}

#[test]
fn wrong_format_writes_nothing() {
    let Some(context) = gpu() else {
        return;
    };
    let texture = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("ldr cube"),
        size: wgpu::Extent3d {
            width: 4,
            height: 4,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });

    let scratch = tempfile::tempdir().unwrap();
    let exporter = HdrExporter::new(&context.device, &context.queue);
    let err = exporter
        .export(&texture, None, scratch.path(), "ldr", "room")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnexpectedFormat {
            found: wgpu::TextureFormat::Rgba8Unorm
        }
    ));
    assert!(!scratch.path().join("ldr").exists());
    assert!(fs::read_dir(scratch.path()).unwrap().next().is_none());
}

#[test]
fn missing_mip_writes_nothing() {
    let Some(baker) = bake_constant(RADIANCE, SMALL_SETTINGS) else {
        return;
    };
    let context = baker.context();
    let irradiance = baker.targets().get(TargetId::Irradiance).unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let exporter = HdrExporter::new(&context.device, &context.queue);
    let err = exporter
        .export(irradiance.texture(), Some(1), scratch.path(), "irradiance", "room")
        .unwrap_err();
    assert!(matches!(err, Error::MipOutOfRange { level: 1, count: 1 }));
    assert!(!scratch.path().join("irradiance").exists());
}

#[test]
fn blocked_face_path_leaves_no_partial_output() {
    let Some(baker) = bake_constant(RADIANCE, SMALL_SETTINGS) else {
        return;
    };
    let context = baker.context();
    let irradiance = baker.targets().get(TargetId::Irradiance).unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let dir = scratch.path().join("irradiance");
    fs::create_dir_all(dir.join("room_3.hdr")).unwrap();

    let exporter = HdrExporter::new(&context.device, &context.queue);
    let err = exporter
        .export(irradiance.texture(), None, scratch.path(), "irradiance", "room")
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err:?}");
    assert!(file_names(&dir).is_empty(), "{:?}", file_names(&dir));
    assert!(dir.join("room_3.hdr").is_dir());
}
